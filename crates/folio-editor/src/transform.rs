//! Pure document transforms.
//!
//! Every function here takes the current Document by reference and returns a
//! new one; the input is never modified. The editor state engine commits the
//! result through `apply_blocks`, but the transforms are usable on their own.
//!
//! Transforms keep documents in the shape the Markdown codec can represent:
//! list items only ever live inside lists, and a list never ends up empty.

use std::collections::HashSet;

use folio_types::factory::{self, deep_clone_with_fresh_ids};
use folio_types::{Block, BlockAttrs, BlockId, BlockKind, Document};

use crate::error::{EditorError, Result};

/// Direction for [`move_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

// ============================================================================
// Tree addressing
// ============================================================================

/// Index path from the top level down to `id`.
pub fn path_of(blocks: &[Block], id: BlockId) -> Option<Vec<usize>> {
    for (i, block) in blocks.iter().enumerate() {
        if block.id == id {
            return Some(vec![i]);
        }
        if let Some(mut rest) = path_of(&block.children, id) {
            rest.insert(0, i);
            return Some(rest);
        }
    }
    None
}

fn get<'a>(blocks: &'a [Block], path: &[usize]) -> Option<&'a Block> {
    let (first, rest) = path.split_first()?;
    let block = blocks.get(*first)?;
    if rest.is_empty() {
        Some(block)
    } else {
        get(&block.children, rest)
    }
}

/// The sibling list holding the block at `path`.
fn siblings_mut<'a>(blocks: &'a mut Vec<Block>, path: &[usize]) -> Option<&'a mut Vec<Block>> {
    let (_, parents) = path.split_last()?;
    let mut list = blocks;
    for i in parents {
        list = &mut list.get_mut(*i)?.children;
    }
    Some(list)
}

fn parent_kind(blocks: &[Block], path: &[usize]) -> Option<BlockKind> {
    let (_, parents) = path.split_last()?;
    if parents.is_empty() {
        return None;
    }
    get(blocks, parents).map(Block::kind)
}

fn is_list_context(kind: Option<BlockKind>) -> bool {
    matches!(kind, Some(BlockKind::List | BlockKind::ListItem))
}

fn not_found(id: BlockId) -> EditorError {
    EditorError::BlockNotFound(id)
}

/// Group runs of list items into unordered lists, for blocks placed outside
/// any list.
fn wrap_items(blocks: Vec<Block>) -> Vec<Block> {
    let mut out: Vec<Block> = Vec::with_capacity(blocks.len());
    let mut run: Vec<Block> = Vec::new();
    for block in blocks {
        if block.kind() == BlockKind::ListItem {
            run.push(block);
            continue;
        }
        if !run.is_empty() {
            let items = std::mem::take(&mut run);
            out.push(Block::new(BlockAttrs::List { ordered: false }, "").with_children(items));
        }
        out.push(block);
    }
    if !run.is_empty() {
        out.push(Block::new(BlockAttrs::List { ordered: false }, "").with_children(run));
    }
    out
}

/// Remove lists left without items, at any depth.
fn prune_empty_lists(blocks: &mut Vec<Block>) {
    blocks.retain(|b| !(b.kind() == BlockKind::List && b.children.is_empty()));
    for block in blocks.iter_mut() {
        prune_empty_lists(&mut block.children);
    }
}

fn finish(mut blocks: Vec<Block>) -> Document {
    prune_empty_lists(&mut blocks);
    if blocks.is_empty() {
        Document::placeholder()
    } else {
        Document::new(blocks)
    }
}

// ============================================================================
// Structural operations
// ============================================================================

/// Insert `block` after `after` (or at the end of the document).
///
/// A list item placed outside a list is wrapped in a new list; a list item
/// inserted after a list joins the end of that list. Any other block
/// inserted after something inside a list lands after the outermost list.
/// Returns the new document and the id to select.
pub fn insert(doc: &Document, after: Option<BlockId>, block: Block) -> Result<(Document, BlockId)> {
    block.attrs.validate()?;
    let mut blocks = doc.blocks().to_vec();
    let selected = block.id;
    let is_item = block.kind() == BlockKind::ListItem;

    let Some(anchor) = after else {
        blocks.extend(wrap_items(vec![block]));
        return Ok((finish(blocks), selected));
    };

    let mut path = path_of(&blocks, anchor).ok_or_else(|| not_found(anchor))?;
    if is_item {
        if get(&blocks, &path).is_some_and(|b| b.kind() == BlockKind::List) {
            let siblings = siblings_mut(&mut blocks, &path).ok_or_else(|| not_found(anchor))?;
            let index = path[path.len() - 1];
            siblings[index].children.push(block);
            return Ok((finish(blocks), selected));
        }
    } else {
        while is_list_context(parent_kind(&blocks, &path)) {
            path.pop();
        }
    }

    let placed = if is_list_context(parent_kind(&blocks, &path)) {
        vec![block]
    } else {
        wrap_items(vec![block])
    };
    let index = path[path.len() - 1];
    let siblings = siblings_mut(&mut blocks, &path).ok_or_else(|| not_found(anchor))?;
    for (offset, b) in placed.into_iter().enumerate() {
        siblings.insert(index + 1 + offset, b);
    }
    Ok((finish(blocks), selected))
}

/// Remove a block and its children.
///
/// Returns the new document and the block that should take the selection:
/// the previous sibling, else the next sibling, else the nearest surviving
/// ancestor. Removing the last block leaves the placeholder paragraph.
pub fn remove(doc: &Document, id: BlockId) -> Result<(Document, Option<BlockId>)> {
    let mut blocks = doc.blocks().to_vec();
    let path = path_of(&blocks, id).ok_or_else(|| not_found(id))?;

    // Candidates in order of preference, gathered before anything moves.
    let mut candidates = Vec::new();
    for depth in (1..=path.len()).rev() {
        let here = &path[..depth];
        let index = here[depth - 1];
        let parent = &here[..depth - 1];
        let siblings: &[Block] = if parent.is_empty() {
            &blocks
        } else {
            get(&blocks, parent).map(|b| b.children.as_slice()).unwrap_or_default()
        };
        if index > 0 {
            candidates.push(siblings[index - 1].id);
        }
        if let Some(next) = siblings.get(index + 1) {
            candidates.push(next.id);
        }
        if depth > 1 {
            if let Some(parent) = get(&blocks, parent) {
                if parent.kind() != BlockKind::List {
                    candidates.push(parent.id);
                }
            }
        }
    }

    let index = path[path.len() - 1];
    siblings_mut(&mut blocks, &path)
        .ok_or_else(|| not_found(id))?
        .remove(index);

    let doc = finish(blocks);
    let selection = candidates
        .into_iter()
        .find(|c| doc.contains(*c))
        .or_else(|| doc.blocks().first().map(|b| b.id));
    Ok((doc, selection))
}

/// Swap a block with its previous or next sibling. `None` when the block is
/// already at that end.
pub fn move_block(doc: &Document, id: BlockId, direction: Direction) -> Result<Option<Document>> {
    let mut blocks = doc.blocks().to_vec();
    let path = path_of(&blocks, id).ok_or_else(|| not_found(id))?;
    let index = path[path.len() - 1];
    let siblings = siblings_mut(&mut blocks, &path).ok_or_else(|| not_found(id))?;
    let other = match direction {
        Direction::Up if index > 0 => index - 1,
        Direction::Down if index + 1 < siblings.len() => index + 1,
        _ => return Ok(None),
    };
    siblings.swap(index, other);
    Ok(Some(Document::new(blocks)))
}

/// Copy a block (with fresh ids throughout) directly after the original.
pub fn duplicate(doc: &Document, id: BlockId) -> Result<(Document, BlockId)> {
    let mut blocks = doc.blocks().to_vec();
    let path = path_of(&blocks, id).ok_or_else(|| not_found(id))?;
    let index = path[path.len() - 1];
    let siblings = siblings_mut(&mut blocks, &path).ok_or_else(|| not_found(id))?;
    let copy = deep_clone_with_fresh_ids(&siblings[index]);
    let copy_id = copy.id;
    siblings.insert(index + 1, copy);
    Ok((Document::new(blocks), copy_id))
}

/// Change a block's type, keeping its id.
///
/// The block gets the new type's default attributes. Text is kept when the
/// new type holds text; otherwise it moves into a paragraph right after the
/// block. Children the new type cannot hold are placed after it as siblings.
/// A list flattens its items' text; a block turned into a list becomes its
/// first item. Items leave their list when they stop being items.
pub fn change_kind(doc: &Document, id: BlockId, kind: BlockKind) -> Result<Document> {
    let mut blocks = doc.blocks().to_vec();
    let path = path_of(&blocks, id).ok_or_else(|| not_found(id))?;
    let in_list = is_list_context(parent_kind(&blocks, &path));
    let index = path[path.len() - 1];

    if !in_list || kind == BlockKind::ListItem {
        let siblings = siblings_mut(&mut blocks, &path).ok_or_else(|| not_found(id))?;
        let original = siblings.remove(index);
        let (retyped, spill) = retype(original, kind, in_list);
        let mut placed = vec![retyped];
        placed.extend(spill);
        let placed = if in_list { placed } else { wrap_items(placed) };
        for (offset, b) in placed.into_iter().enumerate() {
            siblings.insert(index + offset, b);
        }
        return Ok(finish(blocks));
    }

    // An item becoming a non-item leaves the list. Its nested items stay
    // where it was; the block itself lands after the outermost list.
    let mut outer = path.clone();
    while is_list_context(parent_kind(&blocks, &outer)) {
        outer.pop();
    }
    let siblings = siblings_mut(&mut blocks, &path).ok_or_else(|| not_found(id))?;
    let mut original = siblings.remove(index);
    let nested = std::mem::take(&mut original.children);
    for (offset, b) in nested.into_iter().enumerate() {
        siblings.insert(index + offset, b);
    }
    let (retyped, spill) = retype(original, kind, false);
    let mut placed = vec![retyped];
    placed.extend(spill);
    let outer_index = outer[outer.len() - 1];
    let top = siblings_mut(&mut blocks, &outer).ok_or_else(|| not_found(id))?;
    for (offset, b) in wrap_items(placed).into_iter().enumerate() {
        top.insert(outer_index + 1 + offset, b);
    }
    Ok(finish(blocks))
}

/// Retype one block. Returns the block and anything that must follow it.
fn retype(block: Block, kind: BlockKind, in_list: bool) -> (Block, Vec<Block>) {
    let Block {
        id,
        attrs,
        content,
        extra,
        children,
    } = block;

    let (text, children) = if attrs.kind() == BlockKind::List {
        (list_text(&children), Vec::new())
    } else {
        (content, children)
    };

    let mut block = Block {
        id,
        attrs: factory::default_attrs(kind),
        content: String::new(),
        extra,
        children: Vec::new(),
    };
    let mut spill = Vec::new();

    if kind == BlockKind::List {
        // The block keeps its id as the list; its text becomes the first item.
        let first = Block::new(BlockAttrs::ListItem { checked: None }, text);
        let (items, rest): (Vec<_>, Vec<_>) = children
            .into_iter()
            .partition(|c| c.kind() == BlockKind::ListItem);
        block.children = std::iter::once(first).chain(items).collect();
        spill.extend(rest);
        return (block, spill);
    }

    if kind == BlockKind::Heading {
        // Headings hold one line.
        block.content = normalize_newlines(text).replace('\n', " ");
    } else if kind.has_text() {
        block.content = text;
    } else if !text.is_empty() {
        spill.push(factory::paragraph(text));
    }

    match kind {
        BlockKind::ListItem => {
            let (items, rest): (Vec<_>, Vec<_>) = children
                .into_iter()
                .partition(|c| c.kind() == BlockKind::ListItem);
            block.children = items;
            spill.extend(rest);
        }
        BlockKind::Toggle | BlockKind::Gallery => block.children = wrap_items(children),
        _ => spill.extend(children),
    }

    if in_list {
        // Non-items cannot follow an item inside a list.
        spill.retain(|b| b.kind() == BlockKind::ListItem);
    }
    (block, spill)
}

/// Text of every item in a list, one line per item, depth first.
fn list_text(items: &[Block]) -> String {
    let mut lines = Vec::new();
    let mut stack: Vec<&Block> = items.iter().rev().collect();
    while let Some(item) = stack.pop() {
        lines.push(item.content.as_str());
        stack.extend(item.children.iter().rev());
    }
    lines.join("\n")
}

// ============================================================================
// Content operations
// ============================================================================

/// Replace a block's text.
pub fn update_content(doc: &Document, id: BlockId, text: impl Into<String>) -> Result<Document> {
    let mut blocks = doc.blocks().to_vec();
    let path = path_of(&blocks, id).ok_or_else(|| not_found(id))?;
    let index = path[path.len() - 1];
    let block = siblings_mut(&mut blocks, &path)
        .and_then(|s| s.get_mut(index))
        .ok_or_else(|| not_found(id))?;
    let kind = block.kind();
    if !kind.has_text() {
        return Err(EditorError::NoTextContent { id, kind });
    }
    let text = normalize_newlines(text.into());
    if kind == BlockKind::Heading && text.contains('\n') {
        return Err(EditorError::MultilineHeading(id));
    }
    block.content = text;
    Ok(Document::new(blocks))
}

/// `\r\n` and lone `\r` become `\n`.
fn normalize_newlines(text: String) -> String {
    if text.contains('\r') {
        text.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        text
    }
}

/// Replace a block's attributes. The new attributes must be of the same
/// block type and pass [`BlockAttrs::validate`].
pub fn update_attrs(doc: &Document, id: BlockId, attrs: BlockAttrs) -> Result<Document> {
    attrs.validate()?;
    let mut blocks = doc.blocks().to_vec();
    let path = path_of(&blocks, id).ok_or_else(|| not_found(id))?;
    let index = path[path.len() - 1];
    let block = siblings_mut(&mut blocks, &path)
        .and_then(|s| s.get_mut(index))
        .ok_or_else(|| not_found(id))?;
    if block.kind() != attrs.kind() {
        return Err(EditorError::KindMismatch {
            id,
            expected: block.kind(),
            got: attrs.kind(),
        });
    }
    block.attrs = attrs;
    Ok(Document::new(blocks))
}

/// Give every repeated id after its first occurrence a fresh one.
///
/// Returns the repaired document and the ids that were duplicated.
pub fn repair_duplicate_ids(doc: &Document) -> (Document, Vec<BlockId>) {
    fn walk(blocks: &mut [Block], seen: &mut HashSet<BlockId>, repaired: &mut Vec<BlockId>) {
        for block in blocks {
            if !seen.insert(block.id) {
                repaired.push(block.id);
                block.id = BlockId::new();
                seen.insert(block.id);
            }
            walk(&mut block.children, seen, repaired);
        }
    }

    let mut blocks = doc.blocks().to_vec();
    let mut repaired = Vec::new();
    walk(&mut blocks, &mut HashSet::new(), &mut repaired);
    (Document::new(blocks), repaired)
}
