//! Editor State Engine: the single writer of one open page's Document.
//!
//! # Design
//!
//! `EditorState` is an explicit context object; there is no process-wide
//! editor. The live Document sits behind an `Arc`, and every mutation goes
//! through [`EditorState::apply_blocks`], which builds a complete new
//! Document before swapping the pointer. Readers holding an older snapshot
//! (a pending autosave, a renderer) keep seeing the value they were handed.
//!
//! Derived Markdown is computed lazily and cached for the current version.

use std::sync::{Arc, OnceLock};

use folio_types::factory::create_block;
use folio_types::{Block, BlockAttrs, BlockId, BlockKind, Document, MarkdownPage};
use tracing::{debug, trace, warn};

use crate::error::{EditorError, Result};
use crate::markdown;
use crate::transform::{self, Direction};

/// Focused block and cursor position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditorSelection {
    pub block_id: Option<BlockId>,
    pub inline_offset: Option<usize>,
}

impl EditorSelection {
    /// Focus a block with no particular cursor position.
    pub fn block(id: BlockId) -> Self {
        Self {
            block_id: Some(id),
            inline_offset: None,
        }
    }
}

/// Whether a page is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorMode {
    /// No page; the Document is the placeholder.
    Empty,
    /// A page is loaded and its Document is live.
    Editing,
}

/// Live editing state for at most one page.
#[derive(Debug)]
pub struct EditorState {
    page: Option<MarkdownPage>,
    doc: Arc<Document>,
    selection: EditorSelection,
    /// Bumped on every committed change, including resets.
    version: u64,
    dirty: bool,
    markdown: OnceLock<Arc<str>>,
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorState {
    /// An editor in the Empty state.
    pub fn new() -> Self {
        Self {
            page: None,
            doc: Arc::new(Document::placeholder()),
            selection: EditorSelection::default(),
            version: 0,
            dirty: false,
            markdown: OnceLock::new(),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Load `page` with `blocks`, replacing everything. Clears the dirty flag
    /// and selects the first block.
    pub fn reset(&mut self, page: MarkdownPage, blocks: Vec<Block>) {
        let doc = if blocks.is_empty() {
            Document::placeholder()
        } else {
            Document::new(blocks)
        };
        let doc = Self::repaired(doc);
        debug!(page = %page.id, slug = %page.slug, blocks = doc.len(), "editor reset");
        self.selection = doc
            .blocks()
            .first()
            .map(|b| EditorSelection::block(b.id))
            .unwrap_or_default();
        self.page = Some(page);
        self.commit(doc);
        self.dirty = false;
    }

    /// Decode the page body and [`reset`](Self::reset) to it.
    pub fn load_page(&mut self, page: MarkdownPage) {
        let blocks = markdown::decode(&page.body).into_blocks();
        self.reset(page, blocks);
    }

    /// Drop the page and return to the Empty state.
    pub fn close(&mut self) {
        if let Some(page) = self.page.take() {
            debug!(page = %page.id, "editor closed");
        }
        self.selection = EditorSelection::default();
        self.commit(Document::placeholder());
        self.dirty = false;
    }

    pub fn mode(&self) -> EditorMode {
        if self.page.is_some() {
            EditorMode::Editing
        } else {
            EditorMode::Empty
        }
    }

    pub fn is_editing(&self) -> bool {
        self.mode() == EditorMode::Editing
    }

    /// The loaded page as last loaded (its `body` is not kept in sync).
    pub fn page(&self) -> Option<&MarkdownPage> {
        self.page.as_ref()
    }

    /// The loaded page with `body` set to the current Markdown.
    pub fn page_with_body(&self) -> Option<MarkdownPage> {
        let mut page = self.page.clone()?;
        page.body = self.markdown().to_string();
        Some(page)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// The current Document. Later edits never change a returned snapshot.
    pub fn snapshot(&self) -> Arc<Document> {
        Arc::clone(&self.doc)
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Markdown for the current version, computed once per version.
    pub fn markdown(&self) -> Arc<str> {
        self.markdown
            .get_or_init(|| {
                trace!(version = self.version, "encoding document");
                Arc::from(markdown::encode(&self.doc))
            })
            .clone()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn has_changes(&self) -> bool {
        self.dirty
    }

    pub fn selection(&self) -> EditorSelection {
        self.selection
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Replace the Document with `transform(current)`.
    ///
    /// The transform runs against the current snapshot; nothing is modified
    /// until it returns, so a panicking transform leaves the editor as it
    /// was. Duplicate ids in the result are repaired.
    pub fn apply_blocks<F>(&mut self, transform: F) -> Result<()>
    where
        F: FnOnce(&Document) -> Document,
    {
        self.try_apply(|doc| Ok(transform(doc)))
    }

    /// Replace the Document outright.
    pub fn update_blocks(&mut self, blocks: Vec<Block>) -> Result<()> {
        self.apply_blocks(move |_| {
            if blocks.is_empty() {
                Document::placeholder()
            } else {
                Document::new(blocks)
            }
        })
    }

    /// Fallible variant of `apply_blocks` used by the structural operations.
    fn try_apply<F>(&mut self, transform: F) -> Result<()>
    where
        F: FnOnce(&Document) -> Result<Document>,
    {
        if !self.is_editing() {
            return Err(EditorError::NotEditing);
        }
        let next = transform(&self.doc)?;
        let next = Self::repaired(next);
        self.commit(next);
        self.dirty = true;
        Ok(())
    }

    fn repaired(doc: Document) -> Document {
        if doc.has_unique_ids() {
            return doc;
        }
        let (doc, repaired) = transform::repair_duplicate_ids(&doc);
        warn!(count = repaired.len(), ids = ?repaired, "repaired duplicate block ids");
        doc
    }

    fn commit(&mut self, doc: Document) {
        self.doc = Arc::new(doc);
        self.version += 1;
        self.markdown = OnceLock::new();
        if let Some(id) = self.selection.block_id {
            if !self.doc.contains(id) {
                self.selection = EditorSelection::default();
            }
        }
    }

    // ========================================================================
    // Dirty tracking and selection
    // ========================================================================

    /// Set the dirty flag. Cleared only after a confirmed save.
    pub fn set_has_changes(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Record that the Markdown of `revision` was persisted.
    ///
    /// Clears the dirty flag only when nothing changed since `revision`;
    /// returns whether it did.
    pub fn mark_saved(&mut self, revision: u64) -> bool {
        if revision >= self.version {
            self.dirty = false;
            true
        } else {
            false
        }
    }

    /// Explicit selection change from the UI. Unknown block ids are rejected.
    pub fn set_selection(&mut self, selection: EditorSelection) -> Result<()> {
        if let Some(id) = selection.block_id {
            if !self.doc.contains(id) {
                return Err(EditorError::BlockNotFound(id));
            }
        }
        self.selection = selection;
        Ok(())
    }

    // ========================================================================
    // Structural operations (update selection)
    // ========================================================================

    /// Insert a new block of `kind` after `after` (or at the end), and
    /// select it.
    pub fn insert_block(&mut self, after: Option<BlockId>, kind: BlockKind) -> Result<BlockId> {
        self.insert(after, create_block(kind))
    }

    /// Insert a prepared block (e.g. from `factory::media_from_item`) and
    /// select it.
    pub fn insert(&mut self, after: Option<BlockId>, block: Block) -> Result<BlockId> {
        let mut selected = None;
        self.try_apply(|doc| {
            let (next, id) = transform::insert(doc, after, block)?;
            selected = Some(id);
            Ok(next)
        })?;
        let id = selected.ok_or(EditorError::NotEditing)?;
        debug!(block = %id, "block inserted");
        self.selection = EditorSelection::block(id);
        Ok(id)
    }

    /// Remove a block; the selection moves to a neighbour.
    pub fn remove_block(&mut self, id: BlockId) -> Result<()> {
        let mut next_selection = None;
        self.try_apply(|doc| {
            let (next, selection) = transform::remove(doc, id)?;
            next_selection = selection;
            Ok(next)
        })?;
        debug!(block = %id, "block removed");
        self.selection = next_selection
            .map(EditorSelection::block)
            .unwrap_or_default();
        Ok(())
    }

    /// Move a block one place among its siblings. Moving past either end is
    /// a no-op and does not count as a change.
    pub fn move_block(&mut self, id: BlockId, direction: Direction) -> Result<()> {
        if !self.is_editing() {
            return Err(EditorError::NotEditing);
        }
        let Some(next) = transform::move_block(&self.doc, id, direction)? else {
            return Ok(());
        };
        self.try_apply(|_| Ok(next))?;
        self.selection = EditorSelection::block(id);
        Ok(())
    }

    /// Change a block's type, keeping its id and (where it fits) its text.
    pub fn change_kind(&mut self, id: BlockId, kind: BlockKind) -> Result<()> {
        let current = self
            .doc
            .find(id)
            .map(Block::kind)
            .ok_or(EditorError::BlockNotFound(id))?;
        if current == kind {
            return Ok(());
        }
        self.try_apply(|doc| transform::change_kind(doc, id, kind))?;
        debug!(block = %id, from = %current, to = %kind, "block type changed");
        self.selection = EditorSelection::block(id);
        Ok(())
    }

    /// Duplicate a block after itself and select the copy.
    pub fn duplicate_block(&mut self, id: BlockId) -> Result<BlockId> {
        let mut copy = None;
        self.try_apply(|doc| {
            let (next, id) = transform::duplicate(doc, id)?;
            copy = Some(id);
            Ok(next)
        })?;
        let copy = copy.ok_or(EditorError::BlockNotFound(id))?;
        self.selection = EditorSelection::block(copy);
        Ok(copy)
    }

    // ========================================================================
    // Content operations (selection untouched)
    // ========================================================================

    pub fn update_content(&mut self, id: BlockId, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        self.try_apply(|doc| transform::update_content(doc, id, text))
    }

    pub fn update_attrs(&mut self, id: BlockId, attrs: BlockAttrs) -> Result<()> {
        self.try_apply(|doc| transform::update_attrs(doc, id, attrs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_types::factory::paragraph;
    use folio_types::{ContentId, Frontmatter, Slug};

    fn page(body: &str) -> MarkdownPage {
        let mut page = MarkdownPage::new(ContentId::new(), Slug::slugify("Test"), Frontmatter::titled("Test"));
        page.body = body.to_string();
        page
    }

    fn editing(body: &str) -> EditorState {
        let mut editor = EditorState::new();
        editor.load_page(page(body));
        editor
    }

    #[test]
    fn test_new_editor_is_empty() {
        let editor = EditorState::new();
        assert_eq!(editor.mode(), EditorMode::Empty);
        assert!(editor.document().is_placeholder());
        assert_eq!(&*editor.markdown(), "");
        assert!(!editor.has_changes());
    }

    #[test]
    fn test_mutation_requires_editing() {
        let mut editor = EditorState::new();
        assert_eq!(
            editor.apply_blocks(|d| d.clone()),
            Err(EditorError::NotEditing)
        );
        assert_eq!(
            editor.insert_block(None, BlockKind::Paragraph),
            Err(EditorError::NotEditing)
        );
    }

    #[test]
    fn test_load_page_selects_first_block() {
        let editor = editing("# Title\n\nBody text.");
        assert_eq!(editor.mode(), EditorMode::Editing);
        assert_eq!(editor.document().len(), 2);
        assert_eq!(
            editor.selection().block_id,
            Some(editor.document().blocks()[0].id)
        );
        assert!(!editor.has_changes());
    }

    #[test]
    fn test_reset_with_no_blocks_uses_placeholder() {
        let mut editor = EditorState::new();
        editor.reset(page(""), Vec::new());
        assert!(editor.document().is_placeholder());
        assert!(editor.is_editing());
    }

    #[test]
    fn test_apply_blocks_marks_dirty_and_bumps_version() {
        let mut editor = editing("Body");
        let v = editor.version();
        editor
            .apply_blocks(|d| {
                let mut blocks = d.blocks().to_vec();
                blocks.push(paragraph("more"));
                Document::new(blocks)
            })
            .unwrap();
        assert!(editor.has_changes());
        assert_eq!(editor.version(), v + 1);
        assert_eq!(&*editor.markdown(), "Body\n\nmore");
    }

    #[test]
    fn test_snapshots_are_immutable() {
        let mut editor = editing("Body");
        let before = editor.snapshot();
        let id = before.blocks()[0].id;
        editor.update_content(id, "Changed").unwrap();
        assert_eq!(before.blocks()[0].content, "Body");
        assert_eq!(editor.document().blocks()[0].content, "Changed");
    }

    #[test]
    fn test_markdown_is_memoised_per_version() {
        let mut editor = editing("Body");
        let a = editor.markdown();
        let b = editor.markdown();
        assert!(Arc::ptr_eq(&a, &b));
        let id = editor.document().blocks()[0].id;
        editor.update_content(id, "New").unwrap();
        let c = editor.markdown();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(&*c, "New");
    }

    #[test]
    fn test_duplicate_ids_are_repaired() {
        let mut editor = editing("Body");
        editor
            .apply_blocks(|d| {
                let first = d.blocks()[0].clone();
                Document::new(vec![first.clone(), first])
            })
            .unwrap();
        assert!(editor.document().has_unique_ids());
        assert_eq!(editor.document().len(), 2);
    }

    #[test]
    fn test_insert_selects_new_block_and_keeps_ids() {
        let mut editor = editing("# Title\n\nBody");
        let before = editor.document().ids();
        let first = before[0];
        let id = editor.insert_block(Some(first), BlockKind::Code).unwrap();
        assert_eq!(editor.selection(), EditorSelection::block(id));
        assert_eq!(editor.document().blocks()[1].id, id);
        for old in before {
            assert!(editor.document().contains(old));
        }
    }

    #[test]
    fn test_content_edit_keeps_id_and_selection() {
        let mut editor = editing("# Title\n\nBody");
        let selection = editor.selection();
        let id = editor.document().blocks()[1].id;
        editor.update_content(id, "Edited").unwrap();
        assert_eq!(editor.document().blocks()[1].id, id);
        assert_eq!(editor.selection(), selection);
    }

    #[test]
    fn test_remove_moves_selection() {
        let mut editor = editing("# Title\n\nBody");
        let title = editor.document().blocks()[0].id;
        let body = editor.document().blocks()[1].id;
        editor.remove_block(body).unwrap();
        assert_eq!(editor.selection().block_id, Some(title));
        editor.remove_block(title).unwrap();
        assert!(editor.document().is_placeholder());
        assert_eq!(
            editor.selection().block_id,
            Some(editor.document().blocks()[0].id)
        );
    }

    #[test]
    fn test_move_past_end_is_not_a_change() {
        let mut editor = editing("a\n\nb");
        let first = editor.document().blocks()[0].id;
        let v = editor.version();
        editor.move_block(first, Direction::Up).unwrap();
        assert_eq!(editor.version(), v);
        assert!(!editor.has_changes());
        editor.move_block(first, Direction::Down).unwrap();
        assert_eq!(editor.document().blocks()[1].id, first);
    }

    #[test]
    fn test_change_kind_selects_block() {
        let mut editor = editing("a\n\nb");
        let id = editor.document().blocks()[1].id;
        editor.change_kind(id, BlockKind::Quote).unwrap();
        assert_eq!(editor.document().blocks()[1].kind(), BlockKind::Quote);
        assert_eq!(editor.selection().block_id, Some(id));
    }

    #[test]
    fn test_duplicate_selects_copy() {
        let mut editor = editing("a");
        let id = editor.document().blocks()[0].id;
        let copy = editor.duplicate_block(id).unwrap();
        assert_ne!(copy, id);
        assert_eq!(editor.selection().block_id, Some(copy));
    }

    #[test]
    fn test_mark_saved_respects_later_edits() {
        let mut editor = editing("a");
        let id = editor.document().blocks()[0].id;
        editor.update_content(id, "b").unwrap();
        let saved = editor.version();
        editor.update_content(id, "c").unwrap();
        assert!(!editor.mark_saved(saved));
        assert!(editor.has_changes());
        assert!(editor.mark_saved(editor.version()));
        assert!(!editor.has_changes());
    }

    #[test]
    fn test_set_selection_validates() {
        let mut editor = editing("a");
        let missing = BlockId::new();
        assert_eq!(
            editor.set_selection(EditorSelection::block(missing)),
            Err(EditorError::BlockNotFound(missing))
        );
        let id = editor.document().blocks()[0].id;
        editor
            .set_selection(EditorSelection {
                block_id: Some(id),
                inline_offset: Some(1),
            })
            .unwrap();
        assert_eq!(editor.selection().inline_offset, Some(1));
    }

    #[test]
    fn test_page_with_body_tracks_edits() {
        let mut editor = editing("a");
        let id = editor.document().blocks()[0].id;
        assert!(editor.update_attrs(id, BlockAttrs::Quote).is_err());
        editor.change_kind(id, BlockKind::Heading).unwrap();
        editor.update_attrs(id, BlockAttrs::Heading { level: 2 }).unwrap();
        assert_eq!(editor.page_with_body().unwrap().body, "## a");
    }

    #[test]
    fn test_close_returns_to_empty() {
        let mut editor = editing("a");
        editor.close();
        assert_eq!(editor.mode(), EditorMode::Empty);
        assert!(editor.page_with_body().is_none());
        assert!(editor.document().is_placeholder());
    }
}
