//! Document: the ordered block tree of one page body.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::block::{Block, BlockAttrs};
use crate::factory;
use crate::ids::BlockId;

/// An ordered sequence of top-level blocks. Order is rendering and
/// serialization order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    blocks: Vec<Block>,
}

/// One table-of-contents entry derived from a heading.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineEntry {
    pub block_id: BlockId,
    pub level: u8,
    pub text: String,
}

impl Document {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    /// The document shown when nothing has been written yet: a single empty
    /// paragraph.
    pub fn placeholder() -> Self {
        Self::new(vec![factory::paragraph("")])
    }

    /// Whether this is exactly one empty paragraph with no children.
    pub fn is_placeholder(&self) -> bool {
        matches!(
            self.blocks.as_slice(),
            [only] if only.attrs == BlockAttrs::Paragraph
                && only.content.is_empty()
                && only.children.is_empty()
        )
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }

    /// Number of top-level blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Pre-order walk over every block, with its nesting depth (0 = top level).
    pub fn iter_depth_first(&self) -> impl Iterator<Item = (usize, &Block)> {
        let mut stack: Vec<(usize, &Block)> = self.blocks.iter().rev().map(|b| (0, b)).collect();
        std::iter::from_fn(move || {
            let (depth, block) = stack.pop()?;
            stack.extend(block.children.iter().rev().map(|c| (depth + 1, c)));
            Some((depth, block))
        })
    }

    /// Every block ID in pre-order.
    pub fn ids(&self) -> Vec<BlockId> {
        self.iter_depth_first().map(|(_, b)| b.id).collect()
    }

    /// Find a block anywhere in the tree.
    pub fn find(&self, id: BlockId) -> Option<&Block> {
        self.iter_depth_first().map(|(_, b)| b).find(|b| b.id == id)
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.find(id).is_some()
    }

    /// Check the ID uniqueness invariant.
    pub fn has_unique_ids(&self) -> bool {
        let mut seen = HashSet::new();
        self.iter_depth_first().all(|(_, b)| seen.insert(b.id))
    }

    /// Headings up to `max_depth`, in document order.
    pub fn outline(&self, max_depth: u8) -> Vec<OutlineEntry> {
        self.iter_depth_first()
            .filter_map(|(_, b)| match b.attrs {
                BlockAttrs::Heading { level } if level <= max_depth => Some(OutlineEntry {
                    block_id: b.id,
                    level,
                    text: b.content.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// Text content of every block joined with newlines, for search and
    /// word counts.
    pub fn plain_text(&self) -> String {
        self.iter_depth_first()
            .map(|(_, b)| b.content.as_str())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Compare block types, content, and attributes in order, ignoring IDs.
    pub fn structurally_eq(&self, other: &Document) -> bool {
        self.blocks.len() == other.blocks.len()
            && self
                .blocks
                .iter()
                .zip(&other.blocks)
                .all(|(a, b)| a.structurally_eq(b))
    }
}

impl From<Vec<Block>> for Document {
    fn from(blocks: Vec<Block>) -> Self {
        Self::new(blocks)
    }
}
