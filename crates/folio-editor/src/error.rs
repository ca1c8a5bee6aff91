//! Error types for editor operations.

use folio_types::{BlockError, BlockId, BlockKind};
use thiserror::Error;

/// Errors returned by the editor state engine and document transforms.
///
/// All of these are validation errors: the document is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditorError {
    /// A mutation was attempted with no page loaded.
    #[error("no page is open for editing")]
    NotEditing,

    /// Block not found in the document.
    #[error("block not found: {0:?}")]
    BlockNotFound(BlockId),

    /// `update_attrs` was given attributes of a different block type.
    #[error("block {id:?} is a {expected}, not a {got}")]
    KindMismatch {
        id: BlockId,
        expected: BlockKind,
        got: BlockKind,
    },

    /// Text was written to a block type that stores only attributes.
    #[error("{kind} block {id:?} has no text content")]
    NoTextContent { id: BlockId, kind: BlockKind },

    /// Heading text must fit on one line.
    #[error("heading {0:?} cannot contain a line break")]
    MultilineHeading(BlockId),

    /// Attribute values rejected by the block model.
    #[error(transparent)]
    Block(#[from] BlockError),
}

/// Result type for editor operations.
pub type Result<T> = std::result::Result<T, EditorError>;
