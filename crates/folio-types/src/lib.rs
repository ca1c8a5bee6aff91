//! Shared block and page types for Folio.
//!
//! This is the leaf crate: typed IDs, the block model and its factory, the
//! Document tree, and the persisted page shape. It has no internal folio
//! dependencies.
//!
//! # Key Types
//!
//! |--------------------|----------------------------------------------|
//! | Type               | Purpose                                      |
//! |--------------------|----------------------------------------------|
//! | [`Block`]          | One content unit (id + attrs + content)      |
//! | [`BlockAttrs`]     | Closed sum type of per-variant attributes    |
//! | [`BlockKind`]      | Fieldless block type tag                     |
//! | [`Document`]       | Ordered block tree of one page body          |
//! | [`MarkdownPage`]   | Persisted page (frontmatter + Markdown body) |
//! | [`Slug`]           | Validated URL slug                           |
//! | [`MediaItem`]      | Media library entry                          |
//! |--------------------|----------------------------------------------|

pub mod block;
pub mod document;
pub mod factory;
pub mod ids;
pub mod media;
pub mod page;

pub use block::{
    Block, BlockAttrs, BlockError, BlockKind, BoardColumn, CalendarEvent, MediaAttrs,
};
pub use document::{Document, OutlineEntry};
pub use factory::{create_block, create_block_named};
pub use ids::{BlockId, ContentId, MediaId, PageId};
pub use media::{MediaItem, MediaKind};
pub use page::{Frontmatter, MarkdownPage, PageStatus, Slug, SlugError, Visibility};

/// Current time as Unix milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
