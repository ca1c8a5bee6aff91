//! Editor state engine and Markdown codec for Folio.
//!
//! State flows one way: commands enter [`EditorState`], which commits a new
//! immutable Document per change; Markdown is derived from that Document on
//! demand and is what the autosave pipeline persists. Loading runs the other
//! direction through [`markdown::decode`].
//!
//! # Modules
//!
//! - [`state`]: the per-page editor context object
//! - [`transform`]: pure Document → Document operations
//! - [`markdown`]: `encode` / `decode`
//! - [`page_file`]: `+++` TOML frontmatter around a Markdown body

mod error;
pub mod markdown;
pub mod page_file;
pub mod state;
pub mod transform;

pub use error::{EditorError, Result};
pub use markdown::{decode, encode};
pub use page_file::PageFileError;
pub use state::{EditorMode, EditorSelection, EditorState};
pub use transform::Direction;
