//! Block model: one content unit of a page body.
//!
//! ## Design: BlockKind + BlockAttrs
//!
//! `BlockAttrs` is a closed sum type. Its variant *is* the block type, and each
//! variant carries exactly the structured data that type needs, so the codec
//! matches exhaustively and adding a variant is a compile-time-checked change.
//! `BlockKind` is the fieldless tag, used wherever only the type matters
//! (factory requests, type-change commands, string parsing).
//!
//! Attributes the model does not know about live in `Block::extra`. They
//! survive serde round trips and editor transforms but the Markdown codec
//! ignores them.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString};

use crate::ids::{BlockId, MediaId};

/// What a block *is*.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive, serialize_all = "snake_case")]
pub enum BlockKind {
    #[strum(serialize = "paragraph", serialize = "text", serialize = "p")]
    Paragraph,
    #[strum(serialize = "heading", serialize = "h1", serialize = "title")]
    Heading,
    #[strum(serialize = "list", serialize = "bulleted_list", serialize = "numbered_list")]
    List,
    #[strum(serialize = "list_item", serialize = "item", serialize = "todo")]
    ListItem,
    #[strum(serialize = "quote", serialize = "blockquote")]
    Quote,
    Callout,
    #[strum(serialize = "divider", serialize = "hr", serialize = "rule")]
    Divider,
    Image,
    Video,
    Audio,
    File,
    #[strum(serialize = "bookmark", serialize = "link", serialize = "embed")]
    Bookmark,
    Code,
    #[strum(serialize = "math", serialize = "equation", serialize = "latex")]
    Math,
    Toggle,
    Table,
    #[strum(serialize = "table_of_contents", serialize = "toc")]
    TableOfContents,
    Gallery,
    #[strum(serialize = "board", serialize = "kanban")]
    Board,
    Calendar,
    #[strum(serialize = "raw_markup", serialize = "raw", serialize = "html")]
    RawMarkup,
    Spacer,
}

impl BlockKind {
    /// Parse from string (case-insensitive, with aliases).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s.trim()).ok()
    }

    /// Canonical snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Paragraph => "paragraph",
            BlockKind::Heading => "heading",
            BlockKind::List => "list",
            BlockKind::ListItem => "list_item",
            BlockKind::Quote => "quote",
            BlockKind::Callout => "callout",
            BlockKind::Divider => "divider",
            BlockKind::Image => "image",
            BlockKind::Video => "video",
            BlockKind::Audio => "audio",
            BlockKind::File => "file",
            BlockKind::Bookmark => "bookmark",
            BlockKind::Code => "code",
            BlockKind::Math => "math",
            BlockKind::Toggle => "toggle",
            BlockKind::Table => "table",
            BlockKind::TableOfContents => "table_of_contents",
            BlockKind::Gallery => "gallery",
            BlockKind::Board => "board",
            BlockKind::Calendar => "calendar",
            BlockKind::RawMarkup => "raw_markup",
            BlockKind::Spacer => "spacer",
        }
    }

    /// Image, video, audio, or file.
    pub fn is_media(&self) -> bool {
        matches!(
            self,
            BlockKind::Image | BlockKind::Video | BlockKind::Audio | BlockKind::File
        )
    }

    /// Whether blocks of this kind carry nested children.
    pub fn has_children(&self) -> bool {
        matches!(
            self,
            BlockKind::List | BlockKind::ListItem | BlockKind::Toggle | BlockKind::Gallery
        )
    }

    /// Whether `content` is meaningful for this kind.
    pub fn has_text(&self) -> bool {
        !matches!(
            self,
            BlockKind::List
                | BlockKind::Divider
                | BlockKind::Image
                | BlockKind::Video
                | BlockKind::Audio
                | BlockKind::File
                | BlockKind::Bookmark
                | BlockKind::Table
                | BlockKind::TableOfContents
                | BlockKind::Gallery
                | BlockKind::Board
                | BlockKind::Calendar
                | BlockKind::Spacer
        )
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Source and labelling shared by image, video, audio, and file blocks.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttrs {
    pub src: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub alt: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub caption: String,
    /// Media library item this block was created from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_id: Option<MediaId>,
}

impl MediaAttrs {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            ..Default::default()
        }
    }
}

/// One column of a board block.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardColumn {
    pub title: String,
    #[serde(default)]
    pub cards: Vec<String>,
}

/// One entry of a calendar block. `date` is an ISO `YYYY-MM-DD` string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub date: String,
    pub title: String,
}

/// Variant-specific structured data. The variant determines the block type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockAttrs {
    Paragraph,
    Heading {
        level: u8,
    },
    List {
        ordered: bool,
    },
    ListItem {
        /// `Some` for checklist items.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checked: Option<bool>,
    },
    Quote,
    Callout {
        icon: String,
    },
    Divider,
    Image(MediaAttrs),
    Video(MediaAttrs),
    Audio(MediaAttrs),
    File(MediaAttrs),
    Bookmark {
        url: String,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        title: String,
    },
    Code {
        language: String,
    },
    Math,
    Toggle {
        #[serde(default)]
        open: bool,
    },
    Table {
        /// Row 0 is the header row.
        rows: Vec<Vec<String>>,
    },
    TableOfContents {
        max_depth: u8,
    },
    Gallery {
        columns: u8,
    },
    Board {
        columns: Vec<BoardColumn>,
    },
    Calendar {
        events: Vec<CalendarEvent>,
    },
    RawMarkup {
        format: String,
    },
    Spacer {
        height: u32,
    },
}

impl BlockAttrs {
    /// The block type these attributes belong to.
    pub fn kind(&self) -> BlockKind {
        match self {
            BlockAttrs::Paragraph => BlockKind::Paragraph,
            BlockAttrs::Heading { .. } => BlockKind::Heading,
            BlockAttrs::List { .. } => BlockKind::List,
            BlockAttrs::ListItem { .. } => BlockKind::ListItem,
            BlockAttrs::Quote => BlockKind::Quote,
            BlockAttrs::Callout { .. } => BlockKind::Callout,
            BlockAttrs::Divider => BlockKind::Divider,
            BlockAttrs::Image(_) => BlockKind::Image,
            BlockAttrs::Video(_) => BlockKind::Video,
            BlockAttrs::Audio(_) => BlockKind::Audio,
            BlockAttrs::File(_) => BlockKind::File,
            BlockAttrs::Bookmark { .. } => BlockKind::Bookmark,
            BlockAttrs::Code { .. } => BlockKind::Code,
            BlockAttrs::Math => BlockKind::Math,
            BlockAttrs::Toggle { .. } => BlockKind::Toggle,
            BlockAttrs::Table { .. } => BlockKind::Table,
            BlockAttrs::TableOfContents { .. } => BlockKind::TableOfContents,
            BlockAttrs::Gallery { .. } => BlockKind::Gallery,
            BlockAttrs::Board { .. } => BlockKind::Board,
            BlockAttrs::Calendar { .. } => BlockKind::Calendar,
            BlockAttrs::RawMarkup { .. } => BlockKind::RawMarkup,
            BlockAttrs::Spacer { .. } => BlockKind::Spacer,
        }
    }

    /// Media attributes, for image/video/audio/file blocks.
    pub fn media(&self) -> Option<&MediaAttrs> {
        match self {
            BlockAttrs::Image(m)
            | BlockAttrs::Video(m)
            | BlockAttrs::Audio(m)
            | BlockAttrs::File(m) => Some(m),
            _ => None,
        }
    }

    /// Check values that must fit on a single Markdown line.
    ///
    /// Code languages and raw formats become fence info strings and may not
    /// hold whitespace or any of `` ` { } ``. Calendar dates may not hold
    /// whitespace. Board and calendar titles may not hold line breaks.
    pub fn validate(&self) -> Result<(), BlockError> {
        match self {
            BlockAttrs::Heading { level } if !(1..=6).contains(level) => {
                Err(BlockError::InvalidHeadingLevel(*level))
            }
            BlockAttrs::Code { language } => info_string("language", language),
            BlockAttrs::RawMarkup { format } => info_string("format", format),
            BlockAttrs::Calendar { events } => events.iter().try_for_each(|event| {
                if event.date.contains(char::is_whitespace) {
                    return Err(BlockError::InvalidEventDate(event.date.clone()));
                }
                one_line("event title", &event.title)
            }),
            BlockAttrs::Board { columns } => columns.iter().try_for_each(|column| {
                one_line("column title", &column.title)?;
                column.cards.iter().try_for_each(|card| one_line("card", card))
            }),
            _ => Ok(()),
        }
    }
}

fn info_string(field: &'static str, value: &str) -> Result<(), BlockError> {
    let bad = |c: char| c.is_whitespace() || matches!(c, '`' | '{' | '}');
    if value.contains(bad) {
        return Err(BlockError::InvalidValue {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn one_line(field: &'static str, value: &str) -> Result<(), BlockError> {
    if value.contains(['\n', '\r']) {
        return Err(BlockError::InvalidValue {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// A single content unit.
///
/// Blocks hold no references to their parent or to the editor; state flows
/// down from the document and edits flow up as commands.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    #[serde(flatten)]
    pub attrs: BlockAttrs,
    #[serde(default)]
    pub content: String,
    /// Attributes unknown to this model. Preserved, ignored by the codec.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Block>,
}

impl Block {
    /// Create a block with a fresh ID.
    pub fn new(attrs: BlockAttrs, content: impl Into<String>) -> Self {
        Self {
            id: BlockId::new(),
            attrs,
            content: content.into(),
            extra: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn kind(&self) -> BlockKind {
        self.attrs.kind()
    }

    pub fn with_children(mut self, children: Vec<Block>) -> Self {
        self.children = children;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Heading level, if this is a heading.
    pub fn heading_level(&self) -> Option<u8> {
        match self.attrs {
            BlockAttrs::Heading { level } => Some(level),
            _ => None,
        }
    }

    /// Compare type, content, attributes, and children, ignoring IDs and
    /// `extra`. This is the equivalence the Markdown round trip preserves.
    pub fn structurally_eq(&self, other: &Block) -> bool {
        self.attrs == other.attrs
            && self.content == other.content
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(&other.children)
                .all(|(a, b)| a.structurally_eq(b))
    }
}

/// Errors from block construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockError {
    /// The requested block type is not one of the known variants.
    #[error("unknown block type: {0:?}")]
    UnknownKind(String),

    #[error("heading level {0} out of range 1..=6")]
    InvalidHeadingLevel(u8),

    #[error("calendar date {0:?} may not contain whitespace")]
    InvalidEventDate(String),

    /// An attribute value that cannot be written on its Markdown line.
    #[error("invalid {field}: {value:?}")]
    InvalidValue { field: &'static str, value: String },
}
