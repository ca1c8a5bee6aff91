//! Block Factory: new, valid, empty blocks with variant defaults.
//!
//! The factory is the only place that knows what a "blank" block of each type
//! looks like. The Markdown decoder builds every block through it, so a
//! decoded block and a freshly inserted one always agree on defaults.

use crate::block::{Block, BlockAttrs, BlockError, BlockKind, MediaAttrs};
use crate::media::{MediaItem, MediaKind};

/// Default language for code blocks.
pub const DEFAULT_CODE_LANGUAGE: &str = "plaintext";
/// Default callout icon.
pub const DEFAULT_CALLOUT_ICON: &str = "💡";
/// Default heading depth included in a table of contents.
pub const DEFAULT_TOC_DEPTH: u8 = 3;
/// Default number of gallery columns.
pub const DEFAULT_GALLERY_COLUMNS: u8 = 3;
/// Default raw markup format.
pub const DEFAULT_RAW_FORMAT: &str = "html";
/// Default spacer height in pixels.
pub const DEFAULT_SPACER_HEIGHT: u32 = 24;

/// Default attributes for a block type.
pub fn default_attrs(kind: BlockKind) -> BlockAttrs {
    match kind {
        BlockKind::Paragraph => BlockAttrs::Paragraph,
        BlockKind::Heading => BlockAttrs::Heading { level: 1 },
        BlockKind::List => BlockAttrs::List { ordered: false },
        BlockKind::ListItem => BlockAttrs::ListItem { checked: None },
        BlockKind::Quote => BlockAttrs::Quote,
        BlockKind::Callout => BlockAttrs::Callout {
            icon: DEFAULT_CALLOUT_ICON.to_string(),
        },
        BlockKind::Divider => BlockAttrs::Divider,
        BlockKind::Image => BlockAttrs::Image(MediaAttrs::default()),
        BlockKind::Video => BlockAttrs::Video(MediaAttrs::default()),
        BlockKind::Audio => BlockAttrs::Audio(MediaAttrs::default()),
        BlockKind::File => BlockAttrs::File(MediaAttrs::default()),
        BlockKind::Bookmark => BlockAttrs::Bookmark {
            url: String::new(),
            title: String::new(),
        },
        BlockKind::Code => BlockAttrs::Code {
            language: DEFAULT_CODE_LANGUAGE.to_string(),
        },
        BlockKind::Math => BlockAttrs::Math,
        BlockKind::Toggle => BlockAttrs::Toggle { open: false },
        BlockKind::Table => BlockAttrs::Table {
            rows: vec![vec![String::new()]],
        },
        BlockKind::TableOfContents => BlockAttrs::TableOfContents {
            max_depth: DEFAULT_TOC_DEPTH,
        },
        BlockKind::Gallery => BlockAttrs::Gallery {
            columns: DEFAULT_GALLERY_COLUMNS,
        },
        BlockKind::Board => BlockAttrs::Board { columns: Vec::new() },
        BlockKind::Calendar => BlockAttrs::Calendar { events: Vec::new() },
        BlockKind::RawMarkup => BlockAttrs::RawMarkup {
            format: DEFAULT_RAW_FORMAT.to_string(),
        },
        BlockKind::Spacer => BlockAttrs::Spacer {
            height: DEFAULT_SPACER_HEIGHT,
        },
    }
}

/// Create a new empty block of the requested type.
///
/// Lists start with a single empty item so there is always something to
/// type into.
pub fn create_block(kind: BlockKind) -> Block {
    let block = Block::new(default_attrs(kind), "");
    match kind {
        BlockKind::List => block.with_children(vec![create_block(BlockKind::ListItem)]),
        _ => block,
    }
}

/// Create a block from a type name.
///
/// Unknown names are a programmer error and fail fast; they never fall back
/// to a paragraph.
pub fn create_block_named(name: &str) -> Result<Block, BlockError> {
    BlockKind::from_str(name)
        .map(create_block)
        .ok_or_else(|| BlockError::UnknownKind(name.to_string()))
}

/// A block with explicit attributes, content, and children.
///
/// Used by decoders once they have parsed every field; children are
/// dropped for kinds that do not carry any.
pub fn from_parts(attrs: BlockAttrs, content: impl Into<String>, children: Vec<Block>) -> Block {
    let kind = attrs.kind();
    let block = Block::new(attrs, content);
    if kind.has_children() {
        block.with_children(children)
    } else {
        block
    }
}

/// A paragraph with text.
pub fn paragraph(text: impl Into<String>) -> Block {
    Block::new(BlockAttrs::Paragraph, text)
}

/// A heading. Levels outside 1..=6 are rejected.
pub fn heading(level: u8, text: impl Into<String>) -> Result<Block, BlockError> {
    if !(1..=6).contains(&level) {
        return Err(BlockError::InvalidHeadingLevel(level));
    }
    Ok(Block::new(BlockAttrs::Heading { level }, text))
}

/// A list with one item per string.
pub fn list<I, S>(ordered: bool, items: I) -> Block
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let children = items
        .into_iter()
        .map(|text| Block::new(BlockAttrs::ListItem { checked: None }, text))
        .collect();
    Block::new(BlockAttrs::List { ordered }, "").with_children(children)
}

/// A media block populated from a media library item.
///
/// The block type follows the item's MIME type; `url` is where the host
/// serves the item.
pub fn media_from_item(item: &MediaItem, url: impl Into<String>) -> Block {
    let media = MediaAttrs {
        src: url.into(),
        alt: item.alt.clone().unwrap_or_default(),
        caption: String::new(),
        media_id: Some(item.id),
    };
    let attrs = match item.media_kind() {
        MediaKind::Image => BlockAttrs::Image(media),
        MediaKind::Video => BlockAttrs::Video(media),
        MediaKind::Audio => BlockAttrs::Audio(media),
        MediaKind::Other => BlockAttrs::File(MediaAttrs {
            caption: item.filename.clone(),
            ..media
        }),
    };
    Block::new(attrs, "")
}

/// Copy a block and all of its descendants, giving every copy a fresh ID.
pub fn deep_clone_with_fresh_ids(block: &Block) -> Block {
    let mut copy = Block::new(block.attrs.clone(), block.content.clone());
    copy.extra = block.extra.clone();
    copy.children = block.children.iter().map(deep_clone_with_fresh_ids).collect();
    copy
}
