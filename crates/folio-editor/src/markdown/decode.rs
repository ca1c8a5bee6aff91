//! Markdown → Document.
//!
//! Decoding never fails. Lines are grouped by their leading syntax and each
//! group becomes exactly one block; anything unrecognised falls back to a
//! paragraph (or a bookmark, for directives carrying a URL) and is logged.

use folio_types::factory::{
    self, DEFAULT_CALLOUT_ICON, DEFAULT_CODE_LANGUAGE, DEFAULT_GALLERY_COLUMNS, DEFAULT_RAW_FORMAT,
    DEFAULT_SPACER_HEIGHT, DEFAULT_TOC_DEPTH,
};
use folio_types::{Block, BlockAttrs, BoardColumn, CalendarEvent, Document, MediaAttrs, MediaId};
use tracing::debug;

use super::directive::{self, Directive};
use super::{
    ItemLine, Line, classify, dollar_run, image_parts, indent_width, is_table_separator,
    unescape_text_line,
};

/// Parse Markdown into a Document.
///
/// Empty or whitespace-only input yields the placeholder document.
pub fn decode(markdown: &str) -> Document {
    if markdown.trim().is_empty() {
        return Document::placeholder();
    }
    let mut parser = Parser {
        lines: markdown.lines().collect(),
        pos: 0,
    };
    let blocks = parser.blocks(false);
    if blocks.is_empty() {
        Document::placeholder()
    } else {
        Document::new(blocks)
    }
}

struct Parser<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a str> {
        self.lines.get(self.pos).copied()
    }

    /// Blocks until end of input, or until the `:::` closing the current
    /// container when `nested`.
    fn blocks(&mut self, nested: bool) -> Vec<Block> {
        let mut out = Vec::new();
        while let Some(line) = self.peek() {
            match classify(line) {
                Line::Blank => self.pos += 1,
                Line::ContainerClose if nested => {
                    self.pos += 1;
                    return out;
                }
                kind => self.block(line, kind, &mut out),
            }
        }
        if nested {
            debug!("unclosed container runs to end of input");
        }
        out
    }

    fn block(&mut self, line: &'a str, kind: Line<'a>, out: &mut Vec<Block>) {
        match kind {
            Line::Heading { level, text } => {
                self.pos += 1;
                out.push(factory::from_parts(BlockAttrs::Heading { level }, text, Vec::new()));
            }
            Line::Fence { marker, len, info } => out.push(self.fenced(marker, len, info)),
            Line::MathFence { len } => out.push(self.math(len)),
            Line::Rule => {
                self.pos += 1;
                out.push(factory::create_block(folio_types::BlockKind::Divider));
            }
            Line::Quote(_) => out.push(self.quote()),
            Line::Item(_) => out.extend(self.lists()),
            Line::Leaf(raw) => {
                self.pos += 1;
                out.push(leaf(raw));
            }
            Line::ContainerOpen(raw) => self.container(raw, out),
            Line::TableRow if self.next_is_separator() => out.push(self.table()),
            Line::Image(raw) => {
                self.pos += 1;
                out.push(image(raw, line));
            }
            Line::TableRow | Line::ContainerClose | Line::Text | Line::Blank => {
                out.push(self.paragraph())
            }
        }
    }

    fn next_is_separator(&self) -> bool {
        self.lines
            .get(self.pos + 1)
            .is_some_and(|l| is_table_separator(l))
    }

    /// Whether the line at the cursor ends an open paragraph.
    fn interrupts_paragraph(&self, line: &str) -> bool {
        match classify(line) {
            Line::Text => false,
            Line::TableRow => self.next_is_separator(),
            _ => true,
        }
    }

    // ── Text blocks ─────────────────────────────────────────────────────────

    fn paragraph(&mut self) -> Block {
        let mut text = Vec::new();
        if let Some(first) = self.peek() {
            text.push(unescape_text_line(first));
            self.pos += 1;
        }
        while let Some(line) = self.peek() {
            if self.interrupts_paragraph(line) {
                break;
            }
            text.push(unescape_text_line(line));
            self.pos += 1;
        }
        factory::paragraph(text.join("\n"))
    }

    fn quote(&mut self) -> Block {
        let mut text = Vec::new();
        while let Some(line) = self.peek() {
            let Some(rest) = line.trim_start().strip_prefix('>') else {
                break;
            };
            text.push(rest.strip_prefix(' ').unwrap_or(rest));
            self.pos += 1;
        }
        factory::from_parts(BlockAttrs::Quote, text.join("\n"), Vec::new())
    }

    fn fenced(&mut self, marker: char, len: usize, info: &str) -> Block {
        self.pos += 1;
        let is_close = |line: &str| {
            let t = line.trim();
            t.len() >= len && t.chars().all(|c| c == marker)
        };
        let body = self.take_until(is_close, "code fence");

        let attrs = match info.strip_prefix("{=").and_then(|s| s.strip_suffix('}')) {
            Some(format) => BlockAttrs::RawMarkup {
                format: non_empty(format.trim(), DEFAULT_RAW_FORMAT),
            },
            None => BlockAttrs::Code {
                language: non_empty(info, DEFAULT_CODE_LANGUAGE),
            },
        };
        factory::from_parts(attrs, body.join("\n"), Vec::new())
    }

    fn math(&mut self, len: usize) -> Block {
        self.pos += 1;
        let is_close = |line: &str| dollar_run(line.trim()).is_some_and(|run| run >= len);
        let body = self.take_until(is_close, "math block");
        factory::from_parts(BlockAttrs::Math, body.join("\n"), Vec::new())
    }

    /// Raw lines up to (and consuming) the first line matching `is_close`.
    fn take_until(&mut self, is_close: impl Fn(&str) -> bool, what: &str) -> Vec<&'a str> {
        let mut body = Vec::new();
        while let Some(line) = self.peek() {
            self.pos += 1;
            if is_close(line) {
                return body;
            }
            body.push(line);
        }
        debug!(what, "unclosed block runs to end of input");
        body
    }

    // ── Lists ───────────────────────────────────────────────────────────────

    /// One or more adjacent top-level lists. A change between ordered and
    /// unordered markers starts a new list.
    fn lists(&mut self) -> Vec<Block> {
        let mut out = Vec::new();
        while let Some(Line::Item(first)) = self.peek().map(classify) {
            let ordered = first.ordered;
            let items = self.items(first.indent, Some(ordered));
            out.push(factory::from_parts(BlockAttrs::List { ordered }, "", items));
        }
        out
    }

    /// Items at indent `base`, with deeper items nested under the previous
    /// one and indented plain lines appended as continuation text.
    fn items(&mut self, base: usize, ordered: Option<bool>) -> Vec<Block> {
        let mut items: Vec<Block> = Vec::new();
        while let Some(line) = self.peek() {
            match classify(line) {
                Line::Blank => break,
                Line::Item(item) if item.indent < base => break,
                Line::Item(item) if item.indent >= base + 2 && !items.is_empty() => {
                    let nested = self.items(item.indent, None);
                    if let Some(parent) = items.last_mut() {
                        parent.children.extend(nested);
                    }
                }
                Line::Item(item) => {
                    if ordered.is_some_and(|o| o != item.ordered) && !items.is_empty() {
                        break;
                    }
                    items.push(list_item(item));
                    self.pos += 1;
                }
                _ => {
                    let continues = indent_width(line) >= base + 2;
                    match items.last_mut() {
                        Some(last) if continues => {
                            last.content.push('\n');
                            last.content.push_str(unescape_text_line(line.trim_start()));
                            self.pos += 1;
                        }
                        _ => break,
                    }
                }
            }
        }
        items
    }

    // ── Tables ──────────────────────────────────────────────────────────────

    fn table(&mut self) -> Block {
        let mut rows = Vec::new();
        if let Some(header) = self.peek() {
            rows.push(split_row(header));
        }
        // Header and separator.
        self.pos += 2;
        while let Some(line) = self.peek() {
            if classify(line) != Line::TableRow {
                break;
            }
            rows.push(split_row(line));
            self.pos += 1;
        }
        factory::from_parts(BlockAttrs::Table { rows }, "", Vec::new())
    }

    // ── Containers ──────────────────────────────────────────────────────────

    fn container(&mut self, raw: &str, out: &mut Vec<Block>) {
        self.pos += 1;
        let Some(d) = directive::parse(raw) else {
            debug!(line = raw, "malformed container directive");
            out.push(fallback(raw));
            out.extend(self.blocks(true));
            return;
        };
        match d.name.as_str() {
            "callout" => {
                let body = self.container_body();
                let content: Vec<&str> = body.iter().map(|l| unescape_text_line(l)).collect();
                let icon = d.get("icon").unwrap_or(DEFAULT_CALLOUT_ICON).to_string();
                out.push(factory::from_parts(
                    BlockAttrs::Callout { icon },
                    content.join("\n"),
                    Vec::new(),
                ));
            }
            "toggle" | "details" => {
                let children = self.blocks(true);
                out.push(factory::from_parts(
                    BlockAttrs::Toggle {
                        open: d.flag("open"),
                    },
                    d.text("summary"),
                    children,
                ));
            }
            "gallery" => {
                let children = self.blocks(true);
                out.push(factory::from_parts(
                    BlockAttrs::Gallery {
                        columns: d.number("columns", DEFAULT_GALLERY_COLUMNS),
                    },
                    "",
                    children,
                ));
            }
            "board" | "kanban" => {
                let body = self.container_body();
                out.push(board(&body));
            }
            "calendar" => {
                let body = self.container_body();
                out.push(calendar(&body));
            }
            other => {
                debug!(name = other, "unknown container directive");
                out.push(fallback(raw));
                out.extend(self.blocks(true));
            }
        }
    }

    /// Raw body lines of a text container.
    fn container_body(&mut self) -> Vec<&'a str> {
        self.take_until(|line| classify(line) == Line::ContainerClose, "container")
    }
}

fn non_empty(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

fn list_item(item: ItemLine<'_>) -> Block {
    factory::from_parts(
        BlockAttrs::ListItem {
            checked: item.checked,
        },
        unescape_text_line(item.text),
        Vec::new(),
    )
}

/// Cells of one pipe row, split on unescaped `|`.
fn split_row(line: &str) -> Vec<String> {
    let line = line.trim();
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('|') => cell.push('|'),
                Some('\\') => cell.push('\\'),
                Some('n') => cell.push('\n'),
                Some(other) => {
                    cell.push('\\');
                    cell.push(other);
                }
                None => cell.push('\\'),
            },
            '|' => cells.push(std::mem::take(&mut cell)),
            c => cell.push(c),
        }
    }
    // Text after the last pipe; empty when the row ends with `|`.
    if !cell.trim().is_empty() || !line.ends_with('|') {
        cells.push(cell);
    }
    if line.starts_with('|') && !cells.is_empty() {
        cells.remove(0);
    }
    let cells: Vec<String> = cells.into_iter().map(|c| c.trim().to_string()).collect();
    if cells.is_empty() {
        vec![String::new()]
    } else {
        cells
    }
}

fn image(raw: &str, line: &str) -> Block {
    match image_parts(raw) {
        Some((alt, src, caption)) => factory::from_parts(
            BlockAttrs::Image(MediaAttrs {
                src,
                alt,
                caption,
                media_id: None,
            }),
            "",
            Vec::new(),
        ),
        None => factory::paragraph(line),
    }
}

fn leaf(raw: &str) -> Block {
    let Some(d) = directive::parse(raw) else {
        debug!(line = raw, "malformed leaf directive");
        return fallback(raw);
    };
    let attrs = match d.name.as_str() {
        "image" => BlockAttrs::Image(media(&d)),
        "video" => BlockAttrs::Video(media(&d)),
        "audio" => BlockAttrs::Audio(media(&d)),
        "file" => BlockAttrs::File(media(&d)),
        "bookmark" | "embed" | "link" => BlockAttrs::Bookmark {
            url: d.url().unwrap_or_default(),
            title: d.text("title"),
        },
        "toc" | "table_of_contents" => BlockAttrs::TableOfContents {
            max_depth: d.number("depth", DEFAULT_TOC_DEPTH),
        },
        "spacer" => BlockAttrs::Spacer {
            height: d.number("height", DEFAULT_SPACER_HEIGHT),
        },
        other => {
            debug!(name = other, "unknown leaf directive");
            return fallback(raw);
        }
    };
    factory::from_parts(attrs, "", Vec::new())
}

fn media(d: &Directive) -> MediaAttrs {
    let media_id = d.get("media").and_then(|v| match MediaId::parse(v) {
        Ok(id) => Some(id),
        Err(e) => {
            debug!(value = v, error = %e, "ignoring malformed media id");
            None
        }
    });
    MediaAttrs {
        src: d.url().unwrap_or_default(),
        alt: d.text("alt"),
        caption: d.text("caption"),
        media_id,
    }
}

/// An unrecognised directive: a bookmark if a URL can be recovered from it,
/// otherwise a paragraph holding the raw line.
fn fallback(raw: &str) -> Block {
    let url = directive::parse(raw)
        .and_then(|d| d.url())
        .or_else(|| directive::find_url(raw));
    match url {
        Some(url) => {
            debug!(%url, "directive decoded as bookmark");
            factory::from_parts(
                BlockAttrs::Bookmark {
                    url,
                    title: String::new(),
                },
                "",
                Vec::new(),
            )
        }
        None => {
            debug!(line = raw, "directive kept as paragraph text");
            factory::paragraph(raw)
        }
    }
}

fn board(body: &[&str]) -> Block {
    let mut columns: Vec<BoardColumn> = Vec::new();
    for line in body {
        match classify(line) {
            Line::Item(item) if item.indent < 2 => columns.push(BoardColumn {
                title: unescape_text_line(item.text).to_string(),
                cards: Vec::new(),
            }),
            Line::Item(item) => match columns.last_mut() {
                Some(column) => column.cards.push(unescape_text_line(item.text).to_string()),
                None => debug!(card = item.text, "board card before any column"),
            },
            Line::Blank => {}
            _ => debug!(line, "ignoring non-list line in board"),
        }
    }
    factory::from_parts(BlockAttrs::Board { columns }, "", Vec::new())
}

fn calendar(body: &[&str]) -> Block {
    let mut events = Vec::new();
    for line in body {
        match classify(line) {
            Line::Item(item) => {
                let text = unescape_text_line(item.text);
                let (date, title) = text.split_once(' ').unwrap_or((text, ""));
                events.push(CalendarEvent {
                    date: date.to_string(),
                    title: title.to_string(),
                });
            }
            Line::Blank => {}
            _ => debug!(line, "ignoring non-list line in calendar"),
        }
    }
    factory::from_parts(BlockAttrs::Calendar { events }, "", Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_types::BlockKind;

    fn kinds(doc: &Document) -> Vec<BlockKind> {
        doc.blocks().iter().map(Block::kind).collect()
    }

    #[test]
    fn test_empty_input_is_placeholder() {
        assert!(decode("").is_placeholder());
        assert!(decode("  \n\n\t\n").is_placeholder());
    }

    #[test]
    fn test_heading_then_paragraph() {
        let doc = decode("# Hello\n\nWorld");
        assert_eq!(kinds(&doc), [BlockKind::Heading, BlockKind::Paragraph]);
        assert_eq!(doc.blocks()[0].heading_level(), Some(1));
        assert_eq!(doc.blocks()[0].content, "Hello");
        assert_eq!(doc.blocks()[1].content, "World");
    }

    #[test]
    fn test_blank_lines_collapse() {
        let doc = decode("a\n\n\n\nb");
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn test_mixed_list_styles_split() {
        let doc = decode("- a\n- b\n1. c\n2. d");
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.blocks()[0].attrs, BlockAttrs::List { ordered: false });
        assert_eq!(doc.blocks()[1].attrs, BlockAttrs::List { ordered: true });
        assert_eq!(doc.blocks()[1].children.len(), 2);
    }

    #[test]
    fn test_nested_items_and_continuations() {
        let doc = decode("* top\n  + [ ] child\n    more child\n  more top\n* next");
        let list = &doc.blocks()[0];
        assert_eq!(list.children.len(), 2);
        let top = &list.children[0];
        assert_eq!(top.content, "top\nmore top");
        assert_eq!(top.children.len(), 1);
        assert_eq!(top.children[0].content, "child\nmore child");
        assert_eq!(top.children[0].attrs, BlockAttrs::ListItem { checked: Some(false) });
    }

    #[test]
    fn test_alternate_syntax_accepted() {
        let doc = decode("***\n\n~~~py\nx = 1\n~~~\n\n![cat](c.png)\n\n3) three");
        assert_eq!(
            kinds(&doc),
            [BlockKind::Divider, BlockKind::Code, BlockKind::Image, BlockKind::List]
        );
        assert_eq!(
            doc.blocks()[1].attrs,
            BlockAttrs::Code {
                language: "py".into()
            }
        );
        assert_eq!(doc.blocks()[2].attrs.media().unwrap().src, "c.png");
        assert_eq!(doc.blocks()[3].attrs, BlockAttrs::List { ordered: true });
    }

    #[test]
    fn test_unclosed_fence_runs_to_end() {
        let doc = decode("```rust\nfn main() {}\n\n# not a heading");
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.blocks()[0].content, "fn main() {}\n\n# not a heading");
    }

    #[test]
    fn test_unknown_directive_with_url_becomes_bookmark() {
        let doc = decode("::youtube{src=\"https://youtu.be/x\"}");
        assert_eq!(
            doc.blocks()[0].attrs,
            BlockAttrs::Bookmark {
                url: "https://youtu.be/x".into(),
                title: String::new()
            }
        );
    }

    #[test]
    fn test_unknown_directive_without_url_kept_as_text() {
        let doc = decode("::sparkle{size=\"big\"}");
        assert_eq!(doc.blocks()[0].kind(), BlockKind::Paragraph);
        assert_eq!(doc.blocks()[0].content, "::sparkle{size=\"big\"}");
    }

    #[test]
    fn test_unknown_container_keeps_body() {
        let doc = decode(":::aside\ninner text\n:::\n\nafter");
        assert_eq!(
            kinds(&doc),
            [BlockKind::Paragraph, BlockKind::Paragraph, BlockKind::Paragraph]
        );
        assert_eq!(doc.blocks()[1].content, "inner text");
    }

    #[test]
    fn test_table_requires_separator() {
        let doc = decode("| a | b |\n|---|:-:|\n| 1 | 2 \\| 3 |");
        assert_eq!(
            doc.blocks()[0].attrs,
            BlockAttrs::Table {
                rows: vec![
                    vec!["a".into(), "b".into()],
                    vec!["1".into(), "2 | 3".into()]
                ]
            }
        );
        let not_table = decode("| just pipes |\nand text");
        assert_eq!(not_table.blocks()[0].kind(), BlockKind::Paragraph);
    }

    #[test]
    fn test_nested_containers() {
        let doc = decode(":::toggle{summary=\"Outer\"}\n:::callout{icon=\"!\"}\nnote\n:::\n:::\n\nend");
        assert_eq!(kinds(&doc), [BlockKind::Toggle, BlockKind::Paragraph]);
        let toggle = &doc.blocks()[0];
        assert_eq!(toggle.content, "Outer");
        assert_eq!(
            toggle.children[0].attrs,
            BlockAttrs::Callout { icon: "!".into() }
        );
        assert_eq!(toggle.children[0].content, "note");
    }

    #[test]
    fn test_malformed_media_id_is_dropped() {
        let doc = decode("::image{src=\"a.png\" media=\"nope\"}");
        let media = doc.blocks()[0].attrs.media().unwrap();
        assert_eq!(media.src, "a.png");
        assert_eq!(media.media_id, None);
    }
}
