//! Document → Markdown.

use folio_types::factory::{DEFAULT_CODE_LANGUAGE, DEFAULT_RAW_FORMAT};
use folio_types::{Block, BlockAttrs, BoardColumn, CalendarEvent, Document, MediaAttrs};
use tracing::debug;

use super::{CONTAINER_CLOSE, Line, classify, directive, dollar_run, escape_text_line};

/// Serialize a Document to Markdown.
///
/// Blocks are separated by one blank line and the output has no trailing
/// newline. The placeholder document (one empty paragraph) encodes to `""`.
pub fn encode(doc: &Document) -> String {
    if doc.is_placeholder() {
        return String::new();
    }
    let mut chunks = Vec::with_capacity(doc.len());
    encode_blocks(doc.blocks(), &mut chunks);
    chunks.join("\n\n")
}

fn encode_blocks(blocks: &[Block], chunks: &mut Vec<String>) {
    for block in blocks {
        encode_block(block, chunks);
    }
}

fn encode_block(block: &Block, chunks: &mut Vec<String>) {
    let mut lines = Vec::new();
    let content = block.content.as_str();

    match &block.attrs {
        BlockAttrs::Paragraph => text_lines(content, &mut lines),
        BlockAttrs::Heading { level } => lines.push(heading(*level, content)),
        BlockAttrs::List { ordered } => {
            list_items(&block.children, *ordered, 0, &mut lines);
            if lines.is_empty() {
                // An itemless list has no Markdown form; write one empty item.
                lines.push(if *ordered { "1." } else { "-" }.to_string());
            }
        }
        BlockAttrs::ListItem { .. } => {
            // A bare item outside any list is written as a one-item list.
            list_items(std::slice::from_ref(block), false, 0, &mut lines)
        }
        BlockAttrs::Quote => quote(content, &mut lines),
        BlockAttrs::Callout { icon } => {
            lines.push(directive::format(3, "callout", &[("icon", icon.clone())]));
            if !content.is_empty() {
                text_lines(content, &mut lines);
            }
            lines.push(CONTAINER_CLOSE.to_string());
        }
        BlockAttrs::Divider => lines.push("---".to_string()),
        BlockAttrs::Image(media) => lines.push(media_directive("image", media)),
        BlockAttrs::Video(media) => lines.push(media_directive("video", media)),
        BlockAttrs::Audio(media) => lines.push(media_directive("audio", media)),
        BlockAttrs::File(media) => lines.push(media_directive("file", media)),
        BlockAttrs::Bookmark { url, title } => {
            let mut attrs = vec![("url", url.clone())];
            if !title.is_empty() {
                attrs.push(("title", title.clone()));
            }
            lines.push(directive::format(2, "bookmark", &attrs));
        }
        BlockAttrs::Code { language } => {
            let language = language.trim();
            let info = if language.is_empty() {
                DEFAULT_CODE_LANGUAGE
            } else {
                language
            };
            fenced(info, content, &mut lines);
        }
        BlockAttrs::RawMarkup { format } => {
            let format = format.trim();
            let format = if format.is_empty() {
                DEFAULT_RAW_FORMAT
            } else {
                format
            };
            fenced(&format!("{{={format}}}"), content, &mut lines);
        }
        BlockAttrs::Math => {
            let longest = content.split('\n').filter_map(|l| dollar_run(l.trim())).max();
            let fence = "$".repeat(longest.map_or(2, |run| run + 1));
            lines.push(fence.clone());
            if !content.is_empty() {
                lines.extend(content.split('\n').map(str::to_string));
            }
            lines.push(fence);
        }
        BlockAttrs::Toggle { open } => {
            let mut attrs = Vec::new();
            if !content.is_empty() {
                attrs.push(("summary", content.to_string()));
            }
            if *open {
                attrs.push(("open", "true".to_string()));
            }
            lines.push(directive::format(3, "toggle", &attrs));
            nested(&block.children, &mut lines);
            lines.push(CONTAINER_CLOSE.to_string());
        }
        BlockAttrs::Table { rows } => table(rows, &mut lines),
        BlockAttrs::TableOfContents { max_depth } => lines.push(directive::format(
            2,
            "toc",
            &[("depth", max_depth.to_string())],
        )),
        BlockAttrs::Gallery { columns } => {
            lines.push(directive::format(
                3,
                "gallery",
                &[("columns", columns.to_string())],
            ));
            nested(&block.children, &mut lines);
            lines.push(CONTAINER_CLOSE.to_string());
        }
        BlockAttrs::Board { columns } => board(columns, &mut lines),
        BlockAttrs::Calendar { events } => calendar(events, &mut lines),
        BlockAttrs::Spacer { height } => lines.push(directive::format(
            2,
            "spacer",
            &[("height", height.to_string())],
        )),
    }

    chunks.push(lines.join("\n"));

    if !block.kind().has_children() && !block.children.is_empty() {
        debug!(
            block = %block.id,
            kind = %block.kind(),
            "children of a leaf block written as following siblings"
        );
        encode_blocks(&block.children, chunks);
    }
}

// ── Text ────────────────────────────────────────────────────────────────────

/// Escaped free-text lines. An empty string still produces one `\` line.
fn text_lines(content: &str, lines: &mut Vec<String>) {
    lines.extend(content.split('\n').map(|l| escape_text_line(l).into_owned()));
}

fn heading(level: u8, content: &str) -> String {
    let hashes = "#".repeat(level.clamp(1, 6) as usize);
    let text = content.replace(['\r', '\n'], " ");
    let text = text.trim();
    if text.is_empty() {
        hashes
    } else {
        format!("{hashes} {text}")
    }
}

fn quote(content: &str, lines: &mut Vec<String>) {
    for line in content.split('\n') {
        if line.is_empty() {
            lines.push(">".to_string());
        } else {
            lines.push(format!("> {line}"));
        }
    }
}

fn fenced(info: &str, content: &str, lines: &mut Vec<String>) {
    let fence = "`".repeat(longest_run(content, '`').max(2) + 1);
    lines.push(format!("{fence}{info}"));
    if !content.is_empty() {
        lines.extend(content.split('\n').map(str::to_string));
    }
    lines.push(fence);
}

fn longest_run(text: &str, ch: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == ch {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// Children of a container, blank-line separated like top-level blocks.
fn nested(children: &[Block], lines: &mut Vec<String>) {
    let mut chunks = Vec::new();
    encode_blocks(children, &mut chunks);
    if !chunks.is_empty() {
        lines.push(chunks.join("\n\n"));
    }
}

// ── Lists ───────────────────────────────────────────────────────────────────

fn list_items(items: &[Block], ordered: bool, depth: usize, lines: &mut Vec<String>) {
    let mut number = 0;
    for item in items {
        let checked = match &item.attrs {
            BlockAttrs::ListItem { checked } => *checked,
            BlockAttrs::List { .. } => {
                // A list nested directly in a list continues at the same depth.
                list_items(&item.children, ordered, depth, lines);
                continue;
            }
            _ => {
                debug!(block = %item.id, kind = %item.kind(), "non-item block written as list item");
                None
            }
        };
        number += 1;
        let marker = if ordered {
            format!("{number}.")
        } else {
            "-".to_string()
        };
        let mut text = item.content.split('\n');
        let first = text.next().unwrap_or_default();
        lines.push(item_line(depth * 2, &marker, checked, first));
        let indent = " ".repeat((depth + 1) * 2);
        for line in text {
            lines.push(format!("{indent}{}", escape_text_line(line)));
        }
        list_items(&item.children, ordered, depth + 1, lines);
    }
}

/// One item line, escaping the text when it would not read back verbatim.
pub(super) fn item_line(indent: usize, marker: &str, checked: Option<bool>, text: &str) -> String {
    let build = |text: &str| {
        let mut line = " ".repeat(indent);
        line.push_str(marker);
        match checked {
            Some(true) => line.push_str(" [x]"),
            Some(false) => line.push_str(" [ ]"),
            None => {}
        }
        if !text.is_empty() {
            line.push(' ');
            line.push_str(text);
        }
        line
    };
    let plain = build(text);
    if text.is_empty() {
        return plain;
    }
    let reads_back = !text.starts_with('\\')
        && !text.starts_with(char::is_whitespace)
        && matches!(classify(&plain), Line::Item(item) if item.text == text && item.checked == checked);
    if reads_back {
        plain
    } else {
        build(&format!("\\{text}"))
    }
}

// ── Tables ──────────────────────────────────────────────────────────────────

fn table(rows: &[Vec<String>], lines: &mut Vec<String>) {
    let empty_row = vec![String::new()];
    let fallback = [empty_row.clone()];
    let rows = if rows.is_empty() { &fallback[..] } else { rows };
    for (i, row) in rows.iter().enumerate() {
        let row = if row.is_empty() { &empty_row } else { row };
        let cells: Vec<String> = row.iter().map(|c| escape_cell(c.trim())).collect();
        lines.push(format!("| {} |", cells.join(" | ")));
        if i == 0 {
            lines.push(format!("| {} |", vec!["---"; cells.len()].join(" | ")));
        }
    }
}

fn escape_cell(cell: &str) -> String {
    let mut out = String::with_capacity(cell.len());
    for c in cell.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '|' => out.push_str("\\|"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out
}

// ── Directives ──────────────────────────────────────────────────────────────

fn media_directive(name: &str, media: &MediaAttrs) -> String {
    let mut attrs = vec![("src", media.src.clone())];
    if !media.alt.is_empty() {
        attrs.push(("alt", media.alt.clone()));
    }
    if !media.caption.is_empty() {
        attrs.push(("caption", media.caption.clone()));
    }
    if let Some(id) = media.media_id {
        attrs.push(("media", id.to_string()));
    }
    directive::format(2, name, &attrs)
}

fn board(columns: &[BoardColumn], lines: &mut Vec<String>) {
    lines.push(directive::format(3, "board", &[]));
    for column in columns {
        lines.push(item_line(0, "-", None, &single_line(&column.title)));
        for card in &column.cards {
            lines.push(item_line(2, "-", None, &single_line(card)));
        }
    }
    lines.push(CONTAINER_CLOSE.to_string());
}

fn calendar(events: &[CalendarEvent], lines: &mut Vec<String>) {
    lines.push(directive::format(3, "calendar", &[]));
    for event in events {
        let text = format!("{} {}", event.date.trim(), single_line(&event.title));
        lines.push(item_line(0, "-", None, &text));
    }
    lines.push(CONTAINER_CLOSE.to_string());
}

fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}
