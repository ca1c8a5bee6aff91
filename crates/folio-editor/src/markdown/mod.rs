//! Markdown codec: Document ⇄ Markdown text.
//!
//! Both directions are pure functions. The grammar is a block-shaped subset
//! of Markdown plus directives for blocks Markdown has no syntax for:
//!
//! ```text
//! # Heading                      heading (level = number of #)
//! plain lines                    paragraph
//! - item / 1. item / - [x] item  list (nested items indented 2 spaces)
//! > quoted                       quote
//! ```lang … ```                  code (```{=html} … ``` is raw markup)
//! $$ … $$                        math (fence grows past any `$$` line inside)
//! ---                            divider
//! | a | b | + | --- | --- |      table (first row is the header)
//! ::image{src="…" alt="…"}       leaf directive: image, video, audio, file,
//!                                bookmark, toc, spacer, event
//! :::toggle{summary="…"}         container directive: callout, toggle,
//! …                              gallery, board, calendar
//! :::
//! ```
//!
//! A paragraph line that would otherwise be read as one of the constructs
//! above is written with a leading `\`. A line holding only `\` is an empty
//! line inside a paragraph (or an empty paragraph on its own).
//!
//! Round trip: for any Document built by the factory and editor,
//! `decode(&encode(doc))` is structurally equal to `doc`, with these
//! normalizations applied by `encode`: heading text is trimmed, table cells
//! are trimmed, rows with no cells get one empty cell, empty code languages
//! become `plaintext`, and a list item at the top level is written as a
//! one-item list. The editor rejects values the grammar cannot hold on
//! their line (see `BlockAttrs::validate`) as well as multi-line headings.
//! A Document built by hand with a multi-line heading has its newlines
//! folded to spaces.

mod decode;
mod directive;
mod encode;

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

pub use decode::decode;
pub use encode::encode;

/// Closing line of a container directive.
pub(crate) const CONTAINER_CLOSE: &str = ":::";

static IMAGE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^!\[([^\]]*)\]\(([^\s)]*)(?:\s+"([^"]*)")?\)$"#).expect("image pattern is valid")
});

static TABLE_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\|?\s*:?-+:?\s*(\|\s*:?-+:?\s*)*\|?$").expect("separator pattern is valid")
});

/// One list-item line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ItemLine<'a> {
    /// Leading whitespace width (tabs count as 4).
    pub indent: usize,
    pub ordered: bool,
    pub checked: Option<bool>,
    /// Item text after the marker and checkbox, still escaped.
    pub text: &'a str,
}

/// Leading-syntax classification of a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Line<'a> {
    Blank,
    Heading { level: u8, text: &'a str },
    Fence { marker: char, len: usize, info: &'a str },
    /// Two or more `$` alone on a line.
    MathFence { len: usize },
    Rule,
    Quote(&'a str),
    Item(ItemLine<'a>),
    /// `::name{…}` (trimmed line).
    Leaf(&'a str),
    /// `:::name{…}` (trimmed line).
    ContainerOpen(&'a str),
    ContainerClose,
    /// Starts with `|`. Only a table when followed by a separator row.
    TableRow,
    Image(&'a str),
    Text,
}

impl Line<'_> {
    /// Whether this line begins something other than paragraph text.
    pub(crate) fn is_construct(&self) -> bool {
        !matches!(self, Line::Text | Line::Blank)
    }
}

/// Classify a line by its leading syntax.
pub(crate) fn classify(line: &str) -> Line<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Line::Blank;
    }
    if let Some(heading) = heading_line(trimmed) {
        return heading;
    }
    if let Some(fence) = fence_line(trimmed) {
        return fence;
    }
    if let Some(len) = dollar_run(trimmed) {
        return Line::MathFence { len };
    }
    if is_rule(trimmed) {
        return Line::Rule;
    }
    if let Some(rest) = trimmed.strip_prefix('>') {
        return Line::Quote(rest.strip_prefix(' ').unwrap_or(rest));
    }
    if let Some(item) = item_line(line) {
        return Line::Item(item);
    }
    if trimmed.starts_with(':') {
        let colons = trimmed.chars().take_while(|c| *c == ':').count();
        if colons >= 3 {
            return if trimmed.len() == colons {
                Line::ContainerClose
            } else {
                Line::ContainerOpen(trimmed)
            };
        }
        if colons == 2 {
            return Line::Leaf(trimmed);
        }
    }
    if trimmed.starts_with('|') {
        return Line::TableRow;
    }
    if IMAGE_LINE.is_match(trimmed) {
        return Line::Image(trimmed);
    }
    Line::Text
}

fn heading_line(trimmed: &str) -> Option<Line<'_>> {
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&hashes) {
        return None;
    }
    let rest = &trimmed[hashes..];
    if rest.is_empty() {
        return Some(Line::Heading {
            level: hashes as u8,
            text: "",
        });
    }
    if !rest.starts_with([' ', '\t']) {
        return None;
    }
    Some(Line::Heading {
        level: hashes as u8,
        text: rest.trim(),
    })
}

fn fence_line(trimmed: &str) -> Option<Line<'_>> {
    let marker = trimmed.chars().next()?;
    if marker != '`' && marker != '~' {
        return None;
    }
    let len = trimmed.chars().take_while(|c| *c == marker).count();
    if len < 3 {
        return None;
    }
    let info = trimmed[len..].trim();
    // A backtick fence's info string may not contain backticks.
    if marker == '`' && info.contains('`') {
        return None;
    }
    Some(Line::Fence { marker, len, info })
}

/// Length of a line made only of `$`, when it is at least two long.
pub(crate) fn dollar_run(trimmed: &str) -> Option<usize> {
    let len = trimmed.len();
    (len >= 2 && trimmed.bytes().all(|b| b == b'$')).then_some(len)
}

fn is_rule(trimmed: &str) -> bool {
    let Some(first) = trimmed.chars().next() else {
        return false;
    };
    if !matches!(first, '-' | '*' | '_') {
        return false;
    }
    let mut count = 0;
    for c in trimmed.chars() {
        if c == first {
            count += 1;
        } else if c != ' ' && c != '\t' {
            return false;
        }
    }
    count >= 3
}

fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

fn item_line(line: &str) -> Option<ItemLine<'_>> {
    let indent = indent_width(line);
    let body = line.trim_start();
    let (ordered, after_marker) = if let Some(rest) = body.strip_prefix(['-', '*', '+']) {
        (false, rest)
    } else {
        let digits = body.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 || digits > 9 {
            return None;
        }
        let rest = &body[digits..];
        (true, rest.strip_prefix(['.', ')'])?)
    };
    let text = if after_marker.is_empty() {
        after_marker
    } else {
        after_marker.strip_prefix(' ')?
    };
    let (checked, text) = checkbox(text);
    Some(ItemLine {
        indent,
        ordered,
        checked,
        text,
    })
}

/// Split a leading `[ ]` / `[x]` checkbox off item text.
fn checkbox(text: &str) -> (Option<bool>, &str) {
    for (prefix, state) in [("[ ]", false), ("[x]", true), ("[X]", true)] {
        if let Some(rest) = text.strip_prefix(prefix) {
            if rest.is_empty() {
                return (Some(state), rest);
            }
            if let Some(rest) = rest.strip_prefix(' ') {
                return (Some(state), rest);
            }
        }
    }
    (None, text)
}

/// Whether a table separator row (`| --- | :-: |`).
pub(crate) fn is_table_separator(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.contains('-') && TABLE_SEPARATOR.is_match(trimmed)
}

/// Captures of a standard Markdown image line: `(alt, src, title)`.
pub(crate) fn image_parts(line: &str) -> Option<(String, String, String)> {
    let caps = IMAGE_LINE.captures(line.trim())?;
    let get = |i| caps.get(i).map(|m| m.as_str().to_string()).unwrap_or_default();
    Some((get(1), get(2), get(3)))
}

/// Escape one line of free text so the decoder reads it back as text.
pub(crate) fn escape_text_line(line: &str) -> Cow<'_, str> {
    let needs_escape = line.is_empty()
        || line.starts_with('\\')
        || line.starts_with(char::is_whitespace)
        || classify(line).is_construct();
    if needs_escape {
        Cow::Owned(format!("\\{line}"))
    } else {
        Cow::Borrowed(line)
    }
}

/// Reverse of [`escape_text_line`].
pub(crate) fn unescape_text_line(line: &str) -> &str {
    line.strip_prefix('\\').unwrap_or(line)
}
