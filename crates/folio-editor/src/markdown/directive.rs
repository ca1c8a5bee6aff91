//! Directive lines: `::name{key="value" …}` and `:::name{…}`.

use std::sync::LazyLock;

use regex::Regex;

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s"'}]+"#).expect("url pattern is valid"));

/// A parsed directive head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Directive {
    pub name: String,
    pub attrs: Vec<(String, String)>,
}

impl Directive {
    /// Value of an attribute, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of an attribute, or `""`.
    pub fn text(&self, key: &str) -> String {
        self.get(key).unwrap_or_default().to_string()
    }

    /// Parse a numeric attribute, falling back to `default` when absent or
    /// malformed.
    pub fn number<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Boolean attribute. A bare key counts as set.
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.get(key), Some("" | "true" | "yes" | "1"))
    }

    /// First URL-looking value: `src`, `url`, or `href` attributes first.
    pub fn url(&self) -> Option<String> {
        ["src", "url", "href"]
            .iter()
            .filter_map(|k| self.get(k))
            .find(|v| !v.is_empty())
            .map(str::to_string)
    }
}

/// Parse a directive line (leading colons included).
///
/// Returns `None` for anything malformed: a bad name, an unterminated brace
/// or quote, or trailing text after the closing brace.
pub(crate) fn parse(line: &str) -> Option<Directive> {
    let rest = line.trim().trim_start_matches(':');
    let name_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        .unwrap_or(rest.len());
    if name_len == 0 {
        return None;
    }
    let name = rest[..name_len].to_ascii_lowercase();
    let tail = rest[name_len..].trim();
    if tail.is_empty() {
        return Some(Directive {
            name,
            attrs: Vec::new(),
        });
    }
    let body = tail.strip_prefix('{')?.strip_suffix('}')?;
    let attrs = parse_attrs(body)?;
    Some(Directive { name, attrs })
}

fn parse_attrs(body: &str) -> Option<Vec<(String, String)>> {
    let mut attrs = Vec::new();
    let mut chars = body.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            return Some(attrs);
        }
        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-') {
            key.push(c);
        }
        if key.is_empty() {
            return None;
        }
        if chars.next_if_eq(&'=').is_none() {
            // Bare key.
            attrs.push((key, String::new()));
            continue;
        }
        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            loop {
                match chars.next()? {
                    '"' => break,
                    '\\' => match chars.next()? {
                        'n' => value.push('\n'),
                        other => value.push(other),
                    },
                    c => value.push(c),
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                value.push(c);
            }
        }
        attrs.push((key, value));
    }
}

/// Write a directive head. Attributes are emitted in the order given.
pub(crate) fn format(colons: usize, name: &str, attrs: &[(&str, String)]) -> String {
    let mut out = ":".repeat(colons);
    out.push_str(name);
    if attrs.is_empty() {
        return out;
    }
    out.push('{');
    for (i, (key, value)) in attrs.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(key);
        out.push_str("=\"");
        escape_value_into(value, &mut out);
        out.push('"');
    }
    out.push('}');
    out
}

fn escape_value_into(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
}

/// First `http(s)://` URL anywhere in a raw line.
pub(crate) fn find_url(line: &str) -> Option<String> {
    URL.find(line).map(|m| m.as_str().to_string())
}
