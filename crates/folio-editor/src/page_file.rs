//! Page files: Markdown body with an optional TOML frontmatter block.
//!
//! ```text
//! +++
//! title = "Hello"
//! draft = true
//! +++
//! # Hello
//! ```

use folio_types::Frontmatter;
use thiserror::Error;

/// Line that opens and closes the frontmatter block.
pub const FENCE: &str = "+++";

/// Errors from reading or writing page files.
#[derive(Error, Debug)]
pub enum PageFileError {
    /// Frontmatter is present but is not valid TOML for [`Frontmatter`].
    #[error("invalid frontmatter: {0}")]
    Frontmatter(#[from] toml::de::Error),

    #[error("frontmatter opened with {FENCE} but never closed")]
    Unterminated,

    #[error("failed to serialize frontmatter: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Split a page file into frontmatter (if any) and body.
///
/// The body is returned as written, minus the single newline that follows
/// the closing fence.
pub fn split(text: &str) -> Result<(Option<Frontmatter>, &str), PageFileError> {
    let Some(rest) = strip_fence_line(text) else {
        return Ok((None, text));
    };
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FENCE {
            let frontmatter: Frontmatter = toml::from_str(&rest[..offset])?;
            let body = &rest[offset + line.len()..];
            return Ok((Some(frontmatter), body));
        }
        offset += line.len();
    }
    Err(PageFileError::Unterminated)
}

fn strip_fence_line(text: &str) -> Option<&str> {
    let rest = text.strip_prefix(FENCE)?;
    rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))
}

/// Write a page file: fenced frontmatter, then the body.
pub fn join(frontmatter: &Frontmatter, body: &str) -> Result<String, PageFileError> {
    let toml = toml::to_string(frontmatter)?;
    let mut out = String::with_capacity(toml.len() + body.len() + 16);
    out.push_str(FENCE);
    out.push('\n');
    out.push_str(&toml);
    if !toml.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(FENCE);
    out.push('\n');
    out.push_str(body);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_without_frontmatter() {
        let (fm, body) = split("# Just a body").unwrap();
        assert!(fm.is_none());
        assert_eq!(body, "# Just a body");
    }

    #[test]
    fn test_split_reads_known_and_custom_keys() {
        let text = "+++\ntitle = \"Hello\"\ndraft = true\ntags = [\"a\"]\nlayout = \"wide\"\n+++\n# Hello\n";
        let (fm, body) = split(text).unwrap();
        let fm = fm.unwrap();
        assert_eq!(fm.title, "Hello");
        assert!(fm.draft);
        assert_eq!(fm.tags, ["a"]);
        assert_eq!(fm.custom["layout"], "wide");
        assert_eq!(body, "# Hello\n");
    }

    #[test]
    fn test_split_rejects_bad_toml() {
        let err = split("+++\ntitle = \n+++\nbody").unwrap_err();
        assert!(matches!(err, PageFileError::Frontmatter(_)));
    }

    #[test]
    fn test_split_rejects_unterminated() {
        assert!(matches!(
            split("+++\ntitle = \"x\"\n"),
            Err(PageFileError::Unterminated)
        ));
    }

    #[test]
    fn test_join_then_split() {
        let mut fm = Frontmatter::titled("Notes");
        fm.updated = Some(1_700_000_000_000);
        let text = join(&fm, "Body").unwrap();
        assert!(text.starts_with("+++\n"));
        let (back, body) = split(&text).unwrap();
        assert_eq!(back.unwrap(), fm);
        assert_eq!(body, "Body");
    }
}
