//! Pages: the persisted unit whose body is a serialized Document.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::ids::{ContentId, PageId};

/// Longest slug accepted.
pub const MAX_SLUG_LEN: usize = 128;

/// Slug used when a title has nothing sluggable in it.
pub const FALLBACK_SLUG: &str = "untitled";

/// URL-safe page slug: lowercase ASCII letters, digits, and single hyphens.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

/// Errors from slug validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlugError {
    #[error("slug is empty")]
    Empty,
    #[error("slug is longer than {MAX_SLUG_LEN} characters")]
    TooLong,
    #[error("slug contains invalid character {0:?}")]
    InvalidChar(char),
    #[error("slug has a leading, trailing, or doubled hyphen")]
    BadHyphen,
}

impl Slug {
    /// Validate a slug. Malformed input is rejected, never coerced.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        if s.is_empty() {
            return Err(SlugError::Empty);
        }
        if s.len() > MAX_SLUG_LEN {
            return Err(SlugError::TooLong);
        }
        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
        {
            return Err(SlugError::InvalidChar(c));
        }
        if s.starts_with('-') || s.ends_with('-') || s.contains("--") {
            return Err(SlugError::BadHyphen);
        }
        Ok(Self(s.to_string()))
    }

    /// Derive a slug from a free-form title.
    ///
    /// ASCII letters and digits are kept (lowercased); every other run of
    /// characters becomes one hyphen.
    pub fn slugify(title: &str) -> Self {
        let mut out = String::with_capacity(title.len());
        let mut pending_hyphen = false;
        for c in title.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_hyphen && !out.is_empty() {
                    out.push('-');
                }
                pending_hyphen = false;
                out.push(c.to_ascii_lowercase());
            } else {
                pending_hyphen = true;
            }
            if out.len() >= MAX_SLUG_LEN {
                break;
            }
        }
        let trimmed = out.trim_end_matches('-');
        if trimmed.is_empty() {
            Self(FALLBACK_SLUG.to_string())
        } else {
            Self(trimmed.to_string())
        }
    }

    /// First of `base`, `base-2`, `base-3`, … not present in `taken`.
    pub fn unique(base: &Slug, taken: &HashSet<String>) -> Self {
        if !taken.contains(base.as_str()) {
            return base.clone();
        }
        (2u32..)
            .map(|n| {
                let suffix = format!("-{n}");
                let keep = MAX_SLUG_LEN.saturating_sub(suffix.len()).min(base.0.len());
                let stem = base.0[..keep].trim_end_matches('-');
                Slug(format!("{stem}{suffix}"))
            })
            .find(|candidate| !taken.contains(candidate.as_str()))
            .unwrap_or_else(|| base.clone())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Slug {
    type Error = SlugError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Slug::parse(&s)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> String {
        slug.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Page metadata stored alongside the body.
///
/// `title`, `slug`, `updated`, and `draft` are the recognized keys; any
/// other key is kept verbatim in `custom`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Frontmatter {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Publication date (ISO 8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Last update, Unix millis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<u64>,
    #[serde(default)]
    pub draft: bool,
    #[serde(flatten)]
    pub custom: BTreeMap<String, serde_json::Value>,
}

impl Frontmatter {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            draft: true,
            ..Default::default()
        }
    }
}

/// Publication state of a page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub enum PageStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

/// Who can see a page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Unlisted,
    Public,
}

/// A persisted page. `body` is the Markdown serialization of its Document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkdownPage {
    pub id: PageId,
    pub content_id: ContentId,
    pub slug: Slug,
    pub frontmatter: Frontmatter,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub status: PageStatus,
    #[serde(default)]
    pub visibility: Visibility,
    /// Monotonic revision assigned by the persistence gateway.
    #[serde(default)]
    pub version: u64,
    /// Unix millis.
    pub created_at: u64,
    /// Unix millis.
    pub updated_at: u64,
}

impl MarkdownPage {
    /// A new, unsaved page with an empty body.
    pub fn new(content_id: ContentId, slug: Slug, frontmatter: Frontmatter) -> Self {
        let now = crate::now_millis();
        Self {
            id: PageId::new(),
            content_id,
            slug,
            frontmatter,
            body: String::new(),
            status: PageStatus::Draft,
            visibility: Visibility::Private,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn title(&self) -> &str {
        &self.frontmatter.title
    }
}
