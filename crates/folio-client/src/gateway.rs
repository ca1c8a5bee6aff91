//! Persistence gateway contract.
//!
//! The remote store is external; Folio only needs these six calls. Every
//! implementation must be `Send + Sync` so one instance can be shared between
//! the session and the autosave worker.

use async_trait::async_trait;
use folio_types::{ContentId, Frontmatter, MarkdownPage, MediaItem, PageId, Slug};

/// Errors a gateway can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("persistence unavailable: {0}")]
    Unavailable(String),
    #[error("request rejected: {0}")]
    Rejected(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Request to create a page.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatePageRequest {
    pub content_id: ContentId,
    pub slug: Slug,
    pub frontmatter: Frontmatter,
    pub body: String,
    /// Unix millis.
    pub created_at: u64,
    /// Unix millis.
    pub updated_at: u64,
}

/// Result of [`PersistenceGateway::create_page`].
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedPage {
    pub id: PageId,
    pub page: MarkdownPage,
}

/// Request to update a page. `body: None` leaves the stored body alone.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePageRequest {
    pub id: PageId,
    pub content_id: ContentId,
    pub slug: Slug,
    pub frontmatter: Frontmatter,
    pub body: Option<String>,
    /// Unix millis.
    pub updated_at: u64,
}

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Pages belonging to one content space.
    async fn list_pages(&self, content_id: ContentId) -> GatewayResult<Vec<MarkdownPage>>;

    async fn get_page(&self, id: PageId) -> GatewayResult<MarkdownPage>;

    async fn create_page(&self, request: CreatePageRequest) -> GatewayResult<CreatedPage>;

    /// Returns the stored page after the update.
    async fn update_page(&self, request: UpdatePageRequest) -> GatewayResult<MarkdownPage>;

    async fn delete_page(&self, id: PageId) -> GatewayResult<()>;

    async fn list_media(&self, content_id: ContentId) -> GatewayResult<Vec<MediaItem>>;
}
