//! In-memory persistence gateway.
//!
//! Used by tests and the CLI. All data is lost when dropped. Writes can be
//! made to fail or to take a while, which is how the autosave tests drive
//! the failure and in-flight paths.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use folio_types::{ContentId, MarkdownPage, MediaItem, PageId};
use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::gateway::{
    CreatePageRequest, CreatedPage, GatewayError, GatewayResult, PersistenceGateway,
    UpdatePageRequest,
};

/// In-memory gateway.
///
/// Thread-safe via internal `RwLock`s.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    pages: RwLock<HashMap<PageId, MarkdownPage>>,
    media: RwLock<HashMap<ContentId, Vec<MediaItem>>>,
    /// Errors returned by the next writes, oldest first.
    failures: Mutex<VecDeque<GatewayError>>,
    latency: Mutex<Duration>,
    updates: AtomicUsize,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `page` as-is, replacing any page with the same id.
    pub fn insert_page(&self, page: MarkdownPage) {
        self.pages.write().insert(page.id, page);
    }

    pub fn add_media(&self, content_id: ContentId, item: MediaItem) {
        self.media.write().entry(content_id).or_default().push(item);
    }

    /// Make the next write (create, update, or delete) fail with `error`.
    pub fn fail_next_write(&self, error: GatewayError) {
        self.failures.lock().push_back(error);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Number of `update_page` calls, including failed ones.
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Synchronous read for assertions.
    pub fn page(&self, id: PageId) -> Option<MarkdownPage> {
        self.pages.read().get(&id).cloned()
    }

    async fn delay(&self) {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn injected_failure(&self) -> GatewayResult<()> {
        match self.failures.lock().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn slug_taken(&self, content_id: ContentId, slug: &str, except: Option<PageId>) -> bool {
        self.pages.read().values().any(|p| {
            p.content_id == content_id && p.slug.as_str() == slug && Some(p.id) != except
        })
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn list_pages(&self, content_id: ContentId) -> GatewayResult<Vec<MarkdownPage>> {
        self.delay().await;
        let mut pages: Vec<_> = self
            .pages
            .read()
            .values()
            .filter(|p| p.content_id == content_id)
            .cloned()
            .collect();
        pages.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(pages)
    }

    async fn get_page(&self, id: PageId) -> GatewayResult<MarkdownPage> {
        self.delay().await;
        self.page(id)
            .ok_or_else(|| GatewayError::NotFound(format!("page {id}")))
    }

    async fn create_page(&self, request: CreatePageRequest) -> GatewayResult<CreatedPage> {
        self.delay().await;
        self.injected_failure()?;
        if request.frontmatter.title.trim().is_empty() {
            return Err(GatewayError::Rejected("title is required".into()));
        }
        if self.slug_taken(request.content_id, request.slug.as_str(), None) {
            return Err(GatewayError::Conflict(format!(
                "slug {} already in use",
                request.slug
            )));
        }
        let mut page = MarkdownPage::new(request.content_id, request.slug, request.frontmatter);
        page.body = request.body;
        page.created_at = request.created_at;
        page.updated_at = request.updated_at;
        page.version = 1;
        self.insert_page(page.clone());
        trace!(page = %page.id, "memory gateway created page");
        Ok(CreatedPage { id: page.id, page })
    }

    async fn update_page(&self, request: UpdatePageRequest) -> GatewayResult<MarkdownPage> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.injected_failure()?;
        if self.slug_taken(request.content_id, request.slug.as_str(), Some(request.id)) {
            return Err(GatewayError::Conflict(format!(
                "slug {} already in use",
                request.slug
            )));
        }
        let mut pages = self.pages.write();
        let page = pages
            .get_mut(&request.id)
            .ok_or_else(|| GatewayError::NotFound(format!("page {}", request.id)))?;
        if page.content_id != request.content_id {
            return Err(GatewayError::Rejected(format!(
                "page {} belongs to another content space",
                request.id
            )));
        }
        page.slug = request.slug;
        page.frontmatter = request.frontmatter;
        if let Some(body) = request.body {
            page.body = body;
        }
        page.updated_at = request.updated_at;
        page.version += 1;
        trace!(page = %page.id, version = page.version, "memory gateway updated page");
        Ok(page.clone())
    }

    async fn delete_page(&self, id: PageId) -> GatewayResult<()> {
        self.delay().await;
        self.injected_failure()?;
        self.pages
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| GatewayError::NotFound(format!("page {id}")))
    }

    async fn list_media(&self, content_id: ContentId) -> GatewayResult<Vec<MediaItem>> {
        self.delay().await;
        Ok(self.media.read().get(&content_id).cloned().unwrap_or_default())
    }
}
