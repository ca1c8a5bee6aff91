//! Editor session: page flows on top of the editor, autosave, and gateway.
//!
//! The session is the only place that touches all three. Editor operations
//! stay synchronous; after each one that changed the document, the new
//! Markdown snapshot is handed to autosave.

use std::collections::HashSet;
use std::sync::Arc;

use folio_editor::{EditorError, EditorState};
use folio_types::{ContentId, Frontmatter, MarkdownPage, MediaItem, PageId, Slug, now_millis};
use tracing::{debug, info};

use crate::autosave::{AutosaveHandle, AutosaveStatus, SaveError, SaveTarget, spawn_autosave};
use crate::config::AutosaveConfig;
use crate::gateway::{CreatePageRequest, GatewayError, PersistenceGateway};

/// Errors from session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Editor(#[from] EditorError),
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Save(#[from] SaveError),
}

pub type SessionResult<T> = Result<T, SessionError>;

pub struct EditorSession {
    editor: EditorState,
    autosave: AutosaveHandle,
    gateway: Arc<dyn PersistenceGateway>,
}

impl EditorSession {
    /// New session with its own autosave worker. Needs a tokio runtime.
    pub fn new(gateway: Arc<dyn PersistenceGateway>, config: &AutosaveConfig) -> Self {
        let autosave = spawn_autosave(Arc::clone(&gateway), config);
        Self {
            editor: EditorState::new(),
            autosave,
            gateway,
        }
    }

    pub fn editor(&self) -> &EditorState {
        &self.editor
    }

    pub fn autosave(&self) -> &AutosaveHandle {
        &self.autosave
    }

    pub fn autosave_status(&self) -> AutosaveStatus {
        self.autosave.status()
    }

    pub fn current_page_id(&self) -> Option<PageId> {
        self.editor.page().map(|p| p.id)
    }

    // ========================================================================
    // Page flows
    // ========================================================================

    /// Fetch, decode, and start editing a page.
    pub async fn open_page(&mut self, id: PageId) -> SessionResult<()> {
        let page = self.gateway.get_page(id).await?;
        self.load(page);
        Ok(())
    }

    /// Create a page titled `title` with a slug unique in `content_id`, then
    /// open it. The page is stamped with the current time.
    pub async fn create_page(
        &mut self,
        content_id: ContentId,
        title: &str,
    ) -> SessionResult<PageId> {
        let taken: HashSet<String> = self
            .gateway
            .list_pages(content_id)
            .await?
            .into_iter()
            .map(|p| p.slug.to_string())
            .collect();
        let slug = Slug::unique(&Slug::slugify(title), &taken);
        let now = now_millis();
        let mut frontmatter = Frontmatter::titled(title);
        frontmatter.updated = Some(now);
        let created = self
            .gateway
            .create_page(CreatePageRequest {
                content_id,
                slug,
                frontmatter,
                body: String::new(),
                created_at: now,
                updated_at: now,
            })
            .await?;
        info!(page = %created.id, slug = %created.page.slug, "page created");
        self.load(created.page);
        Ok(created.id)
    }

    /// Delete a page, closing it if it is the one being edited. A failed
    /// delete leaves the open page and its edits in place.
    pub async fn delete_page(&mut self, id: PageId) -> SessionResult<()> {
        self.gateway.delete_page(id).await?;
        info!(page = %id, "page deleted");
        if self.current_page_id() == Some(id) {
            self.close();
        }
        Ok(())
    }

    /// Stop editing. Unsaved edits are dropped; save first if they matter.
    pub fn close(&mut self) {
        self.autosave.set_target(None);
        self.editor.close();
    }

    fn load(&mut self, page: MarkdownPage) {
        let id = page.id;
        self.editor.load_page(page);
        if let Some(page) = self.editor.page() {
            let target = SaveTarget::for_page(page, self.editor.markdown());
            self.autosave.set_target(Some(target));
        }
        info!(page = %id, blocks = self.editor.document().len(), "page opened");
    }

    // ========================================================================
    // Editing and saving
    // ========================================================================

    /// Run an editor operation. If it changed the document, the new Markdown
    /// goes to autosave.
    pub fn edit<T>(
        &mut self,
        op: impl FnOnce(&mut EditorState) -> folio_editor::Result<T>,
    ) -> SessionResult<T> {
        if !self.editor.is_editing() {
            return Err(EditorError::NotEditing.into());
        }
        let before = self.editor.version();
        let out = op(&mut self.editor)?;
        if self.editor.version() != before {
            self.autosave
                .update_markdown(self.editor.markdown(), self.editor.version());
        }
        Ok(out)
    }

    /// Save immediately and wait. The document stays in memory either way.
    pub async fn save_now(&mut self) -> SessionResult<MarkdownPage> {
        let page = self.autosave.save_now().await?;
        self.sync_saved_state();
        Ok(page)
    }

    /// Clear the editor's dirty flag if autosave has committed the current
    /// revision of the current page. Returns whether it did.
    pub fn sync_saved_state(&mut self) -> bool {
        let status = self.autosave.status();
        let current = self.current_page_id();
        match status.saved_revision {
            Some(revision) if current.is_some() && status.page_id == current => {
                let cleared = self.editor.mark_saved(revision);
                debug!(revision, cleared, "synced saved state");
                cleared
            }
            _ => false,
        }
    }

    // ========================================================================
    // Listings
    // ========================================================================

    pub async fn list_pages(&self, content_id: ContentId) -> SessionResult<Vec<MarkdownPage>> {
        Ok(self.gateway.list_pages(content_id).await?)
    }

    pub async fn list_media(&self, content_id: ContentId) -> SessionResult<Vec<MediaItem>> {
        Ok(self.gateway.list_media(content_id).await?)
    }
}

impl Drop for EditorSession {
    fn drop(&mut self) {
        self.autosave.shutdown();
    }
}
