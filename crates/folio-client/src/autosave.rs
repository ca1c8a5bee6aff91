//! Autosave worker.
//!
//! Reconciles editor Markdown with the persistence gateway. The worker is a
//! single tokio task that owns all autosave state; callers talk to it through
//! a cloneable [`AutosaveHandle`].
//!
//! ```text
//!   AutosaveHandle (Clone)      mpsc        AutosaveWorker (tokio task)
//!   ┌─────────────────────┐   ───────►   ┌──────────────────────────────┐
//!   │ .set_target()       │  Command    │ debounce deadline            │
//!   │ .update_markdown()  │             │ one write in flight          │
//!   │ .save_now().await   │   oneshot   │ one coalesced queued write   │
//!   │ .status()           │   ◄───────  │ epoch per save target        │
//!   └─────────────────────┘   watch     └──────────────────────────────┘
//! ```
//!
//! Each [`SaveTarget`] starts a new epoch. Writes carry the epoch they were
//! issued under and their results are dropped if the epoch has moved on, so
//! switching pages can never stamp the old page's save onto the new one.
//! Writes never overlap, even across epochs: a write requested while an
//! earlier target's write is still running waits for it to settle, so two
//! writes to the same page always land in the order they were issued.

use std::sync::Arc;
use std::time::Duration;

use folio_types::{ContentId, Frontmatter, MarkdownPage, PageId, Slug, now_millis};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, trace, warn};

use crate::config::AutosaveConfig;
use crate::gateway::{GatewayError, PersistenceGateway, UpdatePageRequest};

// ============================================================================
// Public types
// ============================================================================

/// Errors reported to `save_now` callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SaveError {
    #[error("save failed: {0}")]
    Gateway(#[from] GatewayError),
    #[error("autosave has no target")]
    Disabled,
    #[error("save cancelled: the page was switched or closed")]
    Cancelled,
    #[error("autosave worker shut down")]
    Shutdown,
}

/// Page identity autosave writes to.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveTarget {
    pub content_id: ContentId,
    pub page_id: PageId,
    pub slug: Slug,
    pub frontmatter: Frontmatter,
    /// Markdown already persisted for this page. Edits equal to it are not
    /// unsaved changes.
    pub baseline: Arc<str>,
}

impl SaveTarget {
    /// Target for `page`, whose persisted body re-encodes to `baseline`.
    pub fn for_page(page: &MarkdownPage, baseline: Arc<str>) -> Self {
        Self {
            content_id: page.content_id,
            page_id: page.id,
            slug: page.slug.clone(),
            frontmatter: page.frontmatter.clone(),
            baseline,
        }
    }
}

/// Observable autosave state. Only the worker writes it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutosaveStatus {
    pub is_saving: bool,
    /// Unix millis of the last committed write.
    pub last_saved_at: Option<u64>,
    /// Message of the last failed write, cleared by the next success.
    pub error: Option<String>,
    pub has_unsaved_changes: bool,
    /// Page this status describes. `None` while disabled.
    pub page_id: Option<PageId>,
    /// Editor revision of the last committed write.
    pub saved_revision: Option<u64>,
}

type SaveReply = oneshot::Sender<Result<MarkdownPage, SaveError>>;

enum Command {
    SetTarget(Option<SaveTarget>),
    Update { text: Arc<str>, revision: u64 },
    SaveNow { reply: SaveReply },
    Shutdown,
}

// ============================================================================
// Handle
// ============================================================================

/// Cloneable, `Send + Sync` handle to the autosave worker.
#[derive(Clone)]
pub struct AutosaveHandle {
    tx: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<AutosaveStatus>,
}

impl AutosaveHandle {
    /// Enable autosave for `target`, or disable it with `None`.
    ///
    /// Cancels any pending debounce, fails waiting `save_now` calls with
    /// [`SaveError::Cancelled`], and resets the status.
    pub fn set_target(&self, target: Option<SaveTarget>) {
        self.send(Command::SetTarget(target));
    }

    /// Report the editor's current Markdown. Restarts the debounce.
    pub fn update_markdown(&self, text: Arc<str>, revision: u64) {
        self.send(Command::Update { text, revision });
    }

    /// Write the latest Markdown now and wait for the outcome.
    pub async fn save_now(&self) -> Result<MarkdownPage, SaveError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::SaveNow { reply })
            .map_err(|_| SaveError::Shutdown)?;
        rx.await.map_err(|_| SaveError::Shutdown)?
    }

    pub fn status(&self) -> AutosaveStatus {
        self.status.borrow().clone()
    }

    /// Receiver that observes every status change.
    pub fn subscribe(&self) -> watch::Receiver<AutosaveStatus> {
        self.status.clone()
    }

    /// Stop the worker. Pending `save_now` calls fail with
    /// [`SaveError::Shutdown`]; an in-flight write still reaches the gateway.
    pub fn shutdown(&self) {
        self.send(Command::Shutdown);
    }

    fn send(&self, cmd: Command) {
        if self.tx.send(cmd).is_err() {
            debug!("autosave worker is gone; command dropped");
        }
    }
}

/// Spawn the autosave worker on the current tokio runtime.
pub fn spawn_autosave(
    gateway: Arc<dyn PersistenceGateway>,
    config: &AutosaveConfig,
) -> AutosaveHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = watch::channel(AutosaveStatus::default());
    let worker = AutosaveWorker::new(gateway, config.debounce(), status_tx);
    tokio::spawn(worker.run(rx));
    AutosaveHandle {
        tx,
        status: status_rx,
    }
}

// ============================================================================
// Worker
// ============================================================================

/// Completion message from a spawned write.
struct WriteDone {
    epoch: u64,
    text: Arc<str>,
    revision: Option<u64>,
    result: Result<MarkdownPage, GatewayError>,
}

struct AutosaveWorker {
    gateway: Arc<dyn PersistenceGateway>,
    debounce: Duration,
    status: watch::Sender<AutosaveStatus>,
    done_tx: mpsc::UnboundedSender<WriteDone>,
    done_rx: mpsc::UnboundedReceiver<WriteDone>,

    /// Bumped on every target change.
    epoch: u64,
    target: Option<SaveTarget>,
    /// Newest Markdown reported by the editor.
    latest: Arc<str>,
    latest_revision: Option<u64>,
    /// Markdown of the last committed write (or the baseline).
    saved: Arc<str>,
    deadline: Option<Instant>,

    /// Epoch of the write currently running, possibly an earlier one.
    in_flight: Option<u64>,
    /// Waiters resolved by the write currently in flight.
    in_flight_waiters: Vec<SaveReply>,
    /// A write is owed once the in-flight one settles.
    queued: bool,
    queued_waiters: Vec<SaveReply>,
}

impl AutosaveWorker {
    fn new(
        gateway: Arc<dyn PersistenceGateway>,
        debounce: Duration,
        status: watch::Sender<AutosaveStatus>,
    ) -> Self {
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        Self {
            gateway,
            debounce,
            status,
            done_tx,
            done_rx,
            epoch: 0,
            target: None,
            latest: Arc::from(""),
            latest_revision: None,
            saved: Arc::from(""),
            deadline: None,
            in_flight: None,
            in_flight_waiters: Vec::new(),
            queued: false,
            queued_waiters: Vec::new(),
        }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        loop {
            let deadline = self.deadline;
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(Command::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd),
                },
                Some(done) = self.done_rx.recv() => self.finish_write(done),
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.deadline = None;
                    trace!(epoch = self.epoch, "autosave debounce elapsed");
                    self.request_write(None);
                }
            }
        }
        self.fail_waiters(SaveError::Shutdown);
        debug!("autosave worker shutting down");
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::SetTarget(target) => self.set_target(target),
            Command::Update { text, revision } => self.update(text, revision),
            Command::SaveNow { reply } => {
                if self.target.is_none() {
                    let _ = reply.send(Err(SaveError::Disabled));
                    return;
                }
                self.deadline = None;
                self.request_write(Some(reply));
            }
            Command::Shutdown => {}
        }
    }

    fn set_target(&mut self, target: Option<SaveTarget>) {
        // A running write is left to settle; only its result goes stale.
        self.epoch += 1;
        self.deadline = None;
        self.queued = false;
        self.fail_waiters(SaveError::Cancelled);

        let baseline = target
            .as_ref()
            .map(|t| Arc::clone(&t.baseline))
            .unwrap_or_else(|| Arc::from(""));
        self.latest = Arc::clone(&baseline);
        self.latest_revision = None;
        self.saved = baseline;

        let page_id = target.as_ref().map(|t| t.page_id);
        match page_id {
            Some(page) => debug!(%page, epoch = self.epoch, "autosave target set"),
            None => debug!(epoch = self.epoch, "autosave disabled"),
        }
        self.target = target;
        self.status.send_replace(AutosaveStatus {
            page_id,
            ..AutosaveStatus::default()
        });
    }

    fn update(&mut self, text: Arc<str>, revision: u64) {
        if self.target.is_none() {
            trace!(revision, "no autosave target; markdown ignored");
            return;
        }
        self.latest = text;
        self.latest_revision = Some(revision);

        // With a write in flight the saved text is about to change, so a
        // revert still has to be written.
        let writing = self.in_flight == Some(self.epoch);
        if !writing && !self.queued && self.latest == self.saved {
            self.deadline = None;
            self.status.send_modify(|s| s.has_unsaved_changes = false);
            return;
        }
        self.deadline = Some(Instant::now() + self.debounce);
        trace!(
            revision,
            debounce_ms = self.debounce.as_millis() as u64,
            "autosave debounce restarted"
        );
        self.status.send_if_modified(|s| {
            let changed = !s.has_unsaved_changes;
            s.has_unsaved_changes = true;
            changed
        });
    }

    /// Write now, or once the in-flight write settles.
    fn request_write(&mut self, waiter: Option<SaveReply>) {
        if let Some(running) = self.in_flight {
            self.queued = true;
            self.queued_waiters.extend(waiter);
            trace!(epoch = self.epoch, running, "write in flight; request queued");
            return;
        }
        self.start_write(waiter.into_iter().collect());
    }

    fn start_write(&mut self, waiters: Vec<SaveReply>) {
        let Some(target) = &self.target else {
            for waiter in waiters {
                let _ = waiter.send(Err(SaveError::Disabled));
            }
            return;
        };

        let now = now_millis();
        let mut frontmatter = target.frontmatter.clone();
        frontmatter.updated = Some(now);
        let request = UpdatePageRequest {
            id: target.page_id,
            content_id: target.content_id,
            slug: target.slug.clone(),
            frontmatter,
            body: Some(self.latest.to_string()),
            updated_at: now,
        };

        self.in_flight = Some(self.epoch);
        self.in_flight_waiters = waiters;
        self.status.send_modify(|s| s.is_saving = true);
        debug!(
            page = %target.page_id,
            epoch = self.epoch,
            revision = ?self.latest_revision,
            "autosave write started"
        );

        let gateway = Arc::clone(&self.gateway);
        let done_tx = self.done_tx.clone();
        let epoch = self.epoch;
        let text = Arc::clone(&self.latest);
        let revision = self.latest_revision;
        tokio::spawn(async move {
            let result = gateway.update_page(request).await;
            let _ = done_tx.send(WriteDone {
                epoch,
                text,
                revision,
                result,
            });
        });
    }

    fn finish_write(&mut self, done: WriteDone) {
        self.in_flight = None;
        if done.epoch == self.epoch {
            self.commit(done);
        } else {
            self.settle_stale(done);
        }

        if self.queued {
            self.queued = false;
            let waiters = std::mem::take(&mut self.queued_waiters);
            self.start_write(waiters);
        } else {
            self.status.send_if_modified(|s| std::mem::replace(&mut s.is_saving, false));
        }
    }

    /// Apply the result of a write issued under the current epoch.
    fn commit(&mut self, done: WriteDone) {
        let waiters = std::mem::take(&mut self.in_flight_waiters);
        match done.result {
            Ok(page) => {
                info!(
                    page = %page.id,
                    version = page.version,
                    revision = ?done.revision,
                    "page saved"
                );
                if let Some(target) = &mut self.target {
                    target.slug = page.slug.clone();
                    target.frontmatter = page.frontmatter.clone();
                }
                self.saved = Arc::clone(&done.text);
                let unsaved = self.latest != done.text;
                self.status.send_modify(|s| {
                    s.last_saved_at = Some(page.updated_at);
                    s.error = None;
                    s.has_unsaved_changes = unsaved;
                    if done.revision.is_some() {
                        s.saved_revision = done.revision;
                    }
                });
                for waiter in waiters {
                    let _ = waiter.send(Ok(page.clone()));
                }
            }
            Err(e) => {
                warn!(error = %e, revision = ?done.revision, "autosave write failed");
                self.status.send_modify(|s| {
                    s.error = Some(e.to_string());
                    s.has_unsaved_changes = true;
                });
                for waiter in waiters {
                    let _ = waiter.send(Err(SaveError::Gateway(e.clone())));
                }
            }
        }
    }

    /// A write from an earlier target settled. Its status is dropped, but
    /// when it landed on the current page its body is now the stored one.
    fn settle_stale(&mut self, done: WriteDone) {
        debug!(
            write_epoch = done.epoch,
            epoch = self.epoch,
            "discarding stale autosave result"
        );
        let landed_here = match (&self.target, &done.result) {
            (Some(target), Ok(page)) => target.page_id == page.id,
            _ => false,
        };
        if !landed_here || self.saved == done.text {
            return;
        }
        self.saved = done.text;
        if self.queued {
            // The queued write carries the latest text.
            return;
        }
        let unsaved = self.latest != self.saved;
        self.deadline = unsaved.then(|| Instant::now() + self.debounce);
        self.status.send_modify(|s| s.has_unsaved_changes = unsaved);
    }

    fn fail_waiters(&mut self, error: SaveError) {
        for waiter in self
            .in_flight_waiters
            .drain(..)
            .chain(self.queued_waiters.drain(..))
        {
            let _ = waiter.send(Err(error.clone()));
        }
    }
}
