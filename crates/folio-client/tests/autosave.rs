//! Autosave timing, coalescing, failure, and stale-result behavior.
//!
//! All tests run on a paused clock so debounce windows are exact.

use std::sync::Arc;
use std::time::Duration;

use folio_client::{
    AutosaveConfig, AutosaveHandle, GatewayError, MemoryGateway, SaveError, SaveTarget,
    spawn_autosave,
};
use folio_types::{ContentId, Frontmatter, MarkdownPage, PageId, Slug};
use tokio::time::{Instant, sleep, sleep_until};

fn stored_page(gateway: &MemoryGateway, title: &str) -> MarkdownPage {
    let page = MarkdownPage::new(
        ContentId::new(),
        Slug::slugify(title),
        Frontmatter::titled(title),
    );
    gateway.insert_page(page.clone());
    page
}

fn setup(debounce_ms: u64) -> (Arc<MemoryGateway>, AutosaveHandle, PageId) {
    let gateway = Arc::new(MemoryGateway::new());
    let page = stored_page(&gateway, "Draft");
    let autosave = spawn_autosave(gateway.clone(), &AutosaveConfig { debounce_ms });
    autosave.set_target(Some(SaveTarget::for_page(&page, Arc::from(""))));
    (gateway, autosave, page.id)
}

#[tokio::test(start_paused = true)]
async fn test_edits_within_debounce_coalesce_into_one_write() {
    let (gateway, autosave, page) = setup(2000);
    let start = Instant::now();
    for (i, text) in ["a", "ab", "abc", "abcd"].into_iter().enumerate() {
        if i > 0 {
            sleep(Duration::from_millis(500)).await;
        }
        autosave.update_markdown(Arc::from(text), i as u64 + 1);
    }

    sleep_until(start + Duration::from_millis(3400)).await;
    assert_eq!(gateway.update_count(), 0);
    assert!(autosave.status().has_unsaved_changes);

    autosave
        .subscribe()
        .wait_for(|s| s.saved_revision == Some(4) && !s.is_saving)
        .await
        .unwrap();
    assert!(Instant::now() >= start + Duration::from_millis(3500));
    assert_eq!(gateway.update_count(), 1);
    assert_eq!(gateway.page(page).unwrap().body, "abcd");

    let status = autosave.status();
    assert!(!status.has_unsaved_changes);
    assert!(status.last_saved_at.is_some());
    assert!(status.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_reverting_to_saved_text_cancels_the_write() {
    let (gateway, autosave, _) = setup(2000);
    autosave.update_markdown(Arc::from("typo"), 1);
    sleep(Duration::from_millis(100)).await;
    assert!(autosave.status().has_unsaved_changes);

    autosave.update_markdown(Arc::from(""), 2);
    sleep(Duration::from_secs(10)).await;
    assert!(!autosave.status().has_unsaved_changes);
    assert_eq!(gateway.update_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_save_now_skips_the_debounce() {
    let (gateway, autosave, page) = setup(60_000);
    let start = Instant::now();
    autosave.update_markdown(Arc::from("# Now"), 1);

    let saved = autosave.save_now().await.unwrap();
    assert_eq!(saved.body, "# Now");
    assert!(saved.frontmatter.updated.is_some());
    assert!(Instant::now() - start < Duration::from_secs(1));

    // The cancelled timer never fires a second write.
    sleep(Duration::from_secs(120)).await;
    assert_eq!(gateway.update_count(), 1);
    assert_eq!(gateway.page(page).unwrap().version, 1);
    assert_eq!(autosave.status().saved_revision, Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_failed_write_reports_error_without_retry() {
    let (gateway, autosave, _) = setup(2000);
    gateway.fail_next_write(GatewayError::Unavailable("network down".into()));
    autosave.update_markdown(Arc::from("draft"), 1);

    let err = autosave.save_now().await.unwrap_err();
    assert!(matches!(err, SaveError::Gateway(GatewayError::Unavailable(_))));

    let status = autosave.status();
    assert!(status.error.is_some());
    assert!(status.has_unsaved_changes);
    assert!(!status.is_saving);
    assert_eq!(status.saved_revision, None);

    sleep(Duration::from_secs(30)).await;
    assert_eq!(gateway.update_count(), 1);

    // The next explicit save succeeds and clears the error.
    autosave.save_now().await.unwrap();
    let status = autosave.status();
    assert!(status.error.is_none());
    assert!(!status.has_unsaved_changes);
    assert_eq!(status.saved_revision, Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_requests_during_a_write_coalesce_into_one_queued_write() {
    let (gateway, autosave, page) = setup(2000);
    gateway.set_latency(Duration::from_secs(1));

    autosave.update_markdown(Arc::from("one"), 1);
    let first = tokio::spawn({
        let autosave = autosave.clone();
        async move { autosave.save_now().await }
    });
    sleep(Duration::from_millis(10)).await;
    assert!(autosave.status().is_saving);

    autosave.update_markdown(Arc::from("two"), 2);
    autosave.update_markdown(Arc::from("three"), 3);
    let second = tokio::spawn({
        let autosave = autosave.clone();
        async move { autosave.save_now().await }
    });
    let third = tokio::spawn({
        let autosave = autosave.clone();
        async move { autosave.save_now().await }
    });

    assert_eq!(first.await.unwrap().unwrap().body, "one");
    assert_eq!(second.await.unwrap().unwrap().body, "three");
    assert_eq!(third.await.unwrap().unwrap().body, "three");
    assert_eq!(gateway.update_count(), 2);
    assert_eq!(gateway.page(page).unwrap().body, "three");

    sleep(Duration::from_secs(10)).await;
    assert_eq!(gateway.update_count(), 2);
    let status = autosave.status();
    assert_eq!(status.saved_revision, Some(3));
    assert!(!status.has_unsaved_changes);
    assert!(!status.is_saving);
}

#[tokio::test(start_paused = true)]
async fn test_switching_target_discards_stale_results() {
    let (gateway, autosave, _) = setup(2000);
    gateway.set_latency(Duration::from_secs(1));
    autosave.update_markdown(Arc::from("old page text"), 7);
    let pending = tokio::spawn({
        let autosave = autosave.clone();
        async move { autosave.save_now().await }
    });
    sleep(Duration::from_millis(10)).await;

    let other = stored_page(&gateway, "Other");
    autosave.set_target(Some(SaveTarget::for_page(&other, Arc::from("other"))));
    assert_eq!(pending.await.unwrap(), Err(SaveError::Cancelled));

    sleep(Duration::from_secs(2)).await;
    let status = autosave.status();
    assert_eq!(status.page_id, Some(other.id));
    assert_eq!(status.last_saved_at, None);
    assert_eq!(status.saved_revision, None);
    assert!(!status.is_saving);
    assert!(!status.has_unsaved_changes);
}

#[tokio::test(start_paused = true)]
async fn test_retargeting_the_same_page_waits_for_the_running_write() {
    let (gateway, autosave, page) = setup(2000);
    gateway.set_latency(Duration::from_secs(5));
    autosave.update_markdown(Arc::from("old"), 1);
    sleep(Duration::from_millis(2500)).await;
    assert_eq!(gateway.update_count(), 1);
    assert!(autosave.status().is_saving);

    gateway.set_latency(Duration::ZERO);
    let stored = gateway.page(page).unwrap();
    autosave.set_target(Some(SaveTarget::for_page(&stored, Arc::from(""))));
    autosave.update_markdown(Arc::from("new"), 1);
    let pending = tokio::spawn({
        let autosave = autosave.clone();
        async move { autosave.save_now().await }
    });

    // Nothing new reaches the gateway until the running write settles.
    sleep(Duration::from_secs(1)).await;
    assert_eq!(gateway.update_count(), 1);

    assert_eq!(pending.await.unwrap().unwrap().body, "new");
    sleep(Duration::from_secs(10)).await;
    assert_eq!(gateway.update_count(), 2);
    assert_eq!(gateway.page(page).unwrap().body, "new");
    let status = autosave.status();
    assert_eq!(status.saved_revision, Some(1));
    assert!(!status.has_unsaved_changes);
    assert!(!status.is_saving);
}

#[tokio::test(start_paused = true)]
async fn test_stale_write_landing_on_the_current_page_is_rewritten() {
    let (gateway, autosave, page) = setup(2000);
    gateway.set_latency(Duration::from_secs(5));
    autosave.update_markdown(Arc::from("old"), 1);
    sleep(Duration::from_millis(2500)).await;

    gateway.set_latency(Duration::ZERO);
    let stored = gateway.page(page).unwrap();
    autosave.set_target(Some(SaveTarget::for_page(&stored, Arc::from(""))));
    sleep(Duration::from_secs(5)).await;

    // "old" landed after the retarget; the editor still shows "".
    assert_eq!(gateway.page(page).unwrap().body, "old");
    let status = autosave.status();
    assert!(status.has_unsaved_changes);
    assert_eq!(status.last_saved_at, None);

    autosave
        .subscribe()
        .wait_for(|s| !s.has_unsaved_changes && s.last_saved_at.is_some())
        .await
        .unwrap();
    assert_eq!(gateway.page(page).unwrap().body, "");
    assert_eq!(gateway.update_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_autosave_ignores_edits() {
    let gateway = Arc::new(MemoryGateway::new());
    let autosave = spawn_autosave(gateway.clone(), &AutosaveConfig::default());
    autosave.update_markdown(Arc::from("nobody home"), 1);
    assert_eq!(autosave.save_now().await, Err(SaveError::Disabled));

    sleep(Duration::from_secs(10)).await;
    assert_eq!(gateway.update_count(), 0);
    assert_eq!(autosave.status(), Default::default());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_fails_later_saves() {
    let (_gateway, autosave, _) = setup(2000);
    autosave.shutdown();
    assert_eq!(autosave.save_now().await, Err(SaveError::Shutdown));
}
