//! Page flows through `EditorSession`.

use std::sync::Arc;
use std::time::Duration;

use folio_client::{
    AutosaveConfig, EditorSession, GatewayError, MemoryGateway, SaveError, SessionError,
};
use folio_editor::EditorError;
use folio_types::{
    BlockAttrs, BlockKind, ContentId, Frontmatter, MarkdownPage, MediaId, MediaItem, Slug,
    now_millis,
};
use tokio::time::sleep;

fn session(gateway: &Arc<MemoryGateway>) -> EditorSession {
    EditorSession::new(gateway.clone(), &AutosaveConfig::default())
}

fn stored_page(
    gateway: &MemoryGateway,
    content_id: ContentId,
    title: &str,
    body: &str,
) -> MarkdownPage {
    let mut page = MarkdownPage::new(
        content_id,
        Slug::slugify(title),
        Frontmatter::titled(title),
    );
    page.body = body.to_string();
    gateway.insert_page(page.clone());
    page
}

#[tokio::test(start_paused = true)]
async fn test_open_page_decodes_body() {
    let gateway = Arc::new(MemoryGateway::new());
    let page = stored_page(&gateway, ContentId::new(), "Hello", "# Title\n\nBody text.");
    let mut session = session(&gateway);

    session.open_page(page.id).await.unwrap();
    let doc = session.editor().document();
    assert_eq!(doc.len(), 2);
    assert_eq!(doc.blocks()[0].attrs, BlockAttrs::Heading { level: 1 });
    assert_eq!(doc.blocks()[1].content, "Body text.");
    assert!(!session.editor().has_changes());

    tokio::task::yield_now().await;
    let status = session.autosave_status();
    assert_eq!(status.page_id, Some(page.id));
    assert!(!status.has_unsaved_changes);
}

#[tokio::test(start_paused = true)]
async fn test_open_missing_page_is_a_gateway_error() {
    let gateway = Arc::new(MemoryGateway::new());
    let mut session = session(&gateway);
    let err = session.open_page(folio_types::PageId::new()).await.unwrap_err();
    assert!(matches!(err, SessionError::Gateway(GatewayError::NotFound(_))));
    assert!(!session.editor().is_editing());
}

#[tokio::test(start_paused = true)]
async fn test_create_page_picks_a_unique_slug() {
    let gateway = Arc::new(MemoryGateway::new());
    let content = ContentId::new();
    stored_page(&gateway, content, "Notes", "");
    let mut session = session(&gateway);

    let before = now_millis();
    let id = session.create_page(content, "Notes").await.unwrap();
    let after = now_millis();
    assert_eq!(session.current_page_id(), Some(id));
    let stored = gateway.page(id).unwrap();
    assert_eq!(stored.slug.as_str(), "notes-2");
    assert!((before..=after).contains(&stored.created_at));
    assert_eq!(stored.updated_at, stored.created_at);
    assert_eq!(stored.frontmatter.updated, Some(stored.created_at));
    assert_eq!(session.editor().document().len(), 1);
    assert_eq!(session.list_pages(content).await.unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_edits_are_autosaved_and_synced() {
    let gateway = Arc::new(MemoryGateway::new());
    let mut session = session(&gateway);
    let id = session.create_page(ContentId::new(), "Journal").await.unwrap();

    let heading = session
        .edit(|e| e.insert_block(None, BlockKind::Heading))
        .unwrap();
    session.edit(|e| e.update_content(heading, "Day one")).unwrap();
    assert!(session.editor().has_changes());

    let revision = session.editor().version();
    session
        .autosave()
        .subscribe()
        .wait_for(|s| s.saved_revision == Some(revision))
        .await
        .unwrap();

    assert!(session.sync_saved_state());
    assert!(!session.editor().has_changes());
    let stored = gateway.page(id).unwrap();
    assert_eq!(stored.body, &*session.editor().markdown());
    assert!(stored.body.ends_with("# Day one"));
    assert!(stored.frontmatter.updated.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_failed_save_keeps_the_document() {
    let gateway = Arc::new(MemoryGateway::new());
    let mut session = session(&gateway);
    session.create_page(ContentId::new(), "Offline").await.unwrap();
    let para = session.editor().document().blocks()[0].id;
    session.edit(|e| e.update_content(para, "keep me")).unwrap();

    gateway.fail_next_write(GatewayError::Unavailable("timeout".into()));
    let err = session.save_now().await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Save(SaveError::Gateway(GatewayError::Unavailable(_)))
    ));

    assert!(session.editor().has_changes());
    assert_eq!(session.editor().document().blocks()[0].content, "keep me");
    let status = session.autosave_status();
    assert!(status.error.is_some());
    assert!(status.has_unsaved_changes);

    session.save_now().await.unwrap();
    assert!(!session.editor().has_changes());
}

#[tokio::test(start_paused = true)]
async fn test_delete_current_page_closes_editor() {
    let gateway = Arc::new(MemoryGateway::new());
    let mut session = session(&gateway);
    let id = session.create_page(ContentId::new(), "Doomed").await.unwrap();

    session.delete_page(id).await.unwrap();
    assert!(!session.editor().is_editing());
    assert!(gateway.page(id).is_none());

    tokio::task::yield_now().await;
    assert_eq!(session.autosave_status().page_id, None);
    assert!(matches!(
        session.save_now().await,
        Err(SessionError::Save(SaveError::Disabled))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_failed_delete_keeps_the_open_page() {
    let gateway = Arc::new(MemoryGateway::new());
    let mut session = session(&gateway);
    let id = session.create_page(ContentId::new(), "Keeper").await.unwrap();
    let para = session.editor().document().blocks()[0].id;
    session.edit(|e| e.update_content(para, "unsaved")).unwrap();

    gateway.fail_next_write(GatewayError::Unavailable("down".into()));
    let err = session.delete_page(id).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Gateway(GatewayError::Unavailable(_))
    ));

    assert!(gateway.page(id).is_some());
    assert!(session.editor().is_editing());
    assert_eq!(session.current_page_id(), Some(id));
    assert_eq!(session.editor().document().blocks()[0].content, "unsaved");
    assert!(session.editor().has_changes());
    tokio::task::yield_now().await;
    assert_eq!(session.autosave_status().page_id, Some(id));

    session.save_now().await.unwrap();
    assert_eq!(gateway.page(id).unwrap().body, "unsaved");
}

#[tokio::test(start_paused = true)]
async fn test_reopening_a_page_keeps_writes_in_order() {
    let gateway = Arc::new(MemoryGateway::new());
    let mut session = session(&gateway);
    let id = session.create_page(ContentId::new(), "Reopened").await.unwrap();
    gateway.set_latency(Duration::from_secs(5));

    let para = session.editor().document().blocks()[0].id;
    session.edit(|e| e.update_content(para, "old")).unwrap();
    sleep(Duration::from_millis(2500)).await;
    assert_eq!(gateway.update_count(), 1);

    // The slow write of "old" is still running when the page is reopened.
    gateway.set_latency(Duration::ZERO);
    session.open_page(id).await.unwrap();
    let para = session.editor().document().blocks()[0].id;
    session.edit(|e| e.update_content(para, "new")).unwrap();
    let saved = session.save_now().await.unwrap();
    assert_eq!(saved.body, "new");

    sleep(Duration::from_secs(10)).await;
    assert_eq!(gateway.update_count(), 2);
    assert_eq!(gateway.page(id).unwrap().body, "new");
    assert!(!session.autosave_status().has_unsaved_changes);
}

#[tokio::test(start_paused = true)]
async fn test_edit_without_page_is_rejected() {
    let gateway = Arc::new(MemoryGateway::new());
    let mut session = session(&gateway);
    let err = session
        .edit(|e| e.insert_block(None, BlockKind::Paragraph))
        .unwrap_err();
    assert!(matches!(err, SessionError::Editor(EditorError::NotEditing)));
}

#[tokio::test(start_paused = true)]
async fn test_rejected_edit_does_not_reach_autosave() {
    let gateway = Arc::new(MemoryGateway::new());
    let mut session = session(&gateway);
    session.create_page(ContentId::new(), "Images").await.unwrap();
    let image = session
        .edit(|e| e.insert_block(None, BlockKind::Image))
        .unwrap();
    let version = session.editor().version();

    let err = session.edit(|e| e.update_content(image, "caption?")).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Editor(EditorError::NoTextContent { .. })
    ));
    assert_eq!(session.editor().version(), version);
}

#[tokio::test(start_paused = true)]
async fn test_list_media() {
    let gateway = Arc::new(MemoryGateway::new());
    let content = ContentId::new();
    gateway.add_media(
        content,
        MediaItem {
            id: MediaId::new(),
            filename: "cover.jpg".into(),
            mime_type: "image/jpeg".into(),
            size: 1024,
            alt: Some("Cover".into()),
        },
    );
    let session = session(&gateway);
    let media = session.list_media(content).await.unwrap();
    assert_eq!(media.len(), 1);
    assert_eq!(media[0].filename, "cover.jpg");
}
