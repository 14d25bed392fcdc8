//! Integration tests for login sessions
//!
//! These tests run the full service against the in-memory store and verify:
//! - Login materializes the remote library and syncs local edits
//! - Logout tears the session down and clears the library
//! - Logging in again invalidates the previous session

use bridge_traits::{DocumentBody, DocumentId, InMemoryDocumentStore, ManualClock, Revision};
use core_library::{CollectionRef, NewMediaItem};
use core_runtime::config::{CoreConfig, SyncConfig};
use core_runtime::events::{CoreEvent, SessionEvent};
use core_service::{stores, CoreError, CoreService, LoginContext};
use core_sync::SyncError;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn doc_id() -> DocumentId {
    DocumentId::new("videos")
}

fn body(value: Value) -> DocumentBody {
    value.as_object().cloned().unwrap()
}

fn entry(title: &str) -> Value {
    json!({
        "title": title,
        "subtitle": "",
        "thumbnail": "",
        "duration": "",
        "timestamp": "5"
    })
}

fn service() -> CoreService {
    let config = CoreConfig::builder()
        .clock(Arc::new(ManualClock::new(1_000)))
        .sync(SyncConfig::default().with_resubscribe_delay(Duration::from_millis(10)))
        .build()
        .unwrap();
    CoreService::new(config).unwrap()
}

fn store_with(value: Value) -> Arc<InMemoryDocumentStore> {
    Arc::new(InMemoryDocumentStore::new().with_document(doc_id(), body(value)))
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let mut config = CoreConfig::default();
    config.document_name = "_design".to_string();

    assert!(matches!(CoreService::new(config), Err(CoreError::Config(_))));
}

#[tokio::test]
async fn test_login_edit_logout() {
    let service = service();
    let mut events = service.subscribe_events();
    let store = store_with(json!({"Favorites": {"a": entry("A")}}));

    let session = service
        .login(LoginContext::new("alice", store.clone()))
        .await
        .unwrap();
    let status = session.wait_until_settled().await;
    assert!(status.first_load_done);
    assert!(session.library().lock().await.is_favorited("a"));

    session
        .library()
        .lock()
        .await
        .add_item(&CollectionRef::Favorites, NewMediaItem::new("b", "B"))
        .unwrap();
    let status = session.wait_until_settled().await;
    assert_eq!(status.revision, Some(Revision::new("2-mem")));

    let remote = store.document(&doc_id()).unwrap();
    let favorites = remote.body["Favorites"].as_object().unwrap();
    assert!(favorites.contains_key("a"));
    assert!(favorites.contains_key("b"));

    assert!(service.logout().await);
    assert!(!session.is_active());
    assert!(service.library().lock().await.favorites().is_empty());
    assert!(!service.library().lock().await.is_connected());
    assert!(matches!(service.session().await, Err(CoreError::NotSignedIn)));
    assert!(matches!(
        session.refresh(),
        Err(CoreError::Sync(SyncError::SessionExpired { .. }))
    ));

    let session_events: Vec<SessionEvent> = events
        .drain()
        .into_iter()
        .filter_map(|event| match event {
            CoreEvent::Session(event) => Some(event),
            _ => None,
        })
        .collect();
    assert_eq!(
        session_events,
        vec![
            SessionEvent::SignedIn {
                user_id: "alice".into(),
                epoch: session.epoch(),
            },
            SessionEvent::SignedOut {
                user_id: "alice".into(),
                epoch: session.epoch(),
            },
        ]
    );
}

#[tokio::test]
async fn test_edits_after_logout_are_not_written() {
    let service = service();
    let store = store_with(json!({}));
    let session = service
        .login(LoginContext::new("alice", store.clone()))
        .await
        .unwrap();
    session.wait_until_settled().await;
    service.logout().await;

    service
        .library()
        .lock()
        .await
        .add_item(&CollectionRef::Favorites, NewMediaItem::new("late", "Late"))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(store.write_attempts(), 0);
}

#[tokio::test]
async fn test_second_login_replaces_the_first() {
    let service = service();
    let alice = store_with(json!({"Favorites": {"a": entry("A")}}));
    let bob = store_with(json!({"Road trip": {"r": entry("R")}}));

    let first = service
        .login(LoginContext::new("alice", alice))
        .await
        .unwrap();
    first.wait_until_settled().await;

    let second = service.login(LoginContext::new("bob", bob)).await.unwrap();
    second.wait_until_settled().await;

    assert!(!first.is_active());
    assert!(second.is_active());
    assert!(second.epoch() > first.epoch());
    assert_eq!(service.session().await.unwrap().user_id(), "bob");

    let library = service.library();
    let library = library.lock().await;
    assert!(!library.is_favorited("a"));
    assert_eq!(library.playlist_names(), vec!["Road trip"]);
}

#[tokio::test]
async fn test_remote_change_reaches_the_session() {
    let service = service();
    let store = store_with(json!({}));
    let session = service
        .login(LoginContext::new("alice", store.clone()))
        .await
        .unwrap();
    session.wait_until_settled().await;
    for _ in 0..400 {
        if store.subscribe_count() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let revision = store.put_remote(&doc_id(), body(json!({"Favorites": {}})));

    for _ in 0..400 {
        if session.status().revision.as_ref() == Some(&revision) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(session.status().revision, Some(revision));

    service.logout().await;
}

#[tokio::test]
async fn test_missing_document_keeps_the_session_alive() {
    let service = service();
    let session = service
        .login(LoginContext::new("carol", stores::in_memory_store()))
        .await
        .unwrap();

    let status = session.wait_until_settled().await;

    assert!(!status.first_load_done);
    assert_eq!(status.last_error.as_deref(), Some("Document store error: Document not found"));
    assert!(session.is_active());
    assert!(session.refresh().is_ok());
    service.logout().await;
}

#[tokio::test]
async fn test_playlist_edit_after_login_is_written_once() {
    let service = service();
    let store = store_with(json!({
        "Favorites": {"v1": entry("V1")},
        "Road Trip": {"v2": entry("V2")}
    }));
    let session = service
        .login(LoginContext::new("alice", store.clone()))
        .await
        .unwrap();
    session.wait_until_settled().await;

    session
        .library()
        .lock()
        .await
        .add_item(&CollectionRef::playlist("Road Trip"), NewMediaItem::new("v3", "V3"))
        .unwrap();
    session.wait_until_settled().await;

    let writes = store.accepted_writes();
    assert_eq!(writes.len(), 1);
    let written = Value::Object(writes[0].body.clone());
    assert!(written["Favorites"].get("v1").is_some());
    assert!(written["Road Trip"].get("v2").is_some());
    assert!(written["Road Trip"].get("v3").is_some());
    assert_eq!(written["Road Trip"].as_object().unwrap().len(), 2);

    service.logout().await;
}
