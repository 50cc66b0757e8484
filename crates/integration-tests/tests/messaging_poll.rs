//! Integration tests for messaging calls and the polling session.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use renomarket_client::api::{ApiClient, MemoryTokenStore, TokenStore};
use renomarket_client::services::{MessagingError, MessagingService};
use renomarket_core::{ConversationId, UserId};
use renomarket_integration_tests::{INITIAL_ACCESS, INITIAL_REFRESH, MockBackend};
use tokio::sync::watch;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn messaging(backend: &MockBackend) -> MessagingService {
    let (api, _) = backend.logged_in_client();
    MessagingService::new(api)
}

/// Messaging service that polls every few milliseconds.
fn fast_messaging(backend: &MockBackend) -> MessagingService {
    let mut config = backend.config();
    config.polling.conversations = Duration::from_millis(40);
    config.polling.messages = Duration::from_millis(20);
    let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::with_tokens(
        INITIAL_ACCESS,
        Some(INITIAL_REFRESH),
    ));
    MessagingService::new(ApiClient::new(config, tokens).unwrap())
}

async fn wait_for_list<T: Clone>(
    rx: &mut watch::Receiver<Option<Vec<T>>>,
    predicate: impl FnMut(&Option<Vec<T>>) -> bool,
) -> Vec<T> {
    timeout(WAIT, rx.wait_for(predicate))
        .await
        .unwrap()
        .unwrap()
        .clone()
        .unwrap()
}

// =============================================================================
// Calls
// =============================================================================

#[tokio::test]
async fn test_conversations_and_unread_total() {
    let backend = MockBackend::start().await;
    backend.push_message("c1", "Le chantier démarre lundi");
    let messaging = messaging(&backend);

    let conversations = messaging.conversations().await.unwrap();

    assert_eq!(conversations.len(), 1);
    let c1 = &conversations[0];
    assert_eq!(c1.id.as_str(), "c1");
    assert_eq!(c1.unread_count, 2);
    assert_eq!(
        c1.other_participant(&UserId::new("u1")).unwrap().display_name(),
        "Atelier Bois"
    );
    assert_eq!(
        c1.last_message.as_ref().unwrap().content,
        "Le chantier démarre lundi"
    );
    assert_eq!(MessagingService::unread_total(&conversations), 2);
}

#[tokio::test]
async fn test_send_message_appends_to_conversation() {
    let backend = MockBackend::start().await;
    let messaging = messaging(&backend);
    let c1 = ConversationId::new("c1");

    let sent = messaging.send_message(&c1, "  Merci, à lundi  ").await.unwrap();
    assert_eq!(sent.content, "Merci, à lundi");
    assert_eq!(sent.sender.id().as_str(), "u1");

    let messages = messaging.messages(&c1).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages.last().unwrap().id, sent.id);
}

#[tokio::test]
async fn test_blank_message_is_not_sent() {
    let backend = MockBackend::start().await;
    let messaging = messaging(&backend);

    let err = messaging
        .send_message(&ConversationId::new("c1"), " \n ")
        .await
        .unwrap_err();

    assert!(matches!(err, MessagingError::EmptyMessage));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_start_conversation_creates_thread() {
    let backend = MockBackend::start().await;
    let messaging = messaging(&backend);

    let conversation = messaging
        .start_conversation(&UserId::new("pro7"), "Bonjour, êtes-vous disponible en mai ?")
        .await
        .unwrap();

    assert!(conversation.id.as_str().starts_with("c-new-"));
    assert!(conversation.participants.iter().any(|p| p.id.as_str() == "pro7"));
    assert_eq!(messaging.conversations().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_mark_read_clears_unread_count() {
    let backend = MockBackend::start().await;
    let messaging = messaging(&backend);
    let c1 = ConversationId::new("c1");

    messaging.mark_read(&c1).await.unwrap();

    let conversations = messaging.conversations().await.unwrap();
    assert_eq!(MessagingService::unread_total(&conversations), 0);
    assert!(messaging.messages(&c1).await.unwrap().iter().all(|m| m.read));
}

#[tokio::test]
async fn test_unknown_conversation_is_an_api_error() {
    let backend = MockBackend::start().await;
    let messaging = messaging(&backend);

    let err = messaging
        .messages(&ConversationId::new("nope"))
        .await
        .unwrap_err();

    assert!(matches!(err, MessagingError::Api(ref e) if e.status() == Some(404)));
}

// =============================================================================
// Polling Session
// =============================================================================

#[tokio::test]
async fn test_session_polls_conversation_list() {
    let backend = MockBackend::start().await;
    let session = fast_messaging(&backend).start_session();
    let mut conversations = session.conversations();

    let first = wait_for_list(&mut conversations, Option::is_some).await;
    assert_eq!(MessagingService::unread_total(&first), 1);

    backend.push_message("c1", "Nouvelle photo du chantier");
    let updated = wait_for_list(&mut conversations, |list| {
        list.as_deref()
            .is_some_and(|list| MessagingService::unread_total(list) == 2)
    })
    .await;
    assert_eq!(
        updated[0].last_message.as_ref().unwrap().content,
        "Nouvelle photo du chantier"
    );

    session.shutdown().await;
}

#[tokio::test]
async fn test_selected_conversation_picks_up_new_messages() {
    let backend = MockBackend::start().await;
    let mut session = fast_messaging(&backend).start_session();

    let mut messages = session.select(ConversationId::new("c1"));
    assert_eq!(session.selected().unwrap().as_str(), "c1");

    let initial = wait_for_list(&mut messages, Option::is_some).await;
    assert_eq!(initial.len(), 1);

    backend.push_message("c1", "Le devis est validé");
    let updated = wait_for_list(&mut messages, |list| {
        list.as_ref().is_some_and(|list| list.len() == 2)
    })
    .await;
    assert_eq!(updated[1].content, "Le devis est validé");

    session.shutdown().await;
}

#[tokio::test]
async fn test_switching_conversation_stops_previous_feed() {
    let backend = MockBackend::start().await;
    backend.push_message("c2", "Autre fil");
    let mut session = fast_messaging(&backend).start_session();

    let mut first = session.select(ConversationId::new("c1"));
    wait_for_list(&mut first, Option::is_some).await;

    let mut second = session.select(ConversationId::new("c2"));
    assert_eq!(session.selected().unwrap().as_str(), "c2");
    let c2 = wait_for_list(&mut second, Option::is_some).await;
    assert_eq!(c2[0].content, "Autre fil");

    // The old feed is closed once its poller has stopped.
    backend.push_message("c1", "Jamais vu");
    let closed = timeout(WAIT, first.changed()).await.unwrap();
    assert!(closed.is_err());
    assert_eq!(first.borrow().as_ref().unwrap().len(), 1);

    session.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_all_polling() {
    let backend = MockBackend::start().await;
    let mut session = fast_messaging(&backend).start_session();
    let mut messages = session.select(ConversationId::new("c1"));
    wait_for_list(&mut messages, Option::is_some).await;

    session.shutdown().await;
    let calls_after_shutdown = backend.calls().len();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(backend.calls().len(), calls_after_shutdown);
}

#[tokio::test]
async fn test_dropping_session_stops_polling() {
    let backend = MockBackend::start().await;
    let session = fast_messaging(&backend).start_session();
    let mut conversations = session.conversations();
    wait_for_list(&mut conversations, Option::is_some).await;

    drop(session);
    // Let any fetch already on the wire land.
    tokio::time::sleep(Duration::from_millis(60)).await;
    let settled = backend.calls().len();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(backend.calls().len(), settled);
}
