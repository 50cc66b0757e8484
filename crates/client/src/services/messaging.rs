//! Private messaging and its polling loops.
//!
//! There is no push channel: a [`MessagingSession`] refetches the
//! conversation list on one period and the open conversation on a shorter
//! one. Every loop is bound to a [`CancellationToken`]; a cancelled loop
//! abandons its in-flight fetch and never publishes again.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use renomarket_core::{ConversationId, UserId};

use crate::api::{ApiClient, ApiError, ApiResponse, endpoints};
use crate::config::PollingConfig;
use crate::models::{Conversation, Message};

/// Errors from messaging calls.
#[derive(Debug, Error)]
pub enum MessagingError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Message content is empty")]
    EmptyMessage,

    /// Backend answered `success: false`.
    #[error("{0}")]
    Rejected(String),
}

/// Messaging endpoints.
#[derive(Debug, Clone)]
pub struct MessagingService {
    api: ApiClient,
    polling: PollingConfig,
}

impl MessagingService {
    /// Create the service; poll periods come from the client configuration.
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        let polling = api.config().polling;
        Self { api, polling }
    }

    #[must_use]
    pub const fn polling(&self) -> PollingConfig {
        self.polling
    }

    /// List the user's conversations, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `MessagingError::Api` when the request fails.
    #[instrument(skip(self))]
    pub async fn conversations(&self) -> Result<Vec<Conversation>, MessagingError> {
        let response = self.api.get(endpoints::CONVERSATIONS).await?;
        payload(response)
    }

    /// Messages of one conversation, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `MessagingError::Api` when the request fails.
    #[instrument(skip(self), fields(conversation_id = %id))]
    pub async fn messages(&self, id: &ConversationId) -> Result<Vec<Message>, MessagingError> {
        let response = self.api.get(&endpoints::conversation_messages(id)).await?;
        payload(response)
    }

    /// Post a message to an existing conversation.
    ///
    /// # Errors
    ///
    /// Returns `MessagingError::EmptyMessage` for blank content without
    /// contacting the backend.
    #[instrument(skip(self, content), fields(conversation_id = %id))]
    pub async fn send_message(&self, id: &ConversationId, content: &str) -> Result<Message, MessagingError> {
        #[derive(Serialize)]
        struct NewMessage<'a> {
            content: &'a str,
        }

        let content = non_empty(content)?;
        let response = self
            .api
            .post(&endpoints::conversation_messages(id), &NewMessage { content })
            .await?;
        payload(response)
    }

    /// Open a conversation with another user, e.g. from a professional's
    /// profile page.
    ///
    /// # Errors
    ///
    /// As [`MessagingService::send_message`].
    #[instrument(skip(self, content), fields(recipient = %recipient))]
    pub async fn start_conversation(
        &self,
        recipient: &UserId,
        content: &str,
    ) -> Result<Conversation, MessagingError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct NewConversation<'a> {
            recipient_id: &'a str,
            content: &'a str,
        }

        let content = non_empty(content)?;
        let response = self
            .api
            .post(
                endpoints::CONVERSATIONS,
                &NewConversation {
                    recipient_id: recipient.as_str(),
                    content,
                },
            )
            .await?;
        payload(response)
    }

    /// Mark every message of a conversation as read.
    ///
    /// # Errors
    ///
    /// Returns `MessagingError::Api` when the request fails.
    #[instrument(skip(self), fields(conversation_id = %id))]
    pub async fn mark_read(&self, id: &ConversationId) -> Result<(), MessagingError> {
        let response: ApiResponse<serde_json::Value> = self
            .api
            .put(&endpoints::conversation_read(id), &serde_json::json!({}))
            .await?;
        if response.success {
            Ok(())
        } else {
            Err(rejected(response.message))
        }
    }

    /// Total unread messages across conversations.
    #[must_use]
    pub fn unread_total(conversations: &[Conversation]) -> u32 {
        conversations.iter().map(|c| c.unread_count).sum()
    }

    /// Start polling the conversation list.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn start_session(&self) -> MessagingSession {
        MessagingSession::start(self.clone())
    }
}

fn non_empty(content: &str) -> Result<&str, MessagingError> {
    let content = content.trim();
    if content.is_empty() {
        Err(MessagingError::EmptyMessage)
    } else {
        Ok(content)
    }
}

fn payload<T>(response: ApiResponse<T>) -> Result<T, MessagingError> {
    if !response.success {
        return Err(rejected(response.message));
    }
    Ok(response.into_data()?)
}

fn rejected(message: Option<String>) -> MessagingError {
    MessagingError::Rejected(message.unwrap_or_else(|| "Requête refusée".to_string()))
}

// =============================================================================
// Polling Session
// =============================================================================

/// Live messaging view: the polled conversation list plus, once a
/// conversation is selected, its polled messages.
///
/// Dropping the session cancels every loop it started.
#[derive(Debug)]
pub struct MessagingSession {
    service: MessagingService,
    root: CancellationToken,
    conversations: watch::Receiver<Option<Vec<Conversation>>>,
    conversations_task: Option<JoinHandle<()>>,
    selected: Option<MessagePoller>,
}

#[derive(Debug)]
struct MessagePoller {
    conversation: ConversationId,
    token: CancellationToken,
    messages: watch::Receiver<Option<Vec<Message>>>,
    task: JoinHandle<()>,
}

impl MessagingSession {
    fn start(service: MessagingService) -> Self {
        let root = CancellationToken::new();
        let (tx, conversations) = watch::channel(None);

        let fetcher = service.clone();
        let conversations_task = spawn_poller(
            "conversations",
            service.polling.conversations,
            root.child_token(),
            tx,
            move || {
                let fetcher = fetcher.clone();
                async move { fetcher.conversations().await }
            },
        );

        Self {
            service,
            root,
            conversations,
            conversations_task: Some(conversations_task),
            selected: None,
        }
    }

    /// Latest conversation list; `None` until the first fetch succeeds.
    #[must_use]
    pub fn conversations(&self) -> watch::Receiver<Option<Vec<Conversation>>> {
        self.conversations.clone()
    }

    /// Open a conversation and start polling its messages.
    ///
    /// The previously selected conversation's poller is cancelled first, so
    /// its receiver never sees another update.
    pub fn select(&mut self, id: ConversationId) -> watch::Receiver<Option<Vec<Message>>> {
        self.deselect();

        let token = self.root.child_token();
        let (tx, messages) = watch::channel(None);

        let fetcher = self.service.clone();
        let conversation = id.clone();
        let task = spawn_poller(
            "messages",
            self.service.polling.messages,
            token.clone(),
            tx,
            move || {
                let fetcher = fetcher.clone();
                let conversation = conversation.clone();
                async move { fetcher.messages(&conversation).await }
            },
        );

        debug!(conversation_id = %id, "Conversation selected");
        self.selected = Some(MessagePoller {
            conversation: id,
            token,
            messages: messages.clone(),
            task,
        });
        messages
    }

    /// Stop polling the open conversation.
    pub fn deselect(&mut self) {
        if let Some(previous) = self.selected.take() {
            debug!(conversation_id = %previous.conversation, "Conversation closed");
            previous.token.cancel();
        }
    }

    /// Currently selected conversation.
    #[must_use]
    pub fn selected(&self) -> Option<&ConversationId> {
        self.selected.as_ref().map(|poller| &poller.conversation)
    }

    /// Message feed of the selected conversation.
    #[must_use]
    pub fn messages(&self) -> Option<watch::Receiver<Option<Vec<Message>>>> {
        self.selected.as_ref().map(|poller| poller.messages.clone())
    }

    /// Cancel every loop and wait for the tasks to finish.
    pub async fn shutdown(mut self) {
        self.root.cancel();

        let mut tasks = Vec::with_capacity(2);
        tasks.extend(self.conversations_task.take());
        tasks.extend(self.selected.take().map(|poller| poller.task));

        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Polling task ended abnormally");
            }
        }
    }
}

impl Drop for MessagingSession {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

/// Shortest period a poller accepts; shorter periods are raised to it.
const MIN_POLL_PERIOD: Duration = Duration::from_millis(10);

/// Spawn a loop that calls `fetch` every `period` and publishes successful
/// results on `tx`.
///
/// The first fetch runs immediately. Fetches never overlap: a tick that
/// comes due while a fetch is running is skipped. Cancellation wins over a
/// fetch in flight, and a poller cancelled after its fetch completed drops
/// the result. The loop runs until `token` is cancelled.
fn spawn_poller<T, F, Fut>(
    name: &'static str,
    period: Duration,
    token: CancellationToken,
    tx: watch::Sender<Option<T>>,
    mut fetch: F,
) -> JoinHandle<()>
where
    T: Send + Sync + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, MessagingError>> + Send,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period.max(MIN_POLL_PERIOD));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                biased;
                () = token.cancelled() => break,
                result = fetch() => result,
            };

            if token.is_cancelled() {
                break;
            }

            match result {
                Ok(value) => {
                    tx.send_replace(Some(value));
                }
                Err(e) => warn!(poller = name, error = %e, "Poll failed"),
            }
        }

        debug!(poller = name, "Poller stopped");
    })
}
