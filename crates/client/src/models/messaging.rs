//! Private conversations between users and professionals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use renomarket_core::{ConversationId, MessageId, UserId};

/// A conversation summary as listed by `/messages/conversations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(rename = "_id")]
    pub id: ConversationId,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Conversation {
    /// The participant who is not `me`, for one-to-one conversations.
    #[must_use]
    pub fn other_participant(&self, me: &UserId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id != me)
    }
}

/// A conversation member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    #[serde(rename = "_id")]
    pub id: UserId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl Participant {
    /// "First Last".
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// A single message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: MessageId,
    pub sender: MessageSender,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

/// The backend sends the sender either as an id or as a populated profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageSender {
    Id(UserId),
    Profile(Participant),
}

impl MessageSender {
    /// Sender id, whichever form was sent.
    #[must_use]
    pub const fn id(&self) -> &UserId {
        match self {
            Self::Id(id) => id,
            Self::Profile(participant) => &participant.id,
        }
    }
}
