//! Data models for Microsoft Teams chats and messages.

use serde::{Deserialize, Serialize};

use crate::{CoreError, Result};

/// A Teams chat visible to the service account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chat {
    /// Graph chat ID (e.g. `19:xxx@thread.v2`).
    pub id: String,
    /// Kind of chat.
    #[serde(rename = "type")]
    pub chat_type: ChatType,
    /// Topic for group and meeting chats.
    pub topic: Option<String>,
    /// Members of the chat other than the service account.
    pub members: Vec<ChatMember>,
    /// Link that opens the chat in the Teams client.
    pub web_url: Option<String>,
}

/// Type of chat, as reported in Graph's `chatType` field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ChatType {
    /// One-on-one chat.
    OneOnOne,
    /// Group chat.
    Group,
    /// Chat attached to a meeting.
    Meeting,
}

impl ChatType {
    /// Map a Graph `chatType` value. Returns `None` for unknown types.
    #[must_use]
    pub fn from_graph(value: &str) -> Option<Self> {
        match value {
            "oneOnOne" => Some(Self::OneOnOne),
            "group" => Some(Self::Group),
            "meeting" => Some(Self::Meeting),
            _ => None,
        }
    }
}

/// A member of a chat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMember {
    /// Display name.
    pub display_name: Option<String>,
    /// Email address.
    pub email: Option<String>,
}

impl ChatMember {
    /// Case-insensitive match against the member's email or display name.
    #[must_use]
    pub fn matches(&self, needle: &str) -> bool {
        [self.email.as_deref(), self.display_name.as_deref()]
            .into_iter()
            .flatten()
            .any(|value| value.eq_ignore_ascii_case(needle))
    }
}

/// Message content type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Plain text content.
    #[default]
    Text,
    /// HTML formatted content.
    Html,
}

impl ContentType {
    /// Value of Graph's `body.contentType` field.
    #[must_use]
    pub const fn as_graph(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Html => "html",
        }
    }
}

/// A message to post into a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Target chat ID.
    pub chat_id: String,
    /// Message content.
    pub body: String,
    /// How Teams should render the content.
    pub content_type: ContentType,
}

impl OutboundMessage {
    /// Create a plain-text message.
    #[must_use]
    pub fn new(chat_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            body: body.into(),
            content_type: ContentType::Text,
        }
    }

    /// Set the content type.
    #[must_use]
    pub const fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    /// Reject empty chat IDs and blank bodies.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` describing the missing field.
    pub fn validate(&self) -> Result<()> {
        if self.chat_id.trim().is_empty() {
            return Err(CoreError::Validation("chat-id must not be empty".to_string()));
        }
        if self.body.trim().is_empty() {
            return Err(CoreError::Validation("message must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Result of resolving a user or group to a chat.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatLookup {
    /// Chat ID to send messages to.
    pub chat_id: String,
    /// Display name of the user, or the group topic.
    pub name: String,
}
