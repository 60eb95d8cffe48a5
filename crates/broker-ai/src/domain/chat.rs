use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::new_id;
use super::property::PropertyId;
use super::stage::BuyerStage;
use super::user::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChatId(pub String);

impl ChatId {
    pub fn generate() -> Self {
        Self(new_id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Conversation between the broker and one phone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub user_id: UserId,
    pub user_phone: String,
    pub property_id: Option<PropertyId>,
    /// Only buyer chats carry a stage; seller stages live on the property.
    pub stage: Option<BuyerStage>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Chat {
    pub fn new(user_id: UserId, user_phone: impl Into<String>) -> Self {
        Self {
            id: ChatId::generate(),
            user_id,
            user_phone: user_phone.into(),
            property_id: None,
            stage: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn link_property(&mut self, property_id: PropertyId) {
        self.property_id = Some(property_id);
        self.updated_at = Some(Utc::now());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSender {
    User,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Audio,
}

impl MessageKind {
    pub fn label(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Audio => "audio",
        }
    }
}

/// Append-only conversation entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender: MessageSender,
    pub kind: MessageKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    /// Vendor message id of inbound deliveries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
}

impl Message {
    pub fn from_user(
        chat_id: ChatId,
        kind: MessageKind,
        content: impl Into<String>,
        media_url: Option<String>,
        external_id: Option<String>,
    ) -> Self {
        Self {
            id: MessageId(new_id()),
            chat_id,
            sender: MessageSender::User,
            kind,
            content: content.into(),
            media_url,
            external_id,
            timestamp: Utc::now(),
            is_read: false,
        }
    }

    pub fn from_system(chat_id: ChatId, content: impl Into<String>) -> Self {
        Self {
            id: MessageId(new_id()),
            chat_id,
            sender: MessageSender::System,
            kind: MessageKind::Text,
            content: content.into(),
            media_url: None,
            external_id: None,
            timestamp: Utc::now(),
            is_read: true,
        }
    }

    /// Text an agent sees for this entry; media is rendered with its link.
    pub fn transcript_line(&self) -> String {
        match (self.kind, &self.media_url) {
            (MessageKind::Image, Some(url)) if self.content.trim().is_empty() => {
                format!("[imagen] {url}")
            }
            (MessageKind::Image, Some(url)) => format!("[imagen] {url}\n{}", self.content),
            (MessageKind::Audio, _) => format!("[audio] {}", self.content),
            _ => self.content.clone(),
        }
    }
}
