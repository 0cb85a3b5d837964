//! Database row types. These map directly to SQLite rows and are kept
//! distinct from the workdesk-types API models; `into_model` converts.

use anyhow::{Result, anyhow};
use workdesk_types::models::{Account, Message, Notification};

use crate::parse_timestamp;

pub struct AccountRow {
    pub id: i64,
    pub email: String,
    pub role: String,
}

impl AccountRow {
    pub fn into_model(self) -> Result<Account> {
        let role = self
            .role
            .parse()
            .map_err(|e| anyhow!("Corrupt role on account {}: {}", self.id, e))?;
        Ok(Account {
            id: self.id,
            email: self.email,
            role,
        })
    }
}

pub struct MessageRow {
    pub id: i64,
    pub conversation_key: String,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub subject: Option<String>,
    pub body: String,
    pub message_type: String,
    pub is_read: bool,
    pub read_at: Option<String>,
    pub reply_to_id: Option<i64>,
    pub created_at: String,
}

impl MessageRow {
    pub fn into_model(self) -> Result<Message> {
        let message_type = self
            .message_type
            .parse()
            .map_err(|e| anyhow!("Corrupt message_type on message {}: {}", self.id, e))?;
        let read_at = self.read_at.as_deref().map(parse_timestamp).transpose()?;
        Ok(Message {
            id: self.id,
            conversation_key: self.conversation_key,
            sender_id: self.sender_id,
            recipient_id: self.recipient_id,
            subject: self.subject,
            body: self.body,
            message_type,
            is_read: self.is_read,
            read_at,
            reply_to_id: self.reply_to_id,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

pub struct NotificationRow {
    pub id: i64,
    pub recipient_id: i64,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub is_read: bool,
    pub link_to: Option<String>,
    pub created_at: String,
}

impl NotificationRow {
    pub fn into_model(self) -> Result<Notification> {
        let kind = self
            .kind
            .parse()
            .map_err(|e| anyhow!("Corrupt type on notification {}: {}", self.id, e))?;
        Ok(Notification {
            id: self.id,
            recipient_id: self.recipient_id,
            title: self.title,
            message: self.message,
            kind,
            is_read: self.is_read,
            link_to: self.link_to,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

/// Latest message of one conversation plus the caller's unread count in it.
pub struct ConversationRow {
    pub last: MessageRow,
    pub unread_count: u32,
}

/// Insert payload for a message. `created_at` is assigned by the store.
pub struct NewMessage<'a> {
    pub conversation_key: &'a str,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub subject: Option<&'a str>,
    pub body: &'a str,
    pub message_type: &'a str,
    pub reply_to_id: Option<i64>,
}

pub struct NewNotification<'a> {
    pub recipient_id: i64,
    pub title: &'a str,
    pub message: &'a str,
    pub kind: &'a str,
    pub link_to: Option<&'a str>,
}
