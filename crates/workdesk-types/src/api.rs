use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{NotificationType, Role};

// -- JWT Claims --

/// Verified caller identity issued by the portal's account service.
/// Shared by the API middleware and the sync client, which only forwards it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub email: String,
    pub role: Role,
    pub exp: usize,
}

// -- Messages --

/// Exactly one of `recipient_id` / `recipient_role` must be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub body: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub recipient_id: Option<i64>,
    #[serde(default)]
    pub recipient_role: Option<Role>,
    #[serde(default)]
    pub reply_to_id: Option<i64>,
}

impl SendMessageRequest {
    pub fn direct(recipient_id: i64, body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            subject: None,
            recipient_id: Some(recipient_id),
            recipient_role: None,
            reply_to_id: None,
        }
    }

    pub fn broadcast(role: Role, body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            subject: None,
            recipient_id: None,
            recipient_role: Some(role),
            reply_to_id: None,
        }
    }
}

/// For a broadcast, the identifying fields point at one representative
/// recipient's conversation and are absent when nobody received the message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub id: Option<i64>,
    pub conversation_key: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub broadcast: Option<BroadcastSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastSummary {
    pub batch_key: String,
    pub sent: u32,
    pub failed: Vec<FailedRecipient>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRecipient {
    pub recipient_id: i64,
    pub reason: String,
}

/// Re-send a broadcast to the subset that failed last time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryBroadcastRequest {
    /// Role of the original broadcast; only labels the batch.
    pub recipient_role: Role,
    pub recipient_ids: Vec<i64>,
    pub body: String,
    #[serde(default)]
    pub subject: Option<String>,
}

// -- Conversations --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub conversation_key: String,
    pub participant: i64,
    pub participant_email: Option<String>,
    pub participant_role: Option<Role>,
    pub last_message: String,
    pub last_message_time: DateTime<Utc>,
    pub unread_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkReadResponse {
    pub updated: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u32,
}

// -- Notifications --

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NotificationQuery {
    #[serde(rename = "type", default)]
    pub kind: Option<NotificationType>,
    #[serde(default)]
    pub is_read: Option<bool>,
}

// -- Errors --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_request_rejects_unknown_fields() {
        let json = r#"{"body":"hi","recipient_id":5,"acting_as":1}"#;
        assert!(serde_json::from_str::<SendMessageRequest>(json).is_err());
    }

    #[test]
    fn send_request_accepts_role_target() {
        let json = r#"{"body":"Reminder","recipient_role":"employee"}"#;
        let req: SendMessageRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.recipient_role, Some(Role::Employee));
        assert_eq!(req.recipient_id, None);
    }

    #[test]
    fn notification_query_reads_type_param() {
        let q: NotificationQuery = serde_json::from_str(r#"{"type":"LEAVE","is_read":false}"#).unwrap();
        assert_eq!(q.kind, Some(NotificationType::Leave));
        assert_eq!(q.is_read, Some(false));

        let lower: NotificationQuery = serde_json::from_str(r#"{"type":"leave"}"#).unwrap();
        assert_eq!(lower.kind, Some(NotificationType::Leave));
    }
}
