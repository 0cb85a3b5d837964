//! Notification inbox and the message → notification bridge.
//!
//! `MESSAGE` notifications are only ever written as part of a message insert
//! (see [`crate::store::MessageStore::append`]). Other kinds arrive from
//! producers outside the messaging core through [`NotificationBridge::publish`].

use std::sync::Arc;

use tracing::{debug, info};
use workdesk_db::Database;
use workdesk_db::models::NewNotification;
use workdesk_types::models::{MessageType, Notification, NotificationType};

use crate::directory::AccountDirectory;
use crate::error::{CoreError, CoreResult};

/// Maximum characters of a message body copied into its notification.
pub const PREVIEW_CHARS: usize = 100;

/// Owned notification payload, built before the row exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub recipient_id: i64,
    pub title: String,
    pub message: String,
    pub kind: NotificationType,
    pub link_to: Option<String>,
}

impl NotificationDraft {
    pub fn as_new(&self) -> NewNotification<'_> {
        NewNotification {
            recipient_id: self.recipient_id,
            title: &self.title,
            message: &self.message,
            kind: self.kind.as_str(),
            link_to: self.link_to.as_deref(),
        }
    }
}

#[derive(Clone)]
pub struct NotificationBridge {
    db: Arc<Database>,
    directory: Arc<dyn AccountDirectory>,
}

impl NotificationBridge {
    pub fn new(db: Arc<Database>, directory: Arc<dyn AccountDirectory>) -> Self {
        Self { db, directory }
    }

    /// Build the `MESSAGE` notification announcing a delivered message.
    pub fn compose_for_message(
        &self,
        sender_id: i64,
        recipient_id: i64,
        conversation_key: &str,
        body: &str,
        message_type: MessageType,
    ) -> CoreResult<NotificationDraft> {
        let sender = match self.directory.account(sender_id)? {
            Some(account) => account.email,
            None => format!("account #{}", sender_id),
        };
        let title = match message_type {
            MessageType::Direct => format!("New message from {}", sender),
            MessageType::Broadcast => format!("Broadcast from {}", sender),
        };

        Ok(NotificationDraft {
            recipient_id,
            title,
            message: preview(body),
            kind: NotificationType::Message,
            link_to: Some(conversation_link(conversation_key)),
        })
    }

    /// Entry point for other subsystems (leave approvals, access alerts).
    pub fn publish(
        &self,
        recipient_id: i64,
        title: &str,
        message: &str,
        kind: NotificationType,
        link_to: Option<&str>,
    ) -> CoreResult<Notification> {
        if kind == NotificationType::Message {
            return Err(CoreError::validation(
                "MESSAGE notifications are created by message delivery only",
            ));
        }
        if title.trim().is_empty() {
            return Err(CoreError::validation("notification title must not be empty"));
        }
        if self.directory.account(recipient_id)?.is_none() {
            return Err(CoreError::not_found(format!("account {}", recipient_id)));
        }

        let row = self.db.insert_notification(&NewNotification {
            recipient_id,
            title: title.trim(),
            message,
            kind: kind.as_str(),
            link_to,
        })?;
        info!("Published {} notification {} to account {}", kind.as_str(), row.id, recipient_id);
        Ok(row.into_model()?)
    }

    pub fn list(
        &self,
        account_id: i64,
        kind: Option<NotificationType>,
        is_read: Option<bool>,
    ) -> CoreResult<Vec<Notification>> {
        let rows = self
            .db
            .get_notifications(account_id, kind.map(|k| k.as_str()), is_read)?;
        let notifications = rows
            .into_iter()
            .map(|row| row.into_model())
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(notifications)
    }

    /// Only the recipient may mark a notification read. Marking an already
    /// read notification succeeds without change.
    pub fn mark_read(&self, id: i64, account_id: i64) -> CoreResult<()> {
        let row = self
            .db
            .get_notification(id)?
            .ok_or_else(|| CoreError::not_found(format!("notification {}", id)))?;
        if row.recipient_id != account_id {
            return Err(CoreError::authorization(format!(
                "notification {} belongs to another account",
                id
            )));
        }

        let updated = self.db.mark_notification_read(id, account_id)?;
        debug!("Notification {} marked read by {} ({} updated)", id, account_id, updated);
        Ok(())
    }

    pub fn mark_all_read(&self, account_id: i64) -> CoreResult<u32> {
        let updated = self.db.mark_all_notifications_read(account_id)?;
        debug!("Marked {} notifications read for {}", updated, account_id);
        Ok(updated as u32)
    }

    pub fn unread_count(&self, account_id: i64) -> CoreResult<u32> {
        Ok(self.db.count_unread_notifications(account_id)?)
    }
}

/// Route the UI resolves to the conversation view.
pub fn conversation_link(conversation_key: &str) -> String {
    format!("/messages/{}", conversation_key)
}

/// First [`PREVIEW_CHARS`] characters of `body`, with an ellipsis when cut.
pub fn preview(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}…", body[..cut].trim_end()),
        None => body.to_string(),
    }
}
