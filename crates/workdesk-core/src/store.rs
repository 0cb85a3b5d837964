use std::sync::Arc;

use workdesk_db::Database;
use workdesk_db::models::NewMessage;
use workdesk_types::models::{ConversationSummary, Message, MessageType};

use crate::conversation::ConversationKey;
use crate::error::{CoreError, CoreResult};
use crate::notifications::NotificationBridge;

/// A message about to be appended. `recipient_id` is always concrete; role
/// targets are expanded before anything reaches the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraft {
    pub sender_id: i64,
    pub recipient_id: i64,
    pub body: String,
    pub subject: Option<String>,
    pub reply_to_id: Option<i64>,
    pub message_type: MessageType,
}

impl MessageDraft {
    pub fn direct(sender_id: i64, recipient_id: i64, body: impl Into<String>) -> Self {
        Self {
            sender_id,
            recipient_id,
            body: body.into(),
            subject: None,
            reply_to_id: None,
            message_type: MessageType::Direct,
        }
    }

    pub fn with_subject(mut self, subject: Option<String>) -> Self {
        self.subject = subject;
        self
    }

    pub fn replying_to(mut self, reply_to_id: Option<i64>) -> Self {
        self.reply_to_id = reply_to_id;
        self
    }
}

/// Append-only message log grouped into derived conversations.
#[derive(Clone)]
pub struct MessageStore {
    db: Arc<Database>,
    bridge: NotificationBridge,
}

impl MessageStore {
    pub fn new(db: Arc<Database>, bridge: NotificationBridge) -> Self {
        Self { db, bridge }
    }

    /// Validate and persist one message together with its `MESSAGE`
    /// notification for the recipient. The body is stored as sent; only its
    /// trimmed form must be non-empty.
    pub fn append(&self, draft: &MessageDraft) -> CoreResult<Message> {
        let body = draft.body.as_str();
        if body.trim().is_empty() {
            return Err(CoreError::validation("message body must not be empty"));
        }
        if draft.sender_id == draft.recipient_id {
            return Err(CoreError::validation("cannot send a message to yourself"));
        }

        let key = ConversationKey::between(draft.sender_id, draft.recipient_id).to_string();

        if let Some(reply_to) = draft.reply_to_id {
            let target = self.db.get_message(reply_to)?.ok_or_else(|| {
                CoreError::validation(format!("reply target {} does not exist", reply_to))
            })?;
            if target.conversation_key != key {
                return Err(CoreError::validation(format!(
                    "reply target {} is not part of {}",
                    reply_to, key
                )));
            }
        }

        let subject = draft
            .subject
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let notification = self.bridge.compose_for_message(
            draft.sender_id,
            draft.recipient_id,
            &key,
            body,
            draft.message_type,
        )?;

        let row = self.db.insert_message(
            &NewMessage {
                conversation_key: &key,
                sender_id: draft.sender_id,
                recipient_id: draft.recipient_id,
                subject,
                body,
                message_type: draft.message_type.as_str(),
                reply_to_id: draft.reply_to_id,
            },
            Some(&notification.as_new()),
        )?;

        Ok(row.into_model()?)
    }

    /// One summary per conversation the account takes part in, most recently
    /// active first.
    pub fn list_conversations_for(&self, account_id: i64) -> CoreResult<Vec<ConversationSummary>> {
        let rows = self.db.get_conversations_for(account_id)?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let last = row.last.into_model()?;
            let other_participant = if last.sender_id == account_id {
                last.recipient_id
            } else {
                last.sender_id
            };
            summaries.push(ConversationSummary {
                conversation_key: last.conversation_key.clone(),
                other_participant,
                last_message_time: last.created_at,
                last_message: last,
                unread_count: row.unread_count,
            });
        }
        Ok(summaries)
    }

    /// Thread in canonical order: ascending `(created_at, id)`.
    pub fn list_messages(&self, conversation_key: &str, account_id: i64) -> CoreResult<Vec<Message>> {
        self.ensure_participant(conversation_key, account_id)?;

        let messages = self
            .db
            .get_conversation_messages(conversation_key)?
            .into_iter()
            .map(|row| row.into_model())
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(messages)
    }

    /// A conversation is visible to the accounts that sent or received at
    /// least one of its messages.
    pub fn ensure_participant(&self, conversation_key: &str, account_id: i64) -> CoreResult<()> {
        let not_found = || CoreError::not_found(format!("conversation {}", conversation_key));

        let key = conversation_key
            .parse::<ConversationKey>()
            .map_err(|_| not_found())?;

        if self.db.count_conversation_messages(conversation_key)? == 0 {
            return Err(not_found());
        }
        if !key.involves(account_id) {
            return Err(CoreError::authorization(format!(
                "account {} is not a participant of {}",
                account_id, conversation_key
            )));
        }
        Ok(())
    }

    pub fn unread_count(&self, account_id: i64) -> CoreResult<u32> {
        Ok(self.db.count_unread_messages(account_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (Arc<Database>, MessageStore) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.upsert_account(1, "m@corp", "manager").unwrap();
        db.upsert_account(5, "e@corp", "employee").unwrap();
        db.upsert_account(7, "g@corp", "employee").unwrap();
        let bridge = NotificationBridge::new(db.clone(), db.clone());
        (db.clone(), MessageStore::new(db, bridge))
    }

    #[test]
    fn append_assigns_symmetric_key_and_notifies_recipient() {
        let (db, store) = store();
        let m = store
            .append(&MessageDraft::direct(5, 1, "running late").with_subject(Some(" ".into())))
            .unwrap();
        assert_eq!(m.conversation_key, "dm:1:5");
        assert_eq!(m.body, "running late");
        assert_eq!(m.subject, None);
        assert_eq!(m.message_type, MessageType::Direct);

        let notes = db.get_notifications(1, Some("MESSAGE"), None).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].message, "running late");
        assert!(db.get_notifications(5, None, None).unwrap().is_empty());
    }

    #[test]
    fn body_is_stored_as_sent() {
        let (db, store) = store();
        let body = "  1. agenda\n  2. budget\n";
        let m = store.append(&MessageDraft::direct(1, 5, body)).unwrap();
        assert_eq!(m.body, body);
        assert_eq!(store.list_messages("dm:1:5", 5).unwrap()[0].body, body);

        let notes = db.get_notifications(5, Some("MESSAGE"), None).unwrap();
        assert_eq!(notes[0].message, "1. agenda\n  2. budget");
    }

    #[test]
    fn append_rejects_empty_body_and_self_messages() {
        let (db, store) = store();
        assert!(matches!(
            store.append(&MessageDraft::direct(1, 5, "   ")),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            store.append(&MessageDraft::direct(5, 5, "note to self")),
            Err(CoreError::Validation(_))
        ));
        assert!(db.get_notifications(5, None, None).unwrap().is_empty());
    }

    #[test]
    fn reply_must_stay_in_conversation() {
        let (_db, store) = store();
        let to_seven = store.append(&MessageDraft::direct(1, 7, "for seven")).unwrap();
        let to_five = store.append(&MessageDraft::direct(1, 5, "for five")).unwrap();

        let stray = MessageDraft::direct(5, 1, "re").replying_to(Some(to_seven.id));
        assert!(matches!(store.append(&stray), Err(CoreError::Validation(_))));

        let missing = MessageDraft::direct(5, 1, "re").replying_to(Some(9_999));
        assert!(matches!(store.append(&missing), Err(CoreError::Validation(_))));

        let reply = store
            .append(&MessageDraft::direct(5, 1, "re").replying_to(Some(to_five.id)))
            .unwrap();
        assert_eq!(reply.reply_to_id, Some(to_five.id));
    }

    #[test]
    fn both_participants_see_the_same_thread() {
        let (_db, store) = store();
        store.append(&MessageDraft::direct(1, 5, "one")).unwrap();
        store.append(&MessageDraft::direct(5, 1, "two")).unwrap();
        store.append(&MessageDraft::direct(1, 5, "three")).unwrap();

        let for_one = store.list_messages("dm:1:5", 1).unwrap();
        let for_five = store.list_messages("dm:1:5", 5).unwrap();
        assert_eq!(for_one, for_five);
        let bodies: Vec<_> = for_one.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["one", "two", "three"]);
    }

    #[test]
    fn non_participants_and_unknown_keys_are_refused() {
        let (_db, store) = store();
        store.append(&MessageDraft::direct(1, 5, "hello")).unwrap();

        assert!(store.list_messages("dm:1:5", 5).is_ok());
        assert!(matches!(store.list_messages("dm:1:5", 9), Err(CoreError::Authorization(_))));
        assert!(matches!(store.list_messages("dm:1:7", 1), Err(CoreError::NotFound(_))));
        assert!(matches!(store.list_messages("dm:5:1", 5), Err(CoreError::NotFound(_))));
        assert!(matches!(store.list_messages("general", 5), Err(CoreError::NotFound(_))));
    }

    #[test]
    fn conversation_unread_matches_thread_unread() {
        let (_db, store) = store();
        store.append(&MessageDraft::direct(1, 5, "a")).unwrap();
        store.append(&MessageDraft::direct(1, 5, "b")).unwrap();
        store.append(&MessageDraft::direct(5, 1, "c")).unwrap();
        store.append(&MessageDraft::direct(7, 5, "d")).unwrap();

        for summary in store.list_conversations_for(5).unwrap() {
            let thread = store.list_messages(&summary.conversation_key, 5).unwrap();
            let unread = thread
                .iter()
                .filter(|m| m.recipient_id == 5 && !m.is_read)
                .count() as u32;
            assert_eq!(summary.unread_count, unread);
        }

        let summaries = store.list_conversations_for(5).unwrap();
        assert_eq!(summaries[0].conversation_key, "dm:5:7");
        assert_eq!(summaries[0].other_participant, 7);
        assert_eq!(summaries[1].other_participant, 1);
        assert_eq!(summaries[1].last_message.body, "c");
        assert_eq!(store.unread_count(5).unwrap(), 3);
    }
}
