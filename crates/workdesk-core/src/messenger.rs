use std::sync::Arc;

use workdesk_db::Database;
use workdesk_types::api::{
    ConversationResponse, NotificationQuery, RetryBroadcastRequest, SendMessageRequest,
    SendMessageResponse,
};
use workdesk_types::models::{Message, Notification, Role};

use crate::Caller;
use crate::directory::AccountDirectory;
use crate::error::{CoreError, CoreResult};
use crate::fanout::{BroadcastFanout, BroadcastReport};
use crate::notifications::NotificationBridge;
use crate::read_state::ReadStateTracker;
use crate::store::{MessageDraft, MessageStore};

/// Result of `send_message`: one row for a direct send, a report for a
/// role broadcast.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    Direct(Message),
    Broadcast(BroadcastReport),
}

impl SendOutcome {
    /// A broadcast is represented by its first delivered leg.
    pub fn into_response(self) -> SendMessageResponse {
        match self {
            Self::Direct(message) => SendMessageResponse {
                id: Some(message.id),
                conversation_key: Some(message.conversation_key),
                created_at: Some(message.created_at),
                broadcast: None,
            },
            Self::Broadcast(report) => {
                let summary = report.summary();
                let first = report.sent.into_iter().next();
                SendMessageResponse {
                    id: first.as_ref().map(|m| m.id),
                    created_at: first.as_ref().map(|m| m.created_at),
                    conversation_key: first.map(|m| m.conversation_key),
                    broadcast: Some(summary),
                }
            }
        }
    }
}

/// Operation surface of the messaging core, one method per external call.
#[derive(Clone)]
pub struct Messenger {
    directory: Arc<dyn AccountDirectory>,
    store: MessageStore,
    fanout: BroadcastFanout,
    read_state: ReadStateTracker,
    notifications: NotificationBridge,
}

impl Messenger {
    pub fn new(db: Arc<Database>, directory: Arc<dyn AccountDirectory>) -> Self {
        let notifications = NotificationBridge::new(db.clone(), directory.clone());
        let store = MessageStore::new(db.clone(), notifications.clone());
        Self {
            fanout: BroadcastFanout::new(directory.clone()),
            read_state: ReadStateTracker::new(db, store.clone()),
            directory,
            store,
            notifications,
        }
    }

    /// Backed by the `accounts` table of the same database.
    pub fn with_local_directory(db: Arc<Database>) -> Self {
        Self::new(db.clone(), db)
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Producer surface for non-message notifications.
    pub fn notifications(&self) -> &NotificationBridge {
        &self.notifications
    }

    pub fn send_message(&self, caller: &Caller, req: &SendMessageRequest) -> CoreResult<SendOutcome> {
        match (req.recipient_id, req.recipient_role) {
            (Some(recipient_id), None) => self
                .send_direct(
                    caller,
                    recipient_id,
                    &req.body,
                    req.subject.as_deref(),
                    req.reply_to_id,
                )
                .map(SendOutcome::Direct),
            (None, Some(role)) => {
                if req.reply_to_id.is_some() {
                    return Err(CoreError::validation("a broadcast cannot reply to a message"));
                }
                self.send_broadcast(caller, role, &req.body, req.subject.as_deref())
                    .map(SendOutcome::Broadcast)
            }
            _ => Err(CoreError::validation(
                "exactly one of recipient_id or recipient_role must be set",
            )),
        }
    }

    pub fn send_direct(
        &self,
        caller: &Caller,
        recipient_id: i64,
        body: &str,
        subject: Option<&str>,
        reply_to_id: Option<i64>,
    ) -> CoreResult<Message> {
        if recipient_id != caller.account_id && self.directory.account(recipient_id)?.is_none() {
            return Err(CoreError::not_found(format!("account {}", recipient_id)));
        }

        let draft = MessageDraft::direct(caller.account_id, recipient_id, body)
            .with_subject(subject.map(str::to_string))
            .replying_to(reply_to_id);
        self.store.append(&draft)
    }

    pub fn send_broadcast(
        &self,
        caller: &Caller,
        role: Role,
        body: &str,
        subject: Option<&str>,
    ) -> CoreResult<BroadcastReport> {
        self.fanout
            .send_broadcast(&self.store, caller, role, body, subject)
    }

    pub fn retry_broadcast(
        &self,
        caller: &Caller,
        req: &RetryBroadcastRequest,
    ) -> CoreResult<BroadcastReport> {
        self.fanout.retry(
            &self.store,
            caller,
            req.recipient_role,
            &req.recipient_ids,
            &req.body,
            req.subject.as_deref(),
        )
    }

    /// Inbox listing enriched with the other participant's directory entry.
    pub fn list_conversations(&self, caller: &Caller) -> CoreResult<Vec<ConversationResponse>> {
        let summaries = self.store.list_conversations_for(caller.account_id)?;

        let mut out = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let participant = self.directory.account(summary.other_participant)?;
            out.push(ConversationResponse {
                conversation_key: summary.conversation_key,
                participant: summary.other_participant,
                participant_email: participant.as_ref().map(|a| a.email.clone()),
                participant_role: participant.map(|a| a.role),
                last_message: summary.last_message.body,
                last_message_time: summary.last_message_time,
                unread_count: summary.unread_count,
            });
        }
        Ok(out)
    }

    pub fn list_messages(&self, caller: &Caller, conversation_key: &str) -> CoreResult<Vec<Message>> {
        self.store.list_messages(conversation_key, caller.account_id)
    }

    pub fn mark_conversation_read(&self, caller: &Caller, conversation_key: &str) -> CoreResult<u32> {
        self.read_state
            .mark_conversation_read(conversation_key, caller.account_id)
    }

    pub fn unread_message_count(&self, caller: &Caller) -> CoreResult<u32> {
        self.store.unread_count(caller.account_id)
    }

    pub fn list_notifications(
        &self,
        caller: &Caller,
        query: &NotificationQuery,
    ) -> CoreResult<Vec<Notification>> {
        self.notifications
            .list(caller.account_id, query.kind, query.is_read)
    }

    pub fn mark_notification_read(&self, caller: &Caller, id: i64) -> CoreResult<()> {
        self.notifications.mark_read(id, caller.account_id)
    }

    pub fn mark_all_notifications_read(&self, caller: &Caller) -> CoreResult<u32> {
        self.notifications.mark_all_read(caller.account_id)
    }

    pub fn unread_notification_count(&self, caller: &Caller) -> CoreResult<u32> {
        self.notifications.unread_count(caller.account_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workdesk_types::models::NotificationType;

    fn messenger() -> Messenger {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.upsert_account(1, "boss@corp", "manager").unwrap();
        db.upsert_account(5, "eve@corp", "employee").unwrap();
        db.upsert_account(7, "gus@corp", "employee").unwrap();
        db.upsert_account(9, "ivy@corp", "employee").unwrap();
        Messenger::with_local_directory(db)
    }

    fn employee(id: i64) -> Caller {
        Caller::new(id, Role::Employee)
    }

    #[test]
    fn broadcast_scenario_end_to_end() {
        let m = messenger();
        let boss = Caller::new(1, Role::Manager);
        let req = SendMessageRequest::broadcast(Role::Employee, "Reminder");

        let resp = m.send_message(&boss, &req).unwrap().into_response();
        let summary = resp.broadcast.unwrap();
        assert_eq!(summary.sent, 3);
        assert!(summary.failed.is_empty());
        assert_eq!(resp.conversation_key.as_deref(), Some("dm:1:5"));
        assert!(resp.id.is_some());

        for id in [5, 7, 9] {
            let notes = m.list_notifications(&employee(id), &NotificationQuery::default()).unwrap();
            assert_eq!(notes.len(), 1);
            assert_eq!(notes[0].kind, NotificationType::Message);
        }
    }

    #[test]
    fn target_must_be_exactly_one_of_id_or_role() {
        let m = messenger();
        let boss = Caller::new(1, Role::Manager);

        let mut both = SendMessageRequest::direct(5, "hi");
        both.recipient_role = Some(Role::Employee);
        assert!(matches!(m.send_message(&boss, &both), Err(CoreError::Validation(_))));

        let mut neither = SendMessageRequest::direct(5, "hi");
        neither.recipient_id = None;
        assert!(matches!(m.send_message(&boss, &neither), Err(CoreError::Validation(_))));
    }

    #[test]
    fn broadcast_cannot_be_a_reply() {
        let m = messenger();
        let boss = Caller::new(1, Role::Manager);
        let original = m.send_direct(&boss, 5, "hello", None, None).unwrap();

        let mut req = SendMessageRequest::broadcast(Role::Employee, "re: hello");
        req.reply_to_id = Some(original.id);
        assert!(matches!(m.send_message(&boss, &req), Err(CoreError::Validation(_))));
        assert!(m.list_conversations(&employee(7)).unwrap().is_empty());
    }

    #[test]
    fn direct_send_to_unknown_account_is_not_found() {
        let m = messenger();
        let req = SendMessageRequest::direct(404, "hello?");
        assert!(matches!(m.send_message(&employee(5), &req), Err(CoreError::NotFound(_))));
    }

    #[test]
    fn reply_across_conversations_is_rejected() {
        let m = messenger();
        let boss = Caller::new(1, Role::Manager);
        let to_seven = m.send_direct(&boss, 7, "for seven", None, None).unwrap();
        m.send_direct(&boss, 5, "for five", None, None).unwrap();

        let mut reply = SendMessageRequest::direct(1, "re");
        reply.reply_to_id = Some(to_seven.id);
        assert!(matches!(m.send_message(&employee(5), &reply), Err(CoreError::Validation(_))));
    }

    #[test]
    fn participant_reads_outsider_is_refused() {
        let m = messenger();
        let boss = Caller::new(1, Role::Manager);
        m.send_direct(&boss, 5, "hello", None, None).unwrap();

        assert_eq!(m.list_messages(&employee(5), "dm:1:5").unwrap().len(), 1);
        assert!(matches!(
            m.list_messages(&employee(9), "dm:1:5"),
            Err(CoreError::Authorization(_))
        ));
    }

    #[test]
    fn conversation_list_carries_participant_identity() {
        let m = messenger();
        let boss = Caller::new(1, Role::Manager);
        m.send_direct(&boss, 5, "hello", Some("Onboarding"), None).unwrap();

        let list = m.list_conversations(&employee(5)).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].participant, 1);
        assert_eq!(list[0].participant_email.as_deref(), Some("boss@corp"));
        assert_eq!(list[0].participant_role, Some(Role::Manager));
        assert_eq!(list[0].unread_count, 1);

        assert_eq!(m.mark_conversation_read(&employee(5), "dm:1:5").unwrap(), 1);
        assert_eq!(m.mark_conversation_read(&employee(5), "dm:1:5").unwrap(), 0);
        assert_eq!(m.list_conversations(&employee(5)).unwrap()[0].unread_count, 0);
        assert_eq!(m.unread_message_count(&employee(5)).unwrap(), 0);
    }

    #[test]
    fn broadcast_with_no_recipients_has_no_representative() {
        let m = messenger();
        let director = Caller::new(1, Role::Director);
        let resp = m
            .send_message(&director, &SendMessageRequest::broadcast(Role::Director, "quiet"))
            .unwrap()
            .into_response();
        assert!(resp.id.is_none());
        assert!(resp.conversation_key.is_none());
        assert_eq!(resp.broadcast.unwrap().sent, 0);
    }
}
