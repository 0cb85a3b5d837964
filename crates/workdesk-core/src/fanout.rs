//! Role broadcasts.
//!
//! A broadcast is not a message of its own: it expands into one independent
//! direct-style row per roster member. Legs are delivered one by one and a
//! failed leg never stops the rest.

use std::sync::Arc;

use tracing::{info, warn};
use workdesk_types::api::{BroadcastSummary, FailedRecipient};
use workdesk_types::models::{Message, MessageType, Role};

use crate::Caller;
use crate::conversation::broadcast_key;
use crate::directory::AccountDirectory;
use crate::error::{CoreError, CoreResult};
use crate::store::{MessageDraft, MessageStore};

/// Anything that can persist a single message leg.
pub trait MessageSink {
    fn deliver(&self, draft: &MessageDraft) -> CoreResult<Message>;
}

impl MessageSink for MessageStore {
    fn deliver(&self, draft: &MessageDraft) -> CoreResult<Message> {
        self.append(draft)
    }
}

/// Outcome of a fan-out. Partial delivery is a normal result.
#[derive(Debug, Clone)]
pub struct BroadcastReport {
    pub batch_key: String,
    pub sent: Vec<Message>,
    pub failed: Vec<FailedRecipient>,
}

impl BroadcastReport {
    pub fn is_partial(&self) -> bool {
        !self.sent.is_empty() && !self.failed.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<i64> {
        self.failed.iter().map(|f| f.recipient_id).collect()
    }

    pub fn summary(&self) -> BroadcastSummary {
        BroadcastSummary {
            batch_key: self.batch_key.clone(),
            sent: self.sent.len() as u32,
            failed: self.failed.clone(),
        }
    }
}

#[derive(Clone)]
pub struct BroadcastFanout {
    directory: Arc<dyn AccountDirectory>,
}

impl BroadcastFanout {
    pub fn new(directory: Arc<dyn AccountDirectory>) -> Self {
        Self { directory }
    }

    /// Snapshot of `role` taken now, without the sender.
    pub fn resolve_roster(&self, sender_id: i64, role: Role) -> CoreResult<Vec<i64>> {
        let roster = self
            .directory
            .accounts_with_role(role)?
            .into_iter()
            .map(|account| account.id)
            .filter(|id| *id != sender_id)
            .collect();
        Ok(roster)
    }

    pub fn send_broadcast<S: MessageSink>(
        &self,
        sink: &S,
        caller: &Caller,
        role: Role,
        body: &str,
        subject: Option<&str>,
    ) -> CoreResult<BroadcastReport> {
        ensure_can_broadcast(caller)?;
        ensure_body(body)?;

        let roster = self.resolve_roster(caller.account_id, role)?;
        let batch_key = broadcast_key(caller.account_id, role);
        info!("Broadcast {} resolved {} recipient(s)", batch_key, roster.len());

        Ok(self.deliver_legs(sink, caller, &roster, body, subject, batch_key))
    }

    /// Re-send to an explicit subset, typically the `failed` ids of an earlier
    /// report. Recipients unknown to the directory are reported as failed.
    pub fn retry<S: MessageSink>(
        &self,
        sink: &S,
        caller: &Caller,
        role: Role,
        recipient_ids: &[i64],
        body: &str,
        subject: Option<&str>,
    ) -> CoreResult<BroadcastReport> {
        ensure_can_broadcast(caller)?;
        ensure_body(body)?;

        let mut recipients: Vec<i64> = Vec::with_capacity(recipient_ids.len());
        let mut unknown = Vec::new();
        for &id in recipient_ids {
            if id == caller.account_id || recipients.contains(&id) || unknown.contains(&id) {
                continue;
            }
            if self.directory.account(id)?.is_some() {
                recipients.push(id);
            } else {
                unknown.push(id);
            }
        }

        let batch_key = broadcast_key(caller.account_id, role);
        info!("Retrying broadcast {} for {} recipient(s)", batch_key, recipients.len());

        let mut report = self.deliver_legs(sink, caller, &recipients, body, subject, batch_key);
        report.failed.extend(unknown.into_iter().map(|recipient_id| FailedRecipient {
            recipient_id,
            reason: "unknown recipient".to_string(),
        }));
        Ok(report)
    }

    fn deliver_legs<S: MessageSink>(
        &self,
        sink: &S,
        caller: &Caller,
        recipients: &[i64],
        body: &str,
        subject: Option<&str>,
        batch_key: String,
    ) -> BroadcastReport {
        let mut report = BroadcastReport {
            batch_key,
            sent: Vec::with_capacity(recipients.len()),
            failed: Vec::new(),
        };

        for &recipient_id in recipients {
            let draft = MessageDraft {
                sender_id: caller.account_id,
                recipient_id,
                body: body.to_string(),
                subject: subject.map(str::to_string),
                reply_to_id: None,
                message_type: MessageType::Broadcast,
            };

            match deliver_with_retry(sink, &draft) {
                Ok(message) => report.sent.push(message),
                Err(e) => {
                    warn!("Broadcast {} leg to {} failed: {}", report.batch_key, recipient_id, e);
                    report.failed.push(FailedRecipient {
                        recipient_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Broadcast {} done: {} sent, {} failed",
            report.batch_key,
            report.sent.len(),
            report.failed.len()
        );
        report
    }
}

/// Transient storage errors get exactly one more attempt.
fn deliver_with_retry<S: MessageSink>(sink: &S, draft: &MessageDraft) -> CoreResult<Message> {
    match sink.deliver(draft) {
        Err(e) if e.is_transient() => {
            warn!("Retrying leg to {} after transient error: {}", draft.recipient_id, e);
            sink.deliver(draft)
        }
        other => other,
    }
}

fn ensure_can_broadcast(caller: &Caller) -> CoreResult<()> {
    if caller.role.can_broadcast() {
        Ok(())
    } else {
        Err(CoreError::authorization(format!(
            "role {} may not broadcast",
            caller.role
        )))
    }
}

fn ensure_body(body: &str) -> CoreResult<()> {
    if body.trim().is_empty() {
        return Err(CoreError::validation("message body must not be empty"));
    }
    Ok(())
}
