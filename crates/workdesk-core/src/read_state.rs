use std::sync::Arc;

use tracing::debug;
use workdesk_db::Database;

use crate::error::CoreResult;
use crate::store::MessageStore;

/// Marks a caller's side of a conversation as read.
///
/// Read state is monotone: rows only move from unread to read, so repeated or
/// concurrent calls converge on the same state.
#[derive(Clone)]
pub struct ReadStateTracker {
    db: Arc<Database>,
    store: MessageStore,
}

impl ReadStateTracker {
    pub fn new(db: Arc<Database>, store: MessageStore) -> Self {
        Self { db, store }
    }

    /// Returns how many messages flipped to read. A second call returns 0.
    pub fn mark_conversation_read(&self, conversation_key: &str, account_id: i64) -> CoreResult<u32> {
        self.store.ensure_participant(conversation_key, account_id)?;

        let updated = self.db.mark_conversation_read(conversation_key, account_id)?;
        debug!("{} marked {} message(s) read in {}", account_id, updated, conversation_key);
        Ok(updated as u32)
    }
}
