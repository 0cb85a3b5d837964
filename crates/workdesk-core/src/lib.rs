//! Messaging and notification core of the Workdesk portal.
//!
//! Every operation takes the acting [`Caller`] explicitly; nothing here looks
//! up an ambient session.

pub mod conversation;
pub mod directory;
pub mod error;
pub mod fanout;
pub mod messenger;
pub mod notifications;
pub mod read_state;
pub mod store;

use workdesk_types::models::Role;

pub use error::{CoreError, CoreResult};
pub use messenger::{Messenger, SendOutcome};

/// Verified identity of the account performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub account_id: i64,
    pub role: Role,
}

impl Caller {
    pub fn new(account_id: i64, role: Role) -> Self {
        Self { account_id, role }
    }
}
