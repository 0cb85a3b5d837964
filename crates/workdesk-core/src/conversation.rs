//! Conversation identity.
//!
//! There is no conversation table. A direct conversation is the unordered
//! pair of its two participants, encoded as `dm:<low>:<high>`, and exists as
//! soon as one message carrying that key is stored.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use workdesk_types::models::Role;

const DIRECT_PREFIX: &str = "dm";
const BROADCAST_PREFIX: &str = "bc";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed conversation key '{0}'")]
pub struct MalformedKey(pub String);

/// Canonical key of a two-party conversation. Always stores the lower id first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    low: i64,
    high: i64,
}

impl ConversationKey {
    pub fn between(a: i64, b: i64) -> Self {
        Self {
            low: a.min(b),
            high: a.max(b),
        }
    }

    pub fn involves(&self, account_id: i64) -> bool {
        self.low == account_id || self.high == account_id
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", DIRECT_PREFIX, self.low, self.high)
    }
}

impl FromStr for ConversationKey {
    type Err = MalformedKey;

    /// Only canonical keys parse: `dm:3:1` is rejected rather than normalised,
    /// so a key string and its conversation stay one-to-one.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || MalformedKey(s.to_string());

        let mut parts = s.split(':');
        let (Some(prefix), Some(low), Some(high), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };
        if prefix != DIRECT_PREFIX {
            return Err(malformed());
        }

        let low: i64 = low.parse().map_err(|_| malformed())?;
        let high: i64 = high.parse().map_err(|_| malformed())?;
        if low >= high {
            return Err(malformed());
        }
        Ok(Self { low, high })
    }
}

/// Symmetric key for the conversation between `a` and `b`.
pub fn key_for(a: i64, b: i64) -> String {
    ConversationKey::between(a, b).to_string()
}

/// Label for one fan-out of `sender` to a role roster. Lives in its own
/// namespace and is never stored on a message row.
pub fn broadcast_key(sender: i64, role: Role) -> String {
    format!("{}:{}:{}", BROADCAST_PREFIX, sender, role)
}
