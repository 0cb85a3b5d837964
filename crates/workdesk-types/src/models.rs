use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Portal role. `admin` is the legacy spelling of `director`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "admin")]
    Director,
    Manager,
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Director => "director",
            Self::Manager => "manager",
            Self::Employee => "employee",
        }
    }

    /// Roles allowed to address a whole role roster at once.
    pub fn can_broadcast(&self) -> bool {
        matches!(self, Self::Director | Self::Manager)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "director" | "admin" => Ok(Self::Director),
            "manager" => Ok(Self::Manager),
            "employee" => Ok(Self::Employee),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

/// Returned when a stored or requested enum value is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown variant '{}'", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

/// An account as supplied by the portal's account directory.
/// Read-only from the messaging core's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Direct,
    Broadcast,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "DIRECT",
            Self::Broadcast => "BROADCAST",
        }
    }
}

impl FromStr for MessageType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DIRECT" => Ok(Self::Direct),
            "BROADCAST" => Ok(Self::Broadcast),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

/// A single persisted message. Broadcasts are stored as one row per recipient,
/// so `recipient_id` is always concrete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_key: String,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub subject: Option<String>,
    pub body: String,
    pub message_type: MessageType,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub reply_to_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Serialised upper-case; parsed case-insensitively from JSON, query strings
/// and stored rows alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum NotificationType {
    Info,
    Warning,
    Critical,
    Message,
    Approval,
    Leave,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
            Self::Message => "MESSAGE",
            Self::Approval => "APPROVAL",
            Self::Leave => "LEAVE",
        }
    }
}

impl FromStr for NotificationType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INFO" => Ok(Self::Info),
            "WARNING" => Ok(Self::Warning),
            "CRITICAL" => Ok(Self::Critical),
            "MESSAGE" => Ok(Self::Message),
            "APPROVAL" => Ok(Self::Approval),
            "LEAVE" => Ok(Self::Leave),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

impl TryFrom<String> for NotificationType {
    type Error = UnknownVariant;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub recipient_id: i64,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub link_to: Option<String>,
}

/// One row of a caller's inbox: a derived conversation and its latest activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation_key: String,
    pub other_participant: i64,
    pub last_message: Message,
    pub last_message_time: DateTime<Utc>,
    pub unread_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_is_an_alias_for_director() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Director);
        assert_eq!("Director".parse::<Role>().unwrap(), Role::Director);
        let parsed: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(parsed, Role::Director);
        assert_eq!(serde_json::to_string(&Role::Director).unwrap(), "\"director\"");
    }

    #[test]
    fn only_managers_and_directors_broadcast() {
        assert!(Role::Director.can_broadcast());
        assert!(Role::Manager.can_broadcast());
        assert!(!Role::Employee.can_broadcast());
    }

    #[test]
    fn notification_type_uses_wire_spelling() {
        assert_eq!(serde_json::to_string(&NotificationType::Message).unwrap(), "\"MESSAGE\"");
        assert_eq!("leave".parse::<NotificationType>().unwrap(), NotificationType::Leave);
        assert!("PUSH".parse::<NotificationType>().is_err());

        let parsed: NotificationType = serde_json::from_str("\"leave\"").unwrap();
        assert_eq!(parsed, NotificationType::Leave);
        assert!(serde_json::from_str::<NotificationType>("\"push\"").is_err());
    }
}
