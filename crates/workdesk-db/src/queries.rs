use crate::models::{
    AccountRow, ConversationRow, MessageRow, NewMessage, NewNotification, NotificationRow,
};
use crate::{Database, format_timestamp};
use anyhow::{Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, Row, Transaction, TransactionBehavior};
use tracing::debug;
use workdesk_types::models::Role;

const MESSAGE_COLUMNS: &str = "id, conversation_key, sender_id, recipient_id, subject, body, \
     message_type, is_read, read_at, reply_to_id, created_at";

const NOTIFICATION_COLUMNS: &str =
    "id, recipient_id, title, message, type, is_read, link_to, created_at";

impl Database {
    // -- Accounts --

    /// Roles are stored in canonical spelling (`admin` becomes `director`) so
    /// roster lookups by role see every member.
    pub fn upsert_account(&self, id: i64, email: &str, role: &str) -> Result<()> {
        let role: Role = role
            .parse()
            .map_err(|e| anyhow!("Cannot store account {}: {}", id, e))?;
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO accounts (id, email, role) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET email = excluded.email, role = excluded.role",
                rusqlite::params![id, email, role.as_str()],
            )?;
            Ok(())
        })
    }

    pub fn get_account(&self, id: i64) -> Result<Option<AccountRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, email, role FROM accounts WHERE id = ?1",
                [id],
                account_from_row,
            )
            .optional()
        })
    }

    pub fn get_accounts_by_role(&self, role: &str) -> Result<Vec<AccountRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, email, role FROM accounts WHERE role = ?1 ORDER BY id")?;
            let rows = stmt
                .query_map([role], account_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Messages --

    /// Insert one message, and optionally its recipient notification, in a
    /// single write transaction.
    ///
    /// `created_at` never goes backwards within a conversation: if the clock
    /// reads earlier than the latest stored message, the latest timestamp is
    /// reused and `id` breaks the tie.
    pub fn insert_message(
        &self,
        message: &NewMessage<'_>,
        notification: Option<&NewNotification<'_>>,
    ) -> Result<MessageRow> {
        self.with_conn_mut(|conn| {
            let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

            let latest: Option<String> = tx.query_row(
                "SELECT MAX(created_at) FROM messages WHERE conversation_key = ?1",
                [message.conversation_key],
                |row| row.get(0),
            )?;
            let mut created_at = format_timestamp(Utc::now());
            if let Some(latest) = latest {
                if latest > created_at {
                    created_at = latest;
                }
            }

            tx.execute(
                "INSERT INTO messages (conversation_key, sender_id, recipient_id, subject, body,
                                       message_type, reply_to_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    message.conversation_key,
                    message.sender_id,
                    message.recipient_id,
                    message.subject,
                    message.body,
                    message.message_type,
                    message.reply_to_id,
                    created_at,
                ],
            )?;
            let id = tx.last_insert_rowid();

            if let Some(n) = notification {
                insert_notification_row(&tx, n, &created_at)?;
            }

            let row = query_message(&tx, id)?
                .ok_or_else(|| anyhow!("Message {} vanished inside its own transaction", id))?;
            tx.commit()?;

            debug!(
                "Stored message {} in {} ({} -> {})",
                id, message.conversation_key, message.sender_id, message.recipient_id
            );
            Ok(row)
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// All messages of a conversation in canonical thread order.
    pub fn get_conversation_messages(&self, conversation_key: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE conversation_key = ?1
                 ORDER BY created_at ASC, id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([conversation_key], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_conversation_messages(&self, conversation_key: &str) -> Result<u32> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE conversation_key = ?1",
                [conversation_key],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Latest message and unread count for every conversation the account is
    /// part of, most recently active first.
    pub fn get_conversations_for(&self, account_id: i64) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "WITH ranked AS (
                    SELECT {MESSAGE_COLUMNS},
                           ROW_NUMBER() OVER (
                               PARTITION BY conversation_key
                               ORDER BY created_at DESC, id DESC
                           ) AS rn,
                           SUM(CASE WHEN recipient_id = ?1 AND is_read = 0 THEN 1 ELSE 0 END) OVER (
                               PARTITION BY conversation_key
                           ) AS unread
                    FROM messages
                    WHERE sender_id = ?1 OR recipient_id = ?1
                 )
                 SELECT {MESSAGE_COLUMNS}, unread FROM ranked
                 WHERE rn = 1
                 ORDER BY created_at DESC, id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([account_id], |row| {
                    Ok(ConversationRow {
                        last: message_from_row(row)?,
                        unread_count: row.get(11)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Guarded bulk update: only rows still unread flip, so concurrent callers
    /// converge on the same state and a repeat call updates nothing.
    pub fn mark_conversation_read(&self, conversation_key: &str, account_id: i64) -> Result<usize> {
        let now = format_timestamp(Utc::now());
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE messages SET is_read = 1, read_at = ?3
                 WHERE conversation_key = ?1 AND recipient_id = ?2 AND is_read = 0",
                rusqlite::params![conversation_key, account_id, now],
            )?;
            Ok(updated)
        })
    }

    pub fn count_unread_messages(&self, account_id: i64) -> Result<u32> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE recipient_id = ?1 AND is_read = 0",
                [account_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    // -- Notifications --

    pub fn insert_notification(&self, notification: &NewNotification<'_>) -> Result<NotificationRow> {
        let created_at = format_timestamp(Utc::now());
        self.with_conn_mut(|conn| {
            let id = insert_notification_row(conn, notification, &created_at)?;
            query_notification(conn, id)?
                .ok_or_else(|| anyhow!("Notification {} missing after insert", id))
        })
    }

    pub fn get_notification(&self, id: i64) -> Result<Option<NotificationRow>> {
        self.with_conn(|conn| query_notification(conn, id))
    }

    /// Newest first. `kind` and `is_read` narrow the result when given.
    pub fn get_notifications(
        &self,
        recipient_id: i64,
        kind: Option<&str>,
        is_read: Option<bool>,
    ) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                 WHERE recipient_id = ?1
                   AND (?2 IS NULL OR type = ?2)
                   AND (?3 IS NULL OR is_read = ?3)
                 ORDER BY created_at DESC, id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![recipient_id, kind, is_read], notification_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn mark_notification_read(&self, id: i64, recipient_id: i64) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE notifications SET is_read = 1
                 WHERE id = ?1 AND recipient_id = ?2 AND is_read = 0",
                rusqlite::params![id, recipient_id],
            )?;
            Ok(updated)
        })
    }

    pub fn mark_all_notifications_read(&self, recipient_id: i64) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE notifications SET is_read = 1 WHERE recipient_id = ?1 AND is_read = 0",
                [recipient_id],
            )?;
            Ok(updated)
        })
    }

    pub fn count_unread_notifications(&self, recipient_id: i64) -> Result<u32> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND is_read = 0",
                [recipient_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }
}

fn insert_notification_row(
    conn: &Connection,
    n: &NewNotification<'_>,
    created_at: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO notifications (recipient_id, title, message, type, link_to, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![n.recipient_id, n.title, n.message, n.kind, n.link_to, created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

fn query_message(conn: &Connection, id: i64) -> Result<Option<MessageRow>> {
    let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1");
    conn.query_row(&sql, [id], message_from_row).optional()
}

fn query_notification(conn: &Connection, id: i64) -> Result<Option<NotificationRow>> {
    let sql = format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1");
    conn.query_row(&sql, [id], notification_from_row).optional()
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<AccountRow> {
    Ok(AccountRow {
        id: row.get(0)?,
        email: row.get(1)?,
        role: row.get(2)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_key: row.get(1)?,
        sender_id: row.get(2)?,
        recipient_id: row.get(3)?,
        subject: row.get(4)?,
        body: row.get(5)?,
        message_type: row.get(6)?,
        is_read: row.get(7)?,
        read_at: row.get(8)?,
        reply_to_id: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        recipient_id: row.get(1)?,
        title: row.get(2)?,
        message: row.get(3)?,
        kind: row.get(4)?,
        is_read: row.get(5)?,
        link_to: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
