use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (messages, notifications, accounts)");
        conn.execute_batch(
            "
            -- Mirror of the portal's account directory; owned by the portal.
            CREATE TABLE IF NOT EXISTS accounts (
                id          INTEGER PRIMARY KEY,
                email       TEXT NOT NULL UNIQUE,
                role        TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_accounts_role
                ON accounts(role);

            CREATE TABLE IF NOT EXISTS messages (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_key    TEXT NOT NULL,
                sender_id           INTEGER NOT NULL,
                recipient_id        INTEGER NOT NULL,
                subject             TEXT,
                body                TEXT NOT NULL CHECK (length(body) > 0),
                message_type        TEXT NOT NULL,
                is_read             INTEGER NOT NULL DEFAULT 0,
                read_at             TEXT,
                reply_to_id         INTEGER REFERENCES messages(id),
                created_at          TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_messages_conversation
                ON messages(conversation_key, created_at);

            CREATE INDEX IF NOT EXISTS idx_messages_unread
                ON messages(recipient_id, is_read);

            CREATE INDEX IF NOT EXISTS idx_messages_sender
                ON messages(sender_id);

            CREATE TABLE IF NOT EXISTS notifications (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                recipient_id    INTEGER NOT NULL,
                title           TEXT NOT NULL,
                message         TEXT NOT NULL,
                type            TEXT NOT NULL,
                is_read         INTEGER NOT NULL DEFAULT 0,
                link_to         TEXT,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_notifications_unread
                ON notifications(recipient_id, is_read);

            CREATE INDEX IF NOT EXISTS idx_notifications_created
                ON notifications(recipient_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (canonical account roles)");
        conn.execute_batch(
            "
            UPDATE accounts SET role = lower(role);
            UPDATE accounts SET role = 'director' WHERE role = 'admin';

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 2);
    }

    #[test]
    fn v2_rewrites_legacy_role_spellings() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE schema_version (version INTEGER NOT NULL);
             CREATE TABLE accounts (id INTEGER PRIMARY KEY, email TEXT NOT NULL UNIQUE, role TEXT NOT NULL);
             INSERT INTO schema_version (version) VALUES (1);
             INSERT INTO accounts VALUES (3, 'a@corp', 'admin'), (4, 'b@corp', 'Manager');",
        )
        .unwrap();
        run(&conn).unwrap();

        let roles: Vec<String> = conn
            .prepare("SELECT role FROM accounts ORDER BY id")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(roles, vec!["director", "manager"]);
    }
}
