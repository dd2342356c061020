use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                user_id       TEXT PRIMARY KEY,
                email         TEXT UNIQUE,
                phone_number  TEXT UNIQUE,
                display_name  TEXT NOT NULL,
                push_token    TEXT
            );

            -- seq preserves join order within a conversation
            CREATE TABLE memberships (
                seq              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id          TEXT NOT NULL,
                conversation_id  TEXT NOT NULL,
                UNIQUE(user_id, conversation_id)
            );

            CREATE INDEX idx_memberships_conversation
                ON memberships(conversation_id, seq);

            -- timestamp is fixed-width RFC 3339 UTC, so text order is time order
            CREATE TABLE messages (
                conversation_id  TEXT NOT NULL,
                timestamp        TEXT NOT NULL,
                sender_id        TEXT NOT NULL,
                message          TEXT NOT NULL,
                PRIMARY KEY (conversation_id, timestamp)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
