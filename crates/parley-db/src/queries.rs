use crate::models::{MessageRow, UserRow, timestamp_key};
use crate::Database;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode};

use parley_core::UniqueField;
use parley_types::models::{Message, User};

const USER_COLUMNS: &str = "user_id, email, phone_number, display_name, push_token";

impl Database {
    // -- Users --

    /// Returns the conflicting column when the row collides with an
    /// existing user id, email or phone number; `None` once inserted.
    pub fn insert_user(&self, user: &User) -> Result<Option<UniqueField>> {
        self.with_conn(|conn| {
            let res = conn.execute(
                "INSERT INTO users (user_id, email, phone_number, display_name, push_token)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    user.user_id,
                    user.email,
                    user.phone_number,
                    user.display_name,
                    user.push_token
                ],
            );

            match res {
                Ok(_) => Ok(None),
                Err(rusqlite::Error::SqliteFailure(e, msg))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Ok(Some(conflicting_column(msg.as_deref())))
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn update_user(&self, user: &User) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET display_name = ?2, push_token = ?3 WHERE user_id = ?1",
                rusqlite::params![user.user_id, user.display_name, user.push_token],
            )?;
            Ok(())
        })
    }

    pub fn delete_user(&self, user_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM users WHERE user_id = ?1", [user_id])?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, user_id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "user_id", user_id))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_phone(&self, phone_number: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "phone_number", phone_number))
    }

    // -- Memberships --

    /// Re-adding an existing member is a no-op and keeps the original order.
    pub fn insert_membership(&self, user_id: &str, conversation_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO memberships (user_id, conversation_id) VALUES (?1, ?2)",
                (user_id, conversation_id),
            )?;
            Ok(())
        })
    }

    pub fn delete_membership(&self, user_id: &str, conversation_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM memberships WHERE user_id = ?1 AND conversation_id = ?2",
                (user_id, conversation_id),
            )?;
            Ok(())
        })
    }

    pub fn get_conversation_ids(&self, user_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            query_strings(
                conn,
                "SELECT conversation_id FROM memberships WHERE user_id = ?1 ORDER BY seq",
                user_id,
            )
        })
    }

    pub fn get_member_ids(&self, conversation_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            query_strings(
                conn,
                "SELECT user_id FROM memberships WHERE conversation_id = ?1 ORDER BY seq",
                conversation_id,
            )
        })
    }

    // -- Messages --

    /// Same (conversation, timestamp) key replaces the earlier row.
    pub fn insert_message(&self, message: &Message) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO messages (conversation_id, timestamp, sender_id, message)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    message.conversation_id,
                    timestamp_key(&message.timestamp),
                    message.sender_id,
                    message.message
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_messages(
        &self,
        conversation_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<MessageRow>> {
        // An empty lower bound sorts before every stored timestamp.
        let after = since.as_ref().map(timestamp_key).unwrap_or_default();
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT conversation_id, timestamp, sender_id, message
                 FROM messages
                 WHERE conversation_id = ?1 AND timestamp > ?2
                 ORDER BY timestamp ASC",
            )?;

            let rows = stmt
                .query_map((conversation_id, &after), |row| {
                    Ok(MessageRow {
                        conversation_id: row.get(0)?,
                        timestamp: row.get(1)?,
                        sender_id: row.get(2)?,
                        message: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

/// SQLite reports e.g. "UNIQUE constraint failed: users.email".
fn conflicting_column(msg: Option<&str>) -> UniqueField {
    match msg {
        Some(m) if m.contains("users.email") => UniqueField::Email,
        Some(m) if m.contains("users.phone_number") => UniqueField::PhoneNumber,
        _ => UniqueField::UserId,
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users WHERE {} = ?1",
        USER_COLUMNS, column
    ))?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                user_id: row.get(0)?,
                email: row.get(1)?,
                phone_number: row.get(2)?,
                display_name: row.get(3)?,
                push_token: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_strings(conn: &Connection, sql: &str, key: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([key], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(rows)
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
