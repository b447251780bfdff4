// src/store/store.rs — SQLite operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashSet;

/// Setting keys understood by the engine. Values are stored as strings and
/// parsed with defaults when absent.
pub mod keys {
    pub const TARGET_PROFILE: &str = "target_profile";
    pub const DAILY_FOLLOW_LIMIT: &str = "daily_follow_limit";
    pub const UNFOLLOW_DELAY: &str = "unfollow_delay";
    pub const FILTER_ACTIVE: &str = "filter_active";
    pub const BOT_ACTIVE: &str = "bot_active";
    pub const CURSOR: &str = "cursor";
}

/// Ledger entry: an account this system currently follows.
#[derive(Debug, Clone, Serialize)]
pub struct FollowedUser {
    pub user_id: String,
    pub screen_name: String,
    pub followed_date: DateTime<Utc>,
    pub followed_back: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct WhitelistedUser {
    pub user_id: String,
    pub screen_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub id: i64,
    pub timestamp: String,
    pub message: String,
}

/// Low-level SQLite operations for all data types.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // -- Settings --

    pub fn get_setting(&self, key: &str) -> anyhow::Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Atomic read-modify-write: a single UPSERT, so concurrent cursor
    /// updates cannot lose writes.
    pub fn set_setting(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    // -- Ledger --

    /// Insert a ledger entry. `user_id` is unique: inserting an id that is
    /// already ledgered is a no-op. Returns whether a row was inserted.
    pub fn insert_followed(&self, user_id: &str, screen_name: &str) -> anyhow::Result<bool> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO followed_users (user_id, screen_name, followed_date, followed_back)
             VALUES (?1, ?2, ?3, 0)",
            params![user_id, screen_name, now],
        )?;
        Ok(changed > 0)
    }

    pub fn delete_followed(&self, user_id: &str) -> anyhow::Result<bool> {
        let changed = self.conn.execute(
            "DELETE FROM followed_users WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(changed > 0)
    }

    pub fn set_followed_back(&self, user_id: &str, followed_back: bool) -> anyhow::Result<()> {
        self.conn.execute(
            "UPDATE followed_users SET followed_back = ?1 WHERE user_id = ?2",
            params![followed_back as i64, user_id],
        )?;
        Ok(())
    }

    pub fn get_followed(&self, user_id: &str) -> anyhow::Result<Option<FollowedUser>> {
        let row = self
            .conn
            .query_row(
                "SELECT user_id, screen_name, followed_date, followed_back
                 FROM followed_users WHERE user_id = ?1",
                params![user_id],
                row_to_followed,
            )
            .optional()?;
        Ok(row)
    }

    pub fn ledger_ids(&self) -> anyhow::Result<HashSet<String>> {
        let mut stmt = self.conn.prepare("SELECT user_id FROM followed_users")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut ids = HashSet::new();
        for row in rows {
            ids.insert(row?);
        }
        Ok(ids)
    }

    /// Ledger entries with `followed_date` strictly before the cutoff.
    /// Dates are stored as RFC 3339 UTC, so string comparison orders them.
    pub fn followed_before(&self, cutoff: DateTime<Utc>) -> anyhow::Result<Vec<FollowedUser>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, screen_name, followed_date, followed_back
             FROM followed_users WHERE followed_date < ?1
             ORDER BY followed_date ASC",
        )?;
        let rows = stmt.query_map(params![cutoff.to_rfc3339()], row_to_followed)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn count_followed(&self) -> anyhow::Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM followed_users", [], |r| r.get(0))?;
        Ok(count)
    }

    // -- Whitelist --

    pub fn insert_whitelisted(&self, user_id: &str, screen_name: &str) -> anyhow::Result<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO whitelist (user_id, screen_name) VALUES (?1, ?2)",
            params![user_id, screen_name],
        )?;
        Ok(changed > 0)
    }

    /// Remove a whitelist entry, returning the screen name of the removed
    /// row if it existed.
    pub fn remove_whitelisted(&self, user_id: &str) -> anyhow::Result<Option<String>> {
        let screen_name: Option<String> = self
            .conn
            .query_row(
                "SELECT screen_name FROM whitelist WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;

        if screen_name.is_some() {
            self.conn.execute(
                "DELETE FROM whitelist WHERE user_id = ?1",
                params![user_id],
            )?;
        }
        Ok(screen_name)
    }

    pub fn whitelist(&self) -> anyhow::Result<Vec<WhitelistedUser>> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_id, screen_name FROM whitelist ORDER BY screen_name ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(WhitelistedUser {
                user_id: row.get(0)?,
                screen_name: row.get(1)?,
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    // -- Audit log --

    /// Append-only: the engine never mutates or deletes log rows.
    pub fn append_log(&self, message: &str) -> anyhow::Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO logs (timestamp, message) VALUES (?1, ?2)",
            params![now, message],
        )?;
        Ok(())
    }

    pub fn recent_logs(&self, limit: u32) -> anyhow::Result<Vec<LogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, message FROM logs ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(LogEntry {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                message: row.get(2)?,
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

fn row_to_followed(row: &rusqlite::Row<'_>) -> rusqlite::Result<FollowedUser> {
    let date: String = row.get(2)?;
    let followed_date = DateTime::parse_from_rfc3339(&date)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;
    Ok(FollowedUser {
        user_id: row.get(0)?,
        screen_name: row.get(1)?,
        followed_date,
        followed_back: row.get::<_, i64>(3)? != 0,
    })
}
