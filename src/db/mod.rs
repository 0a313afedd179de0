pub mod schema;
pub mod migrations;

use crate::error::AppError;
use log::warn;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &PathBuf) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Read one stored value. Absent entries read as `None`; an entry that no
/// longer decodes is discarded with a warning rather than surfaced as an
/// error, so a damaged store heals on the next write.
pub fn get_value<T: DeserializeOwned>(conn: &Connection, key: &str) -> Result<Option<T>, AppError> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
        .optional()?;

    match raw {
        None => Ok(None),
        Some(text) => match serde_json::from_str(&text) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Discarding undecodable value for key '{}': {}", key, e);
                Ok(None)
            }
        },
    }
}

pub fn set_value<T: Serialize>(conn: &Connection, key: &str, value: &T) -> Result<(), AppError> {
    let text = serde_json::to_string(value)?;
    conn.execute(
        "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
        params![key, text],
    )?;
    Ok(())
}

/// Write several entries with a single multi-row upsert so they land
/// atomically.
pub fn set_many(conn: &Connection, entries: &[(&str, String)]) -> Result<(), AppError> {
    if entries.is_empty() {
        return Ok(());
    }

    let placeholders: Vec<&str> = entries.iter().map(|_| "(?, ?)").collect();
    let sql = format!(
        "INSERT OR REPLACE INTO kv (key, value) VALUES {}",
        placeholders.join(", ")
    );

    let mut bindings: Vec<&str> = Vec::with_capacity(entries.len() * 2);
    for (key, value) in entries {
        bindings.push(*key);
        bindings.push(value.as_str());
    }

    conn.execute(&sql, rusqlite::params_from_iter(bindings))?;
    Ok(())
}
