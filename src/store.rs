//! Namespaced JSON key-value store over the workspace database.
//!
//! Every key is stored as `prefix + key` in `kv_entries`. Values are JSON
//! text; a stored value that does not parse as the requested type reads back
//! as absent.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_PREFIX: &str = "zames_";

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

pub struct KvStore {
    conn: Connection,
    prefix: String,
}

impl KvStore {
    pub fn new(conn: Connection, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        let text = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT INTO kv_entries(key, value, updated_at) VALUES(?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
               value = excluded.value,
               updated_at = excluded.updated_at",
            (self.full_key(key), text, Utc::now().to_rfc3339()),
        )?;
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?",
                [self.full_key(key)],
                |row| row.get(0),
            )
            .optional()?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                warn!(key, error = %e, "stored value is unreadable, treating as absent");
                Ok(None)
            }
        }
    }

    pub fn remove(&self, key: &str) -> StoreResult<()> {
        self.conn.execute(
            "DELETE FROM kv_entries WHERE key = ?",
            [self.full_key(key)],
        )?;
        Ok(())
    }

    /// Deletes every entry in this namespace; entries under other prefixes survive.
    pub fn clear(&self) -> StoreResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM kv_entries WHERE substr(key, 1, length(?1)) = ?1",
            [&self.prefix],
        )?;
        Ok(removed)
    }

    /// Keys in this namespace with the prefix stripped, sorted.
    pub fn keys(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT key FROM kv_entries WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
        )?;
        let keys = stmt
            .query_map([&self.prefix], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys
            .into_iter()
            .map(|k| k[self.prefix.len()..].to_string())
            .collect())
    }

    /// Runs `f` inside one immediate transaction. Any error rolls everything back.
    /// Not reentrant: `f` must not call `transaction` or `update` again.
    pub fn transaction<R>(&self, f: impl FnOnce(&Self) -> StoreResult<R>) -> StoreResult<R> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }

    /// Atomic read-modify-write of one key. Returns `None` without writing when
    /// the key is absent or unreadable.
    pub fn update<T, R>(&self, key: &str, f: impl FnOnce(&mut T) -> R) -> StoreResult<Option<R>>
    where
        T: Serialize + DeserializeOwned,
    {
        self.transaction(|store| {
            let Some(mut value) = store.get::<T>(key)? else {
                return Ok(None);
            };
            let out = f(&mut value);
            store.set(key, &value)?;
            Ok(Some(out))
        })
    }
}
