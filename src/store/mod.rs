//! Key-value JSON persistence. The engine's state is a handful of JSON
//! payloads under fixed keys; the store enforces no schema beyond valid
//! JSON and tracks an updated-at stamp per key.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::errors::{EngineError, EngineResult};
use crate::models::StoreStats;

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Fixed keys for the engine's persisted shapes.
pub mod keys {
    pub const CONFIG: &str = "config";
    pub const CLIENTS: &str = "clients";
    pub const STAGES: &str = "stages";
    pub const SALES: &str = "sale-records";
    pub const HISTORY: &str = "history";
    pub const ALERT_STATE: &str = "alert-state";
}

#[derive(Debug)]
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: &Path) -> EngineResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| EngineError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA_SQL)?;
        tracing::debug!(path = %path.display(), "store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Backing for tests and throwaway sessions; nothing survives drop.
    pub fn in_memory() -> EngineResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> EngineResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| EngineError::Storage("store mutex poisoned".to_string()))
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> EngineResult<Option<T>> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> EngineResult<()> {
        let json = serde_json::to_string(value)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, json, Utc::now().to_rfc3339()],
        )?;
        tracing::debug!(key, bytes = json.len(), "store write");
        Ok(())
    }

    pub fn remove(&self, key: &str) -> EngineResult<bool> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(removed > 0)
    }

    pub fn keys(&self) -> EngineResult<Vec<String>> {
        let conn = self.lock()?;
        let mut statement = conn.prepare("SELECT key FROM kv ORDER BY key")?;
        let rows = statement.query_map([], |row| row.get::<_, String>(0))?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn clear(&self) -> EngineResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM kv", [])?;
        tracing::info!("store cleared");
        Ok(())
    }

    /// Full dump as one JSON object keyed by store key, suitable for a
    /// user-facing backup file.
    pub fn export_all(&self) -> EngineResult<serde_json::Value> {
        let conn = self.lock()?;
        let mut statement = conn.prepare("SELECT key, value FROM kv ORDER BY key")?;
        let rows = statement.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut dump = serde_json::Map::new();
        for row in rows {
            let (key, json) = row?;
            dump.insert(key, serde_json::from_str(&json)?);
        }
        Ok(serde_json::Value::Object(dump))
    }

    /// Restores a dump produced by `export_all`. Existing keys are
    /// overwritten; keys absent from the dump are left alone.
    pub fn import_all(&self, dump: &serde_json::Value) -> EngineResult<u64> {
        let object = dump.as_object().ok_or_else(|| {
            EngineError::Serialization("import payload must be a JSON object".to_string())
        })?;

        let mut imported = 0u64;
        for (key, value) in object {
            self.set(key, value)?;
            imported += 1;
        }
        tracing::info!(imported, "store import finished");
        Ok(imported)
    }

    pub fn stats(&self) -> EngineResult<StoreStats> {
        let conn = self.lock()?;
        let (entries, total_bytes, last_updated): (u64, u64, Option<String>) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(LENGTH(value)), 0), MAX(updated_at) FROM kv",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let last_updated = match last_updated {
            Some(stamp) => Some(
                DateTime::parse_from_rfc3339(&stamp)
                    .map_err(|err| EngineError::Storage(err.to_string()))?
                    .with_timezone(&Utc),
            ),
            None => None,
        };

        Ok(StoreStats {
            entries,
            total_bytes,
            last_updated,
        })
    }
}
