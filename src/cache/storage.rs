//! Storage backends for the timestamped cache.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::Mutex;

/// A stored payload together with its write timestamp.
#[derive(Debug, Clone)]
pub struct StoredEntry {
  /// Serialized entry, opaque to the backend
  pub payload: String,
  /// When the entry was written (epoch milliseconds)
  pub timestamp_ms: i64,
}

/// Trait for cache storage backends.
///
/// Payloads are opaque serialized strings; the write timestamp rides
/// alongside so the store can order entries for eviction without
/// deserializing them. Metadata lives in a separate namespace.
pub trait StorageBackend: Send + Sync + 'static {
  /// Insert or replace an entry.
  fn put(&self, key: &str, payload: &str, timestamp_ms: i64) -> Result<()>;

  /// Fetch an entry by key.
  fn get(&self, key: &str) -> Result<Option<StoredEntry>>;

  /// Remove an entry. Removing a missing key is not an error.
  fn remove(&self, key: &str) -> Result<()>;

  /// Remove all entries. Metadata is left in place.
  fn clear(&self) -> Result<()>;

  /// All (key, timestamp) pairs, oldest first. Timestamp ties keep
  /// insertion order.
  fn entries(&self) -> Result<Vec<(String, i64)>>;

  /// Total serialized payload size across all entries.
  fn payload_bytes(&self) -> Result<u64>;

  /// Read a metadata value.
  fn meta_get(&self, key: &str) -> Result<Option<String>>;

  /// Write a metadata value.
  fn meta_set(&self, key: &str, value: &str) -> Result<()>;
}

// ============================================================================
// SQLite backend
// ============================================================================

/// SQLite-based storage backend.
pub struct SqliteBackend {
  conn: Mutex<Connection>,
}

impl SqliteBackend {
  /// Open or create the backing database at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// Open an in-memory database. Used by tests and volatile mode.
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let backend = Self {
      conn: Mutex::new(conn),
    };
    backend.run_migrations()?;
    Ok(backend)
  }

  /// Get the default database path.
  fn default_path() -> Result<std::path::PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("wallscout").join("cache.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    key TEXT PRIMARY KEY,
    payload TEXT NOT NULL,
    timestamp_ms INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_timestamp
    ON cache_entries(timestamp_ms);

CREATE TABLE IF NOT EXISTS cache_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

impl StorageBackend for SqliteBackend {
  fn put(&self, key: &str, payload: &str, timestamp_ms: i64) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO cache_entries (key, payload, timestamp_ms) VALUES (?, ?, ?)",
        params![key, payload, timestamp_ms],
      )
      .map_err(|e| eyre!("Failed to store cache entry: {}", e))?;

    Ok(())
  }

  fn get(&self, key: &str) -> Result<Option<StoredEntry>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row = conn
      .query_row(
        "SELECT payload, timestamp_ms FROM cache_entries WHERE key = ?",
        params![key],
        |row| {
          Ok(StoredEntry {
            payload: row.get(0)?,
            timestamp_ms: row.get(1)?,
          })
        },
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cache entry: {}", e))?;

    Ok(row)
  }

  fn remove(&self, key: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM cache_entries WHERE key = ?", params![key])
      .map_err(|e| eyre!("Failed to delete cache entry: {}", e))?;

    Ok(())
  }

  fn clear(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM cache_entries", [])
      .map_err(|e| eyre!("Failed to clear cache entries: {}", e))?;

    Ok(())
  }

  fn entries(&self) -> Result<Vec<(String, i64)>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT key, timestamp_ms FROM cache_entries ORDER BY timestamp_ms ASC, rowid ASC")
      .map_err(|e| eyre!("Failed to prepare entries query: {}", e))?;

    let rows = stmt
      .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
      .map_err(|e| eyre!("Failed to list cache entries: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(rows)
  }

  fn payload_bytes(&self) -> Result<u64> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let bytes: i64 = conn
      .query_row(
        "SELECT COALESCE(SUM(LENGTH(payload)), 0) FROM cache_entries",
        [],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to measure cache size: {}", e))?;

    Ok(bytes.max(0) as u64)
  }

  fn meta_get(&self, key: &str) -> Result<Option<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let value = conn
      .query_row(
        "SELECT value FROM cache_meta WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cache metadata: {}", e))?;

    Ok(value)
  }

  fn meta_set(&self, key: &str, value: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO cache_meta (key, value) VALUES (?, ?)",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to write cache metadata: {}", e))?;

    Ok(())
  }
}

// ============================================================================
// In-memory backend
// ============================================================================

#[derive(Default)]
struct MemoryInner {
  entries: HashMap<String, (String, i64, u64)>,
  meta: HashMap<String, String>,
  next_seq: u64,
}

/// In-memory storage backend. Nothing survives the process.
#[derive(Default)]
pub struct MemoryBackend {
  inner: Mutex<MemoryInner>,
}

impl MemoryBackend {
  pub fn new() -> Self {
    Self::default()
  }
}

impl StorageBackend for MemoryBackend {
  fn put(&self, key: &str, payload: &str, timestamp_ms: i64) -> Result<()> {
    let mut inner = self
      .inner
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let seq = inner.next_seq;
    inner.next_seq += 1;
    inner
      .entries
      .insert(key.to_string(), (payload.to_string(), timestamp_ms, seq));

    Ok(())
  }

  fn get(&self, key: &str) -> Result<Option<StoredEntry>> {
    let inner = self
      .inner
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    Ok(inner.entries.get(key).map(|(payload, ts, _)| StoredEntry {
      payload: payload.clone(),
      timestamp_ms: *ts,
    }))
  }

  fn remove(&self, key: &str) -> Result<()> {
    let mut inner = self
      .inner
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    inner.entries.remove(key);
    Ok(())
  }

  fn clear(&self) -> Result<()> {
    let mut inner = self
      .inner
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    inner.entries.clear();
    Ok(())
  }

  fn entries(&self) -> Result<Vec<(String, i64)>> {
    let inner = self
      .inner
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut rows: Vec<(String, i64, u64)> = inner
      .entries
      .iter()
      .map(|(key, (_, ts, seq))| (key.clone(), *ts, *seq))
      .collect();
    rows.sort_by_key(|(_, ts, seq)| (*ts, *seq));

    Ok(rows.into_iter().map(|(key, ts, _)| (key, ts)).collect())
  }

  fn payload_bytes(&self) -> Result<u64> {
    let inner = self
      .inner
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    Ok(
      inner
        .entries
        .values()
        .map(|(payload, _, _)| payload.len() as u64)
        .sum(),
    )
  }

  fn meta_get(&self, key: &str) -> Result<Option<String>> {
    let inner = self
      .inner
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    Ok(inner.meta.get(key).cloned())
  }

  fn meta_set(&self, key: &str, value: &str) -> Result<()> {
    let mut inner = self
      .inner
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    inner.meta.insert(key.to_string(), value.to_string());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn backends() -> Vec<Box<dyn StorageBackend>> {
    vec![
      Box::new(MemoryBackend::new()),
      Box::new(SqliteBackend::open_in_memory().unwrap()),
    ]
  }

  #[test]
  fn test_put_get_roundtrip() {
    for backend in backends() {
      backend.put("a", "payload-a", 100).unwrap();

      let entry = backend.get("a").unwrap().unwrap();
      assert_eq!(entry.payload, "payload-a");
      assert_eq!(entry.timestamp_ms, 100);
      assert!(backend.get("missing").unwrap().is_none());
    }
  }

  #[test]
  fn test_put_replaces_existing() {
    for backend in backends() {
      backend.put("a", "v1", 100).unwrap();
      backend.put("a", "v2", 200).unwrap();

      let entry = backend.get("a").unwrap().unwrap();
      assert_eq!(entry.payload, "v2");
      assert_eq!(entry.timestamp_ms, 200);
      assert_eq!(backend.entries().unwrap().len(), 1);
    }
  }

  #[test]
  fn test_entries_ordered_oldest_first() {
    for backend in backends() {
      backend.put("b", "x", 200).unwrap();
      backend.put("a", "x", 100).unwrap();
      backend.put("c", "x", 300).unwrap();

      let keys: Vec<String> = backend
        .entries()
        .unwrap()
        .into_iter()
        .map(|(k, _)| k)
        .collect();
      assert_eq!(keys, vec!["a", "b", "c"]);
    }
  }

  #[test]
  fn test_entries_tie_break_is_insertion_order() {
    for backend in backends() {
      backend.put("first", "x", 100).unwrap();
      backend.put("second", "x", 100).unwrap();
      backend.put("third", "x", 100).unwrap();

      let keys: Vec<String> = backend
        .entries()
        .unwrap()
        .into_iter()
        .map(|(k, _)| k)
        .collect();
      assert_eq!(keys, vec!["first", "second", "third"]);
    }
  }

  #[test]
  fn test_clear_keeps_meta() {
    for backend in backends() {
      backend.put("a", "x", 100).unwrap();
      backend.meta_set("version", "2").unwrap();

      backend.clear().unwrap();

      assert!(backend.entries().unwrap().is_empty());
      assert_eq!(backend.meta_get("version").unwrap().as_deref(), Some("2"));
    }
  }

  #[test]
  fn test_payload_bytes() {
    for backend in backends() {
      assert_eq!(backend.payload_bytes().unwrap(), 0);
      backend.put("a", "1234", 100).unwrap();
      backend.put("b", "12345678", 100).unwrap();
      assert_eq!(backend.payload_bytes().unwrap(), 12);
    }
  }
}
