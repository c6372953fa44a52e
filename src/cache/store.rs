//! Timestamped key-value store with TTL expiry and bounded-size eviction.

use chrono::Utc;
use color_eyre::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::storage::StorageBackend;

/// Bump when the serialized entry layout changes. A store opened with a
/// different persisted version is wiped rather than partially trusted.
pub const SCHEMA_VERSION: &str = "2";

const VERSION_META_KEY: &str = "version";
const LAST_UPDATE_META_KEY: &str = "last_update";

/// Entries dropped in one step when the backend rejects a write.
const WRITE_FAILURE_EVICTION_BATCH: usize = 5;

/// Serialized size above which the store reports itself unhealthy.
const HEALTHY_MAX_BYTES: u64 = 50 * 1024 * 1024;

const DEFAULT_MAX_AGE: Duration = Duration::from_secs(30 * 60);
const DEFAULT_MAX_ENTRIES: usize = 50;

/// Store counters for diagnostics.
#[derive(Debug, Clone)]
pub struct StoreStats {
  pub total_entries: usize,
  pub total_bytes: u64,
  /// Most recent write (epoch milliseconds), if any write happened
  pub last_update: Option<i64>,
  pub healthy: bool,
}

/// Key-value store that stamps every write and expires entries on read.
///
/// Expiry is lazy: an entry older than `max_age` is deleted the moment a
/// read sees it. Writes that push the store over `max_entries` trigger a
/// sweep that drops expired entries first, then the oldest until the cap
/// holds. Ordering is by write timestamp, not access time.
pub struct TimestampedStore<B: StorageBackend> {
  backend: Arc<B>,
  max_age: Duration,
  max_entries: usize,
}

impl<B: StorageBackend> TimestampedStore<B> {
  /// Create a store over the given backend, wiping it if the persisted
  /// schema version does not match.
  pub fn new(backend: B) -> Result<Self> {
    let store = Self {
      backend: Arc::new(backend),
      max_age: DEFAULT_MAX_AGE,
      max_entries: DEFAULT_MAX_ENTRIES,
    };

    match store.backend.meta_get(VERSION_META_KEY)? {
      Some(version) if version == SCHEMA_VERSION => {}
      Some(version) => {
        warn!(
          stored = %version,
          current = SCHEMA_VERSION,
          "cache schema version mismatch, clearing store"
        );
        store.backend.clear()?;
        store.backend.meta_set(VERSION_META_KEY, SCHEMA_VERSION)?;
      }
      None => {
        store.backend.meta_set(VERSION_META_KEY, SCHEMA_VERSION)?;
      }
    }

    Ok(store)
  }

  /// Set the maximum entry age before reads treat it as expired.
  pub fn with_max_age(mut self, max_age: Duration) -> Self {
    self.max_age = max_age;
    self
  }

  /// Set the entry-count cap that triggers eviction.
  pub fn with_max_entries(mut self, max_entries: usize) -> Self {
    self.max_entries = max_entries;
    self
  }

  pub fn max_age(&self) -> Duration {
    self.max_age
  }

  /// Write an entry, stamped with the current time.
  ///
  /// Backend write failures never surface: the store drops a batch of the
  /// oldest entries and retries once, and if the retry also fails the write
  /// is discarded with a warning.
  pub fn set(&self, key: &str, payload: &str) {
    let now = now_ms();

    if let Err(first) = self.backend.put(key, payload, now) {
      if let Err(evict_err) = self.evict_oldest(WRITE_FAILURE_EVICTION_BATCH) {
        warn!(error = %evict_err, "cache eviction after failed write also failed, dropping write");
        return;
      }
      if let Err(second) = self.backend.put(key, payload, now) {
        warn!(error = %first, retry_error = %second, "cache write failed twice, dropping write");
        return;
      }
    }

    if let Err(err) = self.backend.meta_set(LAST_UPDATE_META_KEY, &now.to_string()) {
      warn!(error = %err, "failed to record cache last-update timestamp");
    }
    if let Err(err) = self.sweep() {
      warn!(error = %err, "cache eviction sweep failed");
    }
  }

  /// Read an entry, deleting and missing it if it has outlived `max_age`.
  pub fn get(&self, key: &str) -> Result<Option<String>> {
    let entry = match self.backend.get(key)? {
      Some(entry) => entry,
      None => return Ok(None),
    };

    if self.is_expired(entry.timestamp_ms) {
      self.backend.remove(key)?;
      return Ok(None);
    }

    Ok(Some(entry.payload))
  }

  /// Read an entry even if it has expired. Last-resort fallback reads.
  pub fn get_ignoring_age(&self, key: &str) -> Result<Option<String>> {
    Ok(self.backend.get(key)?.map(|entry| entry.payload))
  }

  pub fn remove(&self, key: &str) -> Result<()> {
    self.backend.remove(key)
  }

  pub fn clear(&self) -> Result<()> {
    self.backend.clear()
  }

  /// All (key, timestamp) pairs, oldest first.
  pub fn entries(&self) -> Result<Vec<(String, i64)>> {
    self.backend.entries()
  }

  pub fn is_expired(&self, timestamp_ms: i64) -> bool {
    let age_ms = now_ms().saturating_sub(timestamp_ms);
    age_ms > self.max_age.as_millis() as i64
  }

  pub fn stats(&self) -> Result<StoreStats> {
    let entries = self.backend.entries()?;
    let total_bytes = self.backend.payload_bytes()?;
    let last_update = self
      .backend
      .meta_get(LAST_UPDATE_META_KEY)?
      .and_then(|v| v.parse::<i64>().ok());

    Ok(StoreStats {
      total_entries: entries.len(),
      total_bytes,
      last_update,
      healthy: entries.len() <= self.max_entries && total_bytes <= HEALTHY_MAX_BYTES,
    })
  }

  /// Drop expired entries, then the oldest, until the cap holds.
  fn sweep(&self) -> Result<()> {
    let entries = self.backend.entries()?;
    if entries.len() <= self.max_entries {
      return Ok(());
    }

    let mut remaining = entries.len();
    let mut survivors: Vec<(String, i64)> = Vec::with_capacity(remaining);
    for (key, ts) in entries {
      if self.is_expired(ts) {
        self.backend.remove(&key)?;
        remaining -= 1;
      } else {
        survivors.push((key, ts));
      }
    }

    // survivors are still oldest-first
    for (key, _) in survivors {
      if remaining <= self.max_entries {
        break;
      }
      self.backend.remove(&key)?;
      remaining -= 1;
    }

    Ok(())
  }

  fn evict_oldest(&self, count: usize) -> Result<()> {
    let entries = self.backend.entries()?;
    for (key, _) in entries.into_iter().take(count) {
      self.backend.remove(&key)?;
    }
    Ok(())
  }
}

impl<B: StorageBackend> Clone for TimestampedStore<B> {
  fn clone(&self) -> Self {
    Self {
      backend: Arc::clone(&self.backend),
      max_age: self.max_age,
      max_entries: self.max_entries,
    }
  }
}

fn now_ms() -> i64 {
  Utc::now().timestamp_millis()
}
