//! Search-result caching: deterministic query keys and the paginated
//! entry cache.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::warn;

use crate::cache::{QueryKey, StorageBackend, StoreStats, TimestampedStore};

use super::types::{Category, SearchParams, Sorting, Wallpaper};

/// Items kept per entry when writing fresh results.
const DEFAULT_MAX_ITEMS_PER_ENTRY: usize = 200;

/// Cache key for one page of search results.
#[derive(Debug, Clone)]
pub struct SearchKey {
  query: String,
  category: Category,
  sorting: Sorting,
  page: u32,
}

impl SearchKey {
  pub fn new(params: &SearchParams, page: u32) -> Self {
    Self {
      query: params.query.clone(),
      category: params.category,
      sorting: params.sorting,
      page,
    }
  }
}

impl QueryKey for SearchKey {
  fn cache_hash(&self) -> String {
    // Stable field order; queries differing only in case or surrounding
    // whitespace must collapse to the same key.
    let input = format!(
      "search:{}:{}:{}:{}",
      normalize_query(&self.query),
      self.category.as_str(),
      self.sorting.as_str(),
      self.page
    );

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  fn description(&self) -> String {
    format!(
      "search \"{}\" ({}, {}, page {})",
      self.query,
      self.category.as_str(),
      self.sorting.as_str(),
      self.page
    )
  }
}

/// Normalize a query for consistent hashing.
fn normalize_query(query: &str) -> String {
  query.trim().to_lowercase()
}

/// One cached page of search results.
///
/// The page-1 entry doubles as the accumulator for "load more": appended
/// pages are folded into it so readers of page 1 always see everything
/// loaded so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchEntry {
  pub data: Vec<Wallpaper>,
  /// Creation or last-refresh time (epoch milliseconds)
  pub timestamp: i64,
  /// Total items the remote source reports for this query
  pub total_count: u64,
  pub query: String,
  pub category: Category,
  pub sorting: Sorting,
  pub page: u32,
  pub has_next_page: bool,
}

impl SearchEntry {
  /// Elapsed time since this entry was written.
  pub fn age(&self) -> Duration {
    let ms = now_ms().saturating_sub(self.timestamp).max(0);
    Duration::from_millis(ms as u64)
  }
}

/// Domain wrapper over the timestamped store, specific to paginated
/// wallpaper searches.
pub struct SearchCache<B: StorageBackend> {
  store: TimestampedStore<B>,
  max_items_per_entry: usize,
}

impl<B: StorageBackend> SearchCache<B> {
  pub fn new(store: TimestampedStore<B>) -> Self {
    Self {
      store,
      max_items_per_entry: DEFAULT_MAX_ITEMS_PER_ENTRY,
    }
  }

  pub fn with_max_items(mut self, max_items_per_entry: usize) -> Self {
    self.max_items_per_entry = max_items_per_entry;
    self
  }

  /// Look up a cached page. Misses, expired entries, and undecodable
  /// payloads all come back as `None`.
  pub fn get(&self, params: &SearchParams, page: u32) -> Option<SearchEntry> {
    let key = SearchKey::new(params, page);
    match self.store.get(&key.cache_hash()) {
      Ok(Some(payload)) => self.decode(&key, &payload),
      Ok(None) => None,
      Err(err) => {
        warn!(error = %err, key = %key.description(), "cache read failed");
        None
      }
    }
  }

  /// Look up a cached page even if it has expired. Stale-fallback reads.
  pub fn get_ignoring_age(&self, params: &SearchParams, page: u32) -> Option<SearchEntry> {
    let key = SearchKey::new(params, page);
    match self.store.get_ignoring_age(&key.cache_hash()) {
      Ok(Some(payload)) => self.decode(&key, &payload),
      Ok(None) => None,
      Err(err) => {
        warn!(error = %err, key = %key.description(), "cache read failed");
        None
      }
    }
  }

  /// Write a page of results, bounded to the per-entry item cap.
  pub fn set(
    &self,
    params: &SearchParams,
    page: u32,
    mut data: Vec<Wallpaper>,
    total_count: u64,
    has_next_page: bool,
  ) {
    data.truncate(self.max_items_per_entry);

    let entry = SearchEntry {
      data,
      timestamp: now_ms(),
      total_count,
      query: params.query.clone(),
      category: params.category,
      sorting: params.sorting,
      page,
      has_next_page,
    };

    self.write(SearchKey::new(params, page), &entry);
  }

  /// Fold a freshly loaded page into the cache.
  ///
  /// For pages beyond the first, the new items are concatenated onto the
  /// page-1 entry when one exists, so the page-1 key always answers with
  /// everything loaded so far. Without a page-1 entry this degrades to a
  /// plain `set` for the fetched page.
  pub fn append(
    &self,
    params: &SearchParams,
    page: u32,
    new_data: Vec<Wallpaper>,
    total_count: u64,
    has_next_page: bool,
  ) {
    if page <= 1 {
      self.set(params, page, new_data, total_count, has_next_page);
      return;
    }

    match self.get(params, 1) {
      Some(mut first) => {
        first.data.extend(new_data);
        first.total_count = total_count;
        first.has_next_page = has_next_page;
        first.timestamp = now_ms();
        self.write(SearchKey::new(params, 1), &first);
      }
      None => self.set(params, page, new_data, total_count, has_next_page),
    }
  }

  /// Newest non-expired entry across all cached searches. Used to seed
  /// the display before any network call.
  pub fn get_recent(&self) -> Option<SearchEntry> {
    let entries = match self.store.entries() {
      Ok(entries) => entries,
      Err(err) => {
        warn!(error = %err, "cache scan failed");
        return None;
      }
    };

    // entries are oldest-first; walk from the newest end
    for (key, _) in entries.into_iter().rev() {
      match self.store.get(&key) {
        Ok(Some(payload)) => match serde_json::from_str(&payload) {
          Ok(entry) => return Some(entry),
          Err(_) => {
            let _ = self.store.remove(&key);
          }
        },
        Ok(None) => {} // expired under us
        Err(err) => {
          warn!(error = %err, "cache read failed during scan");
        }
      }
    }

    None
  }

  /// TTL the underlying store applies on expiring reads.
  pub fn max_age(&self) -> Duration {
    self.store.max_age()
  }

  pub fn stats(&self) -> color_eyre::Result<StoreStats> {
    self.store.stats()
  }

  pub fn clear(&self) -> color_eyre::Result<()> {
    self.store.clear()
  }

  fn write(&self, key: SearchKey, entry: &SearchEntry) {
    match serde_json::to_string(entry) {
      Ok(payload) => self.store.set(&key.cache_hash(), &payload),
      Err(err) => warn!(error = %err, key = %key.description(), "failed to serialize cache entry"),
    }
  }

  /// Decode a payload; an undecodable entry is removed and treated as a miss.
  fn decode(&self, key: &SearchKey, payload: &str) -> Option<SearchEntry> {
    match serde_json::from_str(payload) {
      Ok(entry) => Some(entry),
      Err(err) => {
        warn!(error = %err, key = %key.description(), "malformed cache entry, dropping");
        let _ = self.store.remove(&key.cache_hash());
        None
      }
    }
  }
}

impl<B: StorageBackend> Clone for SearchCache<B> {
  fn clone(&self) -> Self {
    Self {
      store: self.store.clone(),
      max_items_per_entry: self.max_items_per_entry,
    }
  }
}

fn now_ms() -> i64 {
  Utc::now().timestamp_millis()
}
