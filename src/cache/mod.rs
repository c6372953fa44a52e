//! Generic caching layer for search results.
//!
//! This module is domain-agnostic:
//! - Entries are opaque serialized payloads stamped with their write time
//! - Reads expire entries lazily against a configurable TTL
//! - Writes keep the store under an entry-count cap, oldest out first
//! - A schema version in store metadata guards against stale layouts

mod storage;
mod store;

pub use storage::{MemoryBackend, SqliteBackend, StorageBackend, StoredEntry};
pub use store::{StoreStats, TimestampedStore, SCHEMA_VERSION};

/// Deterministic cache addressing for query-shaped lookups.
///
/// Implementors normalize their parameters so that logically identical
/// queries hash to the same storage key.
pub trait QueryKey {
  /// Stable, storage-safe key derived from the normalized parameters.
  fn cache_hash(&self) -> String;

  /// Human-readable form for logs.
  fn description(&self) -> String;
}
