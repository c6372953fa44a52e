//! Cache-first search orchestration over the remote client.
//!
//! The provider answers from cache when it can, refreshes stale entries in
//! the background, and falls back to expired entries when the network is
//! unavailable. It never retries on its own; retry is a caller-initiated
//! action.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cache::{StorageBackend, StoreStats};
use crate::event::{AppEvent, EventBus};

use super::cache::{SearchCache, SearchEntry};
use super::client::WallhavenClient;
use super::error::ApiError;
use super::types::{SearchPage, SearchParams, Wallpaper};

/// Cache age beyond which a hit still answers immediately but also kicks
/// off a background refresh.
const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(15 * 60);

/// Remote source for one page of search results.
#[async_trait]
pub trait RemoteSearch: Send + Sync + 'static {
  async fn search_page(&self, params: &SearchParams, page: u32) -> Result<SearchPage, ApiError>;
}

#[async_trait]
impl RemoteSearch for WallhavenClient {
  async fn search_page(&self, params: &SearchParams, page: u32) -> Result<SearchPage, ApiError> {
    self.search(params, page).await
  }
}

/// Result of a provider call, annotated with where it came from.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
  pub wallpapers: Vec<Wallpaper>,
  pub page: u32,
  pub total_count: u64,
  pub has_next_page: bool,
  pub from_cache: bool,
  /// Age of the cache entry that answered, if one did
  pub cache_age: Option<Duration>,
}

impl SearchOutcome {
  fn from_entry(entry: SearchEntry) -> Self {
    let cache_age = Some(entry.age());
    Self {
      wallpapers: entry.data,
      page: entry.page,
      total_count: entry.total_count,
      has_next_page: entry.has_next_page,
      from_cache: true,
      cache_age,
    }
  }

  fn from_page(page: SearchPage) -> Self {
    let has_next_page = page.has_next_page();
    Self {
      wallpapers: page.wallpapers,
      page: page.current_page,
      total_count: page.total,
      has_next_page,
      from_cache: false,
      cache_age: None,
    }
  }
}

/// Composes the remote client and the search cache.
pub struct SearchProvider<C: RemoteSearch, B: StorageBackend> {
  client: Arc<C>,
  cache: SearchCache<B>,
  stale_after: Duration,
  events: EventBus,
}

impl<C: RemoteSearch, B: StorageBackend> SearchProvider<C, B> {
  pub fn new(client: Arc<C>, cache: SearchCache<B>, events: EventBus) -> Self {
    Self {
      client,
      cache,
      stale_after: DEFAULT_STALE_AFTER,
      events,
    }
  }

  /// Set the cache age that triggers a background refresh on a hit.
  pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
    self.stale_after = stale_after;
    self
  }

  /// Cache-first search for the first page of results.
  ///
  /// 1. A fresh cache hit answers immediately; a hit older than the
  ///    staleness threshold additionally spawns a background refresh.
  /// 2. On a miss the remote is fetched and written through.
  /// 3. If the remote fails on a miss, any cached entry for the same key,
  ///    expired or not, answers instead; only when there is none does the
  ///    error propagate.
  pub async fn search(&self, params: &SearchParams) -> Result<SearchOutcome, ApiError> {
    let params = params.normalized();
    self.lookup(&params, 1).await
  }

  /// Load the page after `current_page`, folding it into the cache.
  pub async fn load_more(
    &self,
    params: &SearchParams,
    current_page: u32,
  ) -> Result<SearchOutcome, ApiError> {
    let params = params.normalized();
    let page = current_page + 1;

    if let Some(entry) = self.cache.get(&params, page) {
      return Ok(SearchOutcome::from_entry(entry));
    }

    let fetched = self.client.search_page(&params, page).await?;
    self.cache.append(
      &params,
      page,
      fetched.wallpapers.clone(),
      fetched.total,
      fetched.has_next_page(),
    );

    Ok(SearchOutcome::from_page(fetched))
  }

  /// Bypass the cache read and re-fetch the first page.
  pub async fn refresh(&self, params: &SearchParams) -> Result<SearchOutcome, ApiError> {
    let params = params.normalized();

    let fetched = self.client.search_page(&params, 1).await?;
    self.store_page(&params, &fetched);

    Ok(SearchOutcome::from_page(fetched))
  }

  /// Newest non-expired cached entry, for seeding the display on startup.
  pub fn recent(&self) -> Option<SearchEntry> {
    self.cache.get_recent()
  }

  pub fn cache_stats(&self) -> color_eyre::Result<StoreStats> {
    self.cache.stats()
  }

  pub fn clear_cache(&self) -> color_eyre::Result<()> {
    self.cache.clear()?;
    self.events.emit(AppEvent::CacheCleared);
    Ok(())
  }

  async fn lookup(&self, params: &SearchParams, page: u32) -> Result<SearchOutcome, ApiError> {
    // One raw read up front: an expired entry must survive until we know
    // whether the live fetch succeeds, so it can serve as the fallback.
    if let Some(entry) = self.cache.get_ignoring_age(params, page) {
      if entry.age() <= self.cache.max_age() {
        if entry.age() > self.stale_after {
          self.spawn_refresh(params.clone(), page);
        }
        return Ok(SearchOutcome::from_entry(entry));
      }

      // expired: treat as a miss, but keep the entry in hand
      match self.client.search_page(params, page).await {
        Ok(fetched) => {
          self.store_page(params, &fetched);
          Ok(SearchOutcome::from_page(fetched))
        }
        Err(err) => {
          debug!(error = %err, "remote fetch failed, serving expired cache entry");
          Ok(SearchOutcome::from_entry(entry))
        }
      }
    } else {
      match self.client.search_page(params, page).await {
        Ok(fetched) => {
          self.store_page(params, &fetched);
          Ok(SearchOutcome::from_page(fetched))
        }
        Err(err) => Err(err),
      }
    }
  }

  fn store_page(&self, params: &SearchParams, fetched: &SearchPage) {
    self.cache.set(
      params,
      fetched.current_page,
      fetched.wallpapers.clone(),
      fetched.total,
      fetched.has_next_page(),
    );
  }

  /// Re-fetch in the background and silently overwrite the entry. The
  /// stale value stays authoritative if the fetch fails.
  fn spawn_refresh(&self, params: SearchParams, page: u32) {
    let client = Arc::clone(&self.client);
    let cache = self.cache.clone();
    let events = self.events.clone();

    tokio::spawn(async move {
      match client.search_page(&params, page).await {
        Ok(fetched) => {
          cache.set(
            &params,
            fetched.current_page,
            fetched.wallpapers,
            fetched.total,
            fetched.current_page < fetched.last_page,
          );
          events.emit(AppEvent::CacheRefreshed {
            query: params.query.clone(),
          });
        }
        Err(err) => {
          debug!(error = %err, query = %params.query, "background refresh failed, keeping stale entry");
        }
      }
    });
  }
}

impl<C: RemoteSearch, B: StorageBackend> Clone for SearchProvider<C, B> {
  fn clone(&self) -> Self {
    Self {
      client: Arc::clone(&self.client),
      cache: self.cache.clone(),
      stale_after: self.stale_after,
      events: self.events.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{MemoryBackend, TimestampedStore};
  use crate::wallhaven::types::{Category, Sorting};
  use std::collections::VecDeque;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;

  /// Remote fake fed from a script of responses.
  struct ScriptedRemote {
    responses: Mutex<VecDeque<Result<SearchPage, ApiError>>>,
    calls: AtomicUsize,
  }

  impl ScriptedRemote {
    fn new(responses: Vec<Result<SearchPage, ApiError>>) -> Arc<Self> {
      Arc::new(Self {
        responses: Mutex::new(responses.into()),
        calls: AtomicUsize::new(0),
      })
    }

    fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }
  }

  #[async_trait]
  impl RemoteSearch for ScriptedRemote {
    async fn search_page(
      &self,
      _params: &SearchParams,
      _page: u32,
    ) -> Result<SearchPage, ApiError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      self
        .responses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or(Err(ApiError::Http { status: 599 }))
    }
  }

  fn wallpaper(id: &str) -> Wallpaper {
    Wallpaper {
      id: id.to_string(),
      url: format!("https://example.org/full/{}.jpg", id),
      short_url: format!("https://example.org/w/{}", id),
      resolution: "1920x1080".to_string(),
      purity: "sfw".to_string(),
      category: "general".to_string(),
      file_size: 1024,
      thumb_url: format!("https://example.org/sm/{}.jpg", id),
      created_at: "2024-01-15 10:22:00".to_string(),
    }
  }

  fn page(ids: &[&str], current: u32, last: u32) -> SearchPage {
    SearchPage {
      wallpapers: ids.iter().map(|id| wallpaper(id)).collect(),
      current_page: current,
      last_page: last,
      total: (ids.len() * last as usize) as u64,
    }
  }

  fn params(query: &str) -> SearchParams {
    SearchParams {
      query: query.to_string(),
      category: Category::All,
      sorting: Sorting::DateAdded,
    }
  }

  fn provider_with(
    remote: Arc<ScriptedRemote>,
    max_age: Duration,
  ) -> SearchProvider<ScriptedRemote, MemoryBackend> {
    let store = TimestampedStore::new(MemoryBackend::new())
      .unwrap()
      .with_max_age(max_age);
    SearchProvider::new(remote, SearchCache::new(store), EventBus::new())
  }

  #[tokio::test]
  async fn test_miss_fetches_then_hit_serves_cache() {
    let remote = ScriptedRemote::new(vec![Ok(page(&["a", "b"], 1, 3))]);
    let provider = provider_with(Arc::clone(&remote), Duration::from_secs(1800));

    let first = provider.search(&params("cats")).await.unwrap();
    assert!(!first.from_cache);
    assert_eq!(first.wallpapers.len(), 2);
    assert!(first.has_next_page);

    let second = provider.search(&params("cats")).await.unwrap();
    assert!(second.from_cache);
    assert!(second.cache_age.is_some());
    assert_eq!(second.wallpapers.len(), 2);

    // only the miss hit the network
    assert_eq!(remote.calls(), 1);
  }

  #[tokio::test]
  async fn test_query_normalization_shares_cache_entry() {
    let remote = ScriptedRemote::new(vec![Ok(page(&["a"], 1, 1))]);
    let provider = provider_with(Arc::clone(&remote), Duration::from_secs(1800));

    provider.search(&params("cats")).await.unwrap();
    let hit = provider.search(&params("  CATS ")).await.unwrap();

    assert!(hit.from_cache);
    assert_eq!(remote.calls(), 1);
  }

  #[tokio::test]
  async fn test_stale_fallback_on_remote_failure() {
    let remote = ScriptedRemote::new(vec![Ok(page(&["a", "b"], 1, 1)), Err(ApiError::Timeout)]);
    let provider = provider_with(Arc::clone(&remote), Duration::from_millis(40));

    provider.search(&params("cats")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;

    // entry expired, remote now fails: the expired entry still answers
    let fallback = provider.search(&params("cats")).await.unwrap();
    assert!(fallback.from_cache);
    assert_eq!(fallback.wallpapers.len(), 2);
    assert_eq!(remote.calls(), 2);
  }

  #[tokio::test]
  async fn test_error_propagates_without_fallback() {
    let remote = ScriptedRemote::new(vec![Err(ApiError::Timeout)]);
    let provider = provider_with(remote, Duration::from_secs(1800));

    let err = provider.search(&params("cats")).await.unwrap_err();
    assert!(matches!(err, ApiError::Timeout));
  }

  #[tokio::test]
  async fn test_load_more_appends_to_first_page() {
    let remote = ScriptedRemote::new(vec![
      Ok(page(&["a", "b"], 1, 3)),
      Ok(page(&["c", "d"], 2, 3)),
    ]);
    let provider = provider_with(Arc::clone(&remote), Duration::from_secs(1800));

    provider.search(&params("cats")).await.unwrap();
    let more = provider.load_more(&params("cats"), 1).await.unwrap();
    assert_eq!(more.page, 2);
    assert!(!more.from_cache);

    // page-1 entry accumulated both pages
    let seeded = provider.search(&params("cats")).await.unwrap();
    assert!(seeded.from_cache);
    let ids: Vec<&str> = seeded.wallpapers.iter().map(|w| w.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d"]);
  }

  #[tokio::test]
  async fn test_load_more_prefers_cached_page() {
    // with no page-1 entry, the appended page is stored standalone
    let remote = ScriptedRemote::new(vec![Ok(page(&["b"], 2, 3))]);
    let provider = provider_with(Arc::clone(&remote), Duration::from_secs(1800));

    let fetched = provider.load_more(&params("cats"), 1).await.unwrap();
    assert!(!fetched.from_cache);

    let cached = provider.load_more(&params("cats"), 1).await.unwrap();
    assert!(cached.from_cache);
    assert_eq!(cached.page, 2);
    assert_eq!(remote.calls(), 1);
  }

  #[tokio::test]
  async fn test_background_refresh_updates_entry() {
    let remote = ScriptedRemote::new(vec![
      Ok(page(&["old"], 1, 1)),
      Ok(page(&["new"], 1, 1)),
    ]);
    let provider =
      provider_with(Arc::clone(&remote), Duration::from_secs(1800)).with_stale_after(Duration::ZERO);
    let mut events = provider.events.subscribe();

    provider.search(&params("cats")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    // hit answers from cache immediately and spawns the refresh
    let hit = provider.search(&params("cats")).await.unwrap();
    assert!(hit.from_cache);
    assert_eq!(hit.wallpapers[0].id, "old");

    // wait for the refresh to land
    let event = events.recv().await.unwrap();
    assert_eq!(
      event,
      AppEvent::CacheRefreshed {
        query: "cats".to_string()
      }
    );

    let refreshed = provider.search(&params("cats")).await.unwrap();
    assert!(refreshed.from_cache);
    assert_eq!(refreshed.wallpapers[0].id, "new");
    assert!(remote.calls() >= 2);
  }

  #[tokio::test]
  async fn test_failed_background_refresh_keeps_stale_entry() {
    let remote = ScriptedRemote::new(vec![
      Ok(page(&["old"], 1, 1)),
      Err(ApiError::Http { status: 502 }),
    ]);
    let provider =
      provider_with(Arc::clone(&remote), Duration::from_secs(1800)).with_stale_after(Duration::ZERO);

    provider.search(&params("cats")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    provider.search(&params("cats")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let after = provider.search(&params("cats")).await.unwrap();
    assert!(after.from_cache);
    assert_eq!(after.wallpapers[0].id, "old");
  }

  #[tokio::test]
  async fn test_refresh_bypasses_cache_read() {
    let remote = ScriptedRemote::new(vec![
      Ok(page(&["old"], 1, 1)),
      Ok(page(&["new"], 1, 1)),
    ]);
    let provider = provider_with(Arc::clone(&remote), Duration::from_secs(1800));

    provider.search(&params("cats")).await.unwrap();
    let refreshed = provider.refresh(&params("cats")).await.unwrap();

    assert!(!refreshed.from_cache);
    assert_eq!(refreshed.wallpapers[0].id, "new");
    assert_eq!(remote.calls(), 2);

    // write-through: subsequent hit sees the refreshed data
    let hit = provider.search(&params("cats")).await.unwrap();
    assert!(hit.from_cache);
    assert_eq!(hit.wallpapers[0].id, "new");
  }

  #[tokio::test]
  async fn test_clear_cache_emits_event() {
    let remote = ScriptedRemote::new(vec![Ok(page(&["a"], 1, 1))]);
    let provider = provider_with(remote, Duration::from_secs(1800));
    let mut events = provider.events.subscribe();

    provider.search(&params("cats")).await.unwrap();
    assert!(provider.recent().is_some());

    provider.clear_cache().unwrap();
    assert!(provider.recent().is_none());
    assert_eq!(events.recv().await.unwrap(), AppEvent::CacheCleared);
  }
}
