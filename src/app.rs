//! Application wiring and command entry points.
//!
//! `App` is the composition root: every component is constructed here and
//! handed its collaborators explicitly. Nothing in the crate reaches for
//! module-level singletons.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{SqliteBackend, TimestampedStore};
use crate::config::Config;
use crate::event::{AppEvent, EventBus};
use crate::query::{Query, QueryState};
use crate::skins::{find_catalog_match, SkinCatalog};
use crate::wallhaven::{
  Purity, SearchCache, SearchOutcome, SearchParams, SearchProvider, WallhavenClient,
};

/// How often the driver loop polls a pending query.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

const SKINS_PER_PAGE: usize = 24;

/// Main application state.
pub struct App {
  client: Arc<WallhavenClient>,
  provider: SearchProvider<WallhavenClient, SqliteBackend>,
  skins: SkinCatalog,
  events: EventBus,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let events = EventBus::new();

    let backend = SqliteBackend::open()?;
    let store = TimestampedStore::new(backend)?
      .with_max_age(config.cache.max_age())
      .with_max_entries(config.cache.max_entries);
    let cache = SearchCache::new(store).with_max_items(config.cache.max_items_per_entry);

    let client = Arc::new(WallhavenClient::new(
      &config.wallhaven.base_url,
      Config::api_key(),
      config.wallhaven.purity,
      config.wallhaven.timeout(),
    )?);

    let provider = SearchProvider::new(Arc::clone(&client), cache, events.clone())
      .with_stale_after(config.cache.stale_after());

    let skins = SkinCatalog::new(&config.skins.catalog_url)?.with_ttl(config.skins.ttl());

    Ok(Self {
      client,
      provider,
      skins,
      events,
    })
  }

  /// Override the purity filter for this run.
  pub fn set_purity(&self, purity: Purity) {
    self.client.set_purity(purity);
    self.events.emit(AppEvent::SettingsChanged);
  }

  /// Search wallpapers and print results, optionally loading further pages
  /// the way an infinite scroll would.
  pub async fn search(&self, params: SearchParams, pages: u32) -> Result<()> {
    let outcome = self.run_search_query(params.clone()).await?;
    print_outcome(&outcome);

    let mut current_page = outcome.page;
    let mut has_next = outcome.has_next_page;
    for _ in 1..pages {
      if !has_next {
        break;
      }
      let more = self.provider.load_more(&params, current_page).await?;
      print_outcome(&more);
      current_page = more.page;
      has_next = more.has_next_page;
    }

    Ok(())
  }

  /// Bypass the cache and re-fetch the first page.
  pub async fn refresh(&self, params: SearchParams) -> Result<()> {
    let outcome = self.provider.refresh(&params).await?;
    print_outcome(&outcome);
    Ok(())
  }

  /// Browse the skin catalog.
  pub async fn skins(
    &self,
    query: Option<&str>,
    category: Option<&str>,
    page: u32,
  ) -> Result<()> {
    let result = self
      .skins
      .search(query, category, page, SKINS_PER_PAGE)
      .await?;

    if result.skins.is_empty() {
      println!("No skins matched.");
      return Ok(());
    }

    println!(
      "page {} - {} of {} skins",
      result.page,
      result.skins.len(),
      result.total
    );
    for skin in &result.skins {
      println!(
        "{:<28} {:<12} {:<8} {}",
        skin.name, skin.category, skin.version, skin.author
      );
    }
    if result.has_next_page {
      println!("(more available: --page {})", result.page + 1);
    }

    Ok(())
  }

  /// Find the catalog entry for an installed skin's folder name.
  pub async fn skin_match(&self, name: &str) -> Result<()> {
    let catalog = self.skins.all().await?;

    match find_catalog_match(name, &catalog) {
      Some(skin) => {
        println!("{} ({})", skin.name, skin.id);
        if !skin.author.is_empty() {
          println!("  author:   {}", skin.author);
        }
        if !skin.version.is_empty() {
          println!("  version:  {}", skin.version);
        }
        if !skin.download_url.is_empty() {
          println!("  download: {}", skin.download_url);
        }
      }
      None => println!("No catalog entry matched \"{}\".", name),
    }

    Ok(())
  }

  pub fn cache_stats(&self) -> Result<()> {
    let stats = self.provider.cache_stats()?;

    println!("entries:     {}", stats.total_entries);
    println!("size:        {}", format_bytes(stats.total_bytes));
    match stats.last_update {
      Some(ms) => println!("last update: {}", format_timestamp(ms)),
      None => println!("last update: never"),
    }
    println!("healthy:     {}", if stats.healthy { "yes" } else { "no" });

    if let Some(recent) = self.provider.recent() {
      println!(
        "most recent: \"{}\" ({} results loaded)",
        recent.query,
        recent.data.len()
      );
    }

    Ok(())
  }

  pub fn clear_cache(&self) -> Result<()> {
    self.provider.clear_cache()?;
    println!("Cache cleared.");
    Ok(())
  }

  /// Drive a search through the async query state machine, the way an
  /// interactive front end does from its tick loop.
  async fn run_search_query(&self, params: SearchParams) -> Result<SearchOutcome> {
    let provider = self.provider.clone();
    let mut query = Query::new(move || {
      let provider = provider.clone();
      let params = params.clone();
      async move { provider.search(&params).await.map_err(|e| e.to_string()) }
    });

    query.fetch();
    loop {
      if query.poll() {
        break;
      }
      tokio::time::sleep(POLL_INTERVAL).await;
    }

    match query.state() {
      QueryState::Success(outcome) => Ok(outcome.clone()),
      QueryState::Error(e) => Err(eyre!("search failed: {}", e)),
      _ => Err(eyre!("query finished in an unexpected state")),
    }
  }
}

fn print_outcome(outcome: &SearchOutcome) {
  let origin = if outcome.from_cache {
    match outcome.cache_age {
      Some(age) => format!("cache, {} old", format_age(age)),
      None => "cache".to_string(),
    }
  } else {
    "network".to_string()
  };

  println!(
    "page {} - {} of {} results ({})",
    outcome.page,
    outcome.wallpapers.len(),
    outcome.total_count,
    origin
  );
  for w in &outcome.wallpapers {
    let link = if w.short_url.is_empty() {
      &w.url
    } else {
      &w.short_url
    };
    println!("{:<10} {:<11} {:<8} {}", w.id, w.resolution, w.category, link);
  }
}

fn format_age(age: Duration) -> String {
  let secs = age.as_secs();
  if secs < 60 {
    format!("{}s", secs)
  } else if secs < 3600 {
    format!("{}m", secs / 60)
  } else {
    format!("{}h{}m", secs / 3600, (secs % 3600) / 60)
  }
}

fn format_bytes(bytes: u64) -> String {
  const KIB: u64 = 1024;
  const MIB: u64 = 1024 * 1024;
  if bytes >= MIB {
    format!("{:.1} MiB", bytes as f64 / MIB as f64)
  } else if bytes >= KIB {
    format!("{:.1} KiB", bytes as f64 / KIB as f64)
  } else {
    format!("{} B", bytes)
  }
}

fn format_timestamp(epoch_ms: i64) -> String {
  chrono::DateTime::from_timestamp_millis(epoch_ms)
    .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
    .unwrap_or_else(|| "unknown".to_string())
}
