//! Community skin catalog.
//!
//! The catalog is a single CSV document fetched over HTTP. It is cached
//! whole with one TTL, with no per-query partitioning: every search
//! filters, sorts, and paginates the parsed list in memory.

use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::matcher::slugify;
use super::types::{Skin, SkinPage};

const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

struct CachedDocument {
  skins: Vec<Skin>,
  fetched_at: Instant,
}

/// Whole-document cache over the remote CSV catalog.
pub struct SkinCatalog {
  http: reqwest::Client,
  url: String,
  ttl: Duration,
  cached: Mutex<Option<CachedDocument>>,
}

impl SkinCatalog {
  pub fn new(url: &str) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(FETCH_TIMEOUT)
      .build()
      .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;

    Ok(Self {
      http,
      url: url.to_string(),
      ttl: DEFAULT_TTL,
      cached: Mutex::new(None),
    })
  }

  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  /// The full catalog, from cache when fresh. A failed re-fetch serves the
  /// previously parsed document instead of erroring.
  pub async fn all(&self) -> Result<Vec<Skin>> {
    let mut cached = self.cached.lock().await;

    if let Some(doc) = cached.as_ref() {
      if doc.fetched_at.elapsed() <= self.ttl {
        return Ok(doc.skins.clone());
      }
    }

    match self.fetch_document().await {
      Ok(skins) => {
        *cached = Some(CachedDocument {
          skins: skins.clone(),
          fetched_at: Instant::now(),
        });
        Ok(skins)
      }
      Err(err) => match cached.as_ref() {
        Some(doc) => {
          warn!(error = %err, "catalog fetch failed, serving stale document");
          Ok(doc.skins.clone())
        }
        None => Err(err),
      },
    }
  }

  /// Filter, sort, and paginate the catalog in memory.
  pub async fn search(
    &self,
    query: Option<&str>,
    category: Option<&str>,
    page: u32,
    per_page: usize,
  ) -> Result<SkinPage> {
    let skins = self.all().await?;
    Ok(filter_page(&skins, query, category, page, per_page))
  }

  async fn fetch_document(&self) -> Result<Vec<Skin>> {
    debug!(url = %self.url, "fetching skin catalog");

    let text = self
      .http
      .get(&self.url)
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch skin catalog: {}", e))?
      .error_for_status()
      .map_err(|e| eyre!("Skin catalog request failed: {}", e))?
      .text()
      .await
      .map_err(|e| eyre!("Failed to read skin catalog body: {}", e))?;

    parse_catalog(&text)
  }
}

/// Filter by query and category, sort by name, and slice out one page.
fn filter_page(
  skins: &[Skin],
  query: Option<&str>,
  category: Option<&str>,
  page: u32,
  per_page: usize,
) -> SkinPage {
  let needle = query.map(|q| q.trim().to_lowercase()).unwrap_or_default();

  let mut matching: Vec<&Skin> = skins
    .iter()
    .filter(|s| {
      category
        .map(|c| s.category.eq_ignore_ascii_case(c))
        .unwrap_or(true)
    })
    .filter(|s| {
      needle.is_empty()
        || s.name.to_lowercase().contains(&needle)
        || s.author.to_lowercase().contains(&needle)
        || s.description.to_lowercase().contains(&needle)
    })
    .collect();
  matching.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

  let total = matching.len();
  let page = page.max(1);
  let start = (page as usize - 1).saturating_mul(per_page);
  let selected: Vec<Skin> = matching
    .into_iter()
    .skip(start)
    .take(per_page)
    .cloned()
    .collect();

  SkinPage {
    has_next_page: start + selected.len() < total,
    skins: selected,
    page,
    total,
  }
}

// ============================================================================
// CSV parsing
// ============================================================================

/// Parse the catalog CSV. The header row maps columns by name so the
/// document can reorder or add columns without breaking us. A `name`
/// column is required; everything else is optional.
fn parse_catalog(text: &str) -> Result<Vec<Skin>> {
  let records = parse_records(text);
  let mut rows = records.into_iter();

  let header = rows
    .next()
    .ok_or_else(|| eyre!("Skin catalog is empty"))?;
  let columns: HashMap<String, usize> = header
    .iter()
    .enumerate()
    .map(|(i, name)| (name.trim().to_lowercase(), i))
    .collect();

  if !columns.contains_key("name") {
    return Err(eyre!("Skin catalog has no 'name' column"));
  }

  let field = |row: &[String], col: &str| -> String {
    columns
      .get(col)
      .and_then(|&i| row.get(i))
      .map(|v| v.trim().to_string())
      .unwrap_or_default()
  };

  let mut skins = Vec::new();
  for row in rows {
    let name = field(&row, "name");
    if name.is_empty() {
      continue;
    }

    let id = {
      let explicit = field(&row, "id");
      if explicit.is_empty() {
        slugify(&name)
      } else {
        explicit
      }
    };

    skins.push(Skin {
      id,
      name,
      author: field(&row, "author"),
      version: field(&row, "version"),
      category: field(&row, "category"),
      description: field(&row, "description"),
      download_url: field(&row, "download_url"),
      preview_url: field(&row, "preview_url"),
    });
  }

  Ok(skins)
}

/// Split CSV text into records of fields.
///
/// Handles quoted fields, doubled-quote escapes, and newlines inside
/// quotes. Carriage returns outside quotes are dropped.
fn parse_records(text: &str) -> Vec<Vec<String>> {
  let mut records = Vec::new();
  let mut record: Vec<String> = Vec::new();
  let mut fieldbuf = String::new();
  let mut in_quotes = false;
  let mut chars = text.chars().peekable();

  while let Some(c) = chars.next() {
    if in_quotes {
      match c {
        '"' => {
          if chars.peek() == Some(&'"') {
            chars.next();
            fieldbuf.push('"');
          } else {
            in_quotes = false;
          }
        }
        _ => fieldbuf.push(c),
      }
      continue;
    }

    match c {
      '"' => in_quotes = true,
      ',' => record.push(std::mem::take(&mut fieldbuf)),
      '\r' => {}
      '\n' => {
        record.push(std::mem::take(&mut fieldbuf));
        // skip blank lines
        if record.len() > 1 || !record[0].is_empty() {
          records.push(std::mem::take(&mut record));
        } else {
          record.clear();
        }
      }
      _ => fieldbuf.push(c),
    }
  }

  if !fieldbuf.is_empty() || !record.is_empty() {
    record.push(fieldbuf);
    records.push(record);
  }

  records
}
