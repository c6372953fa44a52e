//! HTTP client for the wallpaper search API.

use color_eyre::{eyre::eyre, Result};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use super::api_types::ApiSearchResponse;
use super::error::ApiError;
use super::types::{Purity, SearchPage, SearchParams};

/// The API budget is 45 requests/minute (1.33 s spacing); requests are
/// spaced a little wider for margin.
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(1500);

const USER_AGENT: &str = concat!("wallscout/", env!("CARGO_PKG_VERSION"));

/// Spaces outbound requests.
///
/// The fair async mutex releases waiters in arrival order, so pending
/// requests drain strictly one at a time with the configured gap between
/// them.
struct RequestPacer {
  last_request: Mutex<Option<Instant>>,
  min_interval: Duration,
}

impl RequestPacer {
  fn new(min_interval: Duration) -> Self {
    Self {
      last_request: Mutex::new(None),
      min_interval,
    }
  }

  /// Wait until this request is allowed to go out.
  async fn acquire(&self) {
    let mut last = self.last_request.lock().await;
    if let Some(prev) = *last {
      let elapsed = prev.elapsed();
      if elapsed < self.min_interval {
        tokio::time::sleep(self.min_interval - elapsed).await;
      }
    }
    *last = Some(Instant::now());
  }
}

/// Client for the wallpaper search API.
///
/// Does not retry; failures come back as typed [`ApiError`]s and the
/// provider decides what to do with them.
pub struct WallhavenClient {
  http: reqwest::Client,
  base_url: Url,
  api_key: Option<String>,
  purity: RwLock<Purity>,
  pacer: RequestPacer,
}

impl WallhavenClient {
  pub fn new(
    base_url: &str,
    api_key: Option<String>,
    purity: Purity,
    timeout: Duration,
  ) -> Result<Self> {
    // Url::join treats a path without a trailing slash as a file and would
    // replace its last segment
    let normalized = if base_url.ends_with('/') {
      base_url.to_string()
    } else {
      format!("{}/", base_url)
    };
    let base_url = Url::parse(&normalized)
      .map_err(|e| eyre!("Invalid API base URL {}: {}", base_url, e))?;

    let http = reqwest::Client::builder()
      .timeout(timeout)
      .user_agent(USER_AGENT)
      .build()
      .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      api_key,
      purity: RwLock::new(purity),
      pacer: RequestPacer::new(MIN_REQUEST_INTERVAL),
    })
  }

  /// Change the purity filter for subsequent requests.
  pub fn set_purity(&self, purity: Purity) {
    let mut guard = self
      .purity
      .write()
      .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = purity;
  }

  pub fn purity(&self) -> Purity {
    *self
      .purity
      .read()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  /// Fetch one page of search results.
  pub async fn search(&self, params: &SearchParams, page: u32) -> Result<SearchPage, ApiError> {
    self.pacer.acquire().await;

    let url = self
      .base_url
      .join("search")
      .map_err(|e| ApiError::Parse(e.to_string()))?;

    let started = Instant::now();
    debug!(query = %params.query, page, "searching wallpaper API");

    let mut request = self
      .http
      .get(url)
      .query(&[
        ("q", params.query.as_str()),
        ("purity", self.purity().api_param()),
        ("sorting", params.sorting.as_str()),
      ])
      .query(&[("page", page)]);

    if let Some(categories) = params.category.api_param() {
      request = request.query(&[("categories", categories)]);
    }
    if let Some(key) = &self.api_key {
      request = request.header("X-API-Key", key);
    }

    let response = request.send().await.map_err(ApiError::from)?;

    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
      return Err(ApiError::Auth);
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
      return Err(ApiError::RateLimited);
    }
    if status.is_client_error() || status.is_server_error() {
      return Err(ApiError::Http {
        status: status.as_u16(),
      });
    }

    let bytes = response.bytes().await.map_err(ApiError::from)?;
    let parsed: ApiSearchResponse =
      serde_json::from_slice(&bytes).map_err(|e| ApiError::Parse(e.to_string()))?;

    let page = parsed.into_page();
    debug!(
      elapsed = ?started.elapsed(),
      results = page.wallpapers.len(),
      total = page.total,
      "search completed"
    );

    Ok(page)
  }

  #[cfg(test)]
  fn with_min_interval(mut self, min_interval: Duration) -> Self {
    self.pacer = RequestPacer::new(min_interval);
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_invalid_base_url_is_rejected() {
    assert!(WallhavenClient::new("not a url", None, Purity::Sfw, Duration::from_secs(10)).is_err());
  }

  #[test]
  fn test_set_purity() {
    let client =
      WallhavenClient::new("https://example.org/api/v1/", None, Purity::Sfw, Duration::from_secs(10))
        .unwrap();
    assert_eq!(client.purity(), Purity::Sfw);

    client.set_purity(Purity::Sketchy);
    assert_eq!(client.purity(), Purity::Sketchy);
  }

  #[tokio::test]
  async fn test_pacer_spaces_requests() {
    let interval = Duration::from_millis(40);
    let pacer = RequestPacer::new(interval);

    let started = Instant::now();
    pacer.acquire().await;
    pacer.acquire().await;
    pacer.acquire().await;

    // first acquire is free, the next two each wait out the interval
    assert!(started.elapsed() >= interval * 2);
  }

  #[tokio::test]
  async fn test_pacer_first_request_is_immediate() {
    let pacer = RequestPacer::new(Duration::from_secs(5));

    let started = Instant::now();
    pacer.acquire().await;
    assert!(started.elapsed() < Duration::from_millis(100));
  }

  #[test]
  fn test_base_url_keeps_trailing_segment() {
    let client =
      WallhavenClient::new("https://example.org/api/v1", None, Purity::Sfw, Duration::from_secs(10))
        .unwrap();
    assert_eq!(
      client.base_url.join("search").unwrap().as_str(),
      "https://example.org/api/v1/search"
    );
  }

  #[test]
  fn test_interval_override() {
    let client =
      WallhavenClient::new("https://example.org/api/v1/", None, Purity::Sfw, Duration::from_secs(10))
        .unwrap()
        .with_min_interval(Duration::from_millis(1));
    assert_eq!(client.pacer.min_interval, Duration::from_millis(1));
  }
}
