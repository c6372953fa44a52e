//! Typed errors for the wallpaper API client.

use std::sync::Arc;

/// Errors from the remote wallpaper API.
///
/// Timeouts are distinct from other network failures so callers can show
/// "slow connection" messaging. None of these are retried by the client;
/// retry is a caller decision.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
  /// Request exceeded the per-request timeout.
  #[error("request timeout")]
  Timeout,

  /// DNS/connection-level failure.
  #[error("network error: {0}")]
  Network(Arc<reqwest::Error>),

  /// Non-success HTTP response.
  #[error("HTTP error: {status}")]
  Http { status: u16 },

  /// Rate limited by the API.
  #[error("rate limited: too many requests")]
  RateLimited,

  /// Authentication failed (invalid or missing API key).
  #[error("authentication failed: invalid or missing API key")]
  Auth,

  /// Response body did not match the expected shape.
  #[error("parse error: {0}")]
  Parse(String),
}

impl From<reqwest::Error> for ApiError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_timeout() {
      ApiError::Timeout
    } else {
      ApiError::Network(Arc::new(err))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_error_display() {
    assert_eq!(ApiError::Timeout.to_string(), "request timeout");
    assert_eq!(
      ApiError::Http { status: 503 }.to_string(),
      "HTTP error: 503"
    );
    assert!(ApiError::Parse("bad json".into())
      .to_string()
      .contains("bad json"));
  }
}
