//! Serde-deserializable types matching the wallpaper API responses.
//!
//! Responses are parsed-or-rejected here, at the boundary, so the rest of
//! the application only ever sees validated domain types.

use serde::Deserialize;

use super::types::{SearchPage, Wallpaper};

#[derive(Debug, Deserialize)]
pub struct ApiThumbs {
  #[serde(default)]
  pub large: String,
  #[serde(default)]
  pub original: String,
  #[serde(default)]
  pub small: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiWallpaper {
  pub id: String,
  pub url: String,
  #[serde(default)]
  pub short_url: String,
  #[serde(default)]
  pub resolution: String,
  #[serde(default)]
  pub purity: String,
  #[serde(default)]
  pub category: String,
  #[serde(default)]
  pub file_size: u64,
  #[serde(default)]
  pub created_at: String,
  pub thumbs: Option<ApiThumbs>,
}

/// Pagination envelope. The application depends only on current/last page
/// and the total count.
#[derive(Debug, Deserialize)]
pub struct ApiMeta {
  pub current_page: u32,
  pub last_page: u32,
  #[serde(default)]
  pub total: u64,
}

#[derive(Debug, Deserialize)]
pub struct ApiSearchResponse {
  pub data: Vec<ApiWallpaper>,
  pub meta: ApiMeta,
}

impl ApiWallpaper {
  pub fn into_domain(self) -> Wallpaper {
    let thumb_url = self
      .thumbs
      .map(|t| {
        if !t.small.is_empty() {
          t.small
        } else if !t.large.is_empty() {
          t.large
        } else {
          t.original
        }
      })
      .unwrap_or_default();

    Wallpaper {
      id: self.id,
      url: self.url,
      short_url: self.short_url,
      resolution: self.resolution,
      purity: self.purity,
      category: self.category,
      file_size: self.file_size,
      thumb_url,
      created_at: self.created_at,
    }
  }
}

impl ApiSearchResponse {
  pub fn into_page(self) -> SearchPage {
    let ApiSearchResponse { data, meta } = self;
    SearchPage {
      wallpapers: data.into_iter().map(ApiWallpaper::into_domain).collect(),
      current_page: meta.current_page,
      last_page: meta.last_page,
      total: meta.total,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SAMPLE: &str = r#"{
    "data": [
      {
        "id": "abc123",
        "url": "https://example.org/full/abc123.jpg",
        "short_url": "https://example.org/w/abc123",
        "resolution": "1920x1080",
        "purity": "sfw",
        "category": "general",
        "file_size": 524288,
        "created_at": "2024-01-15 10:22:00",
        "thumbs": {
          "large": "https://example.org/lg/abc123.jpg",
          "original": "https://example.org/orig/abc123.jpg",
          "small": "https://example.org/sm/abc123.jpg"
        }
      }
    ],
    "meta": {
      "current_page": 1,
      "last_page": 42,
      "per_page": 24,
      "total": 1000
    }
  }"#;

  #[test]
  fn test_parse_and_convert() {
    let resp: ApiSearchResponse = serde_json::from_str(SAMPLE).unwrap();
    let page = resp.into_page();

    assert_eq!(page.wallpapers.len(), 1);
    assert_eq!(page.wallpapers[0].id, "abc123");
    assert_eq!(page.wallpapers[0].thumb_url, "https://example.org/sm/abc123.jpg");
    assert_eq!(page.current_page, 1);
    assert_eq!(page.last_page, 42);
    assert_eq!(page.total, 1000);
    assert!(page.has_next_page());
  }

  #[test]
  fn test_missing_optional_fields_default() {
    let json = r#"{
      "data": [{"id": "x", "url": "https://example.org/x.jpg", "thumbs": null}],
      "meta": {"current_page": 1, "last_page": 1}
    }"#;

    let resp: ApiSearchResponse = serde_json::from_str(json).unwrap();
    let page = resp.into_page();
    assert_eq!(page.wallpapers[0].thumb_url, "");
    assert_eq!(page.total, 0);
    assert!(!page.has_next_page());
  }

  #[test]
  fn test_missing_meta_is_rejected() {
    let json = r#"{"data": []}"#;
    assert!(serde_json::from_str::<ApiSearchResponse>(json).is_err());
  }
}
