//! Domain types for the Rainmeter skin catalog.

use serde::{Deserialize, Serialize};

/// One entry from the community skin catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skin {
  /// Stable identifier from the catalog, or a slug derived from the name
  pub id: String,
  pub name: String,
  pub author: String,
  pub version: String,
  pub category: String,
  pub description: String,
  pub download_url: String,
  pub preview_url: String,
}

/// One page of an in-memory catalog search.
#[derive(Debug, Clone)]
pub struct SkinPage {
  pub skins: Vec<Skin>,
  pub page: u32,
  /// Matching skins across all pages
  pub total: usize,
  pub has_next_page: bool,
}
