//! Domain types for wallpaper search.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// A single wallpaper as the rest of the application sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallpaper {
  pub id: String,
  /// Full-size image URL
  pub url: String,
  /// Page URL on the wallpaper site
  pub short_url: String,
  pub resolution: String,
  pub purity: String,
  pub category: String,
  pub file_size: u64,
  /// Small preview image URL
  pub thumb_url: String,
  pub created_at: String,
}

/// Search category filter. `All` applies no category filter.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
  #[default]
  All,
  General,
  Anime,
  People,
}

impl Category {
  /// Bitmask for the API `categories` parameter. `All` sends no filter.
  pub fn api_param(self) -> Option<&'static str> {
    match self {
      Category::All => None,
      Category::General => Some("100"),
      Category::Anime => Some("010"),
      Category::People => Some("001"),
    }
  }

  /// Canonical token used in cache keys and output.
  pub fn as_str(self) -> &'static str {
    match self {
      Category::All => "all",
      Category::General => "general",
      Category::Anime => "anime",
      Category::People => "people",
    }
  }
}

/// Result ordering understood by the API.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Sorting {
  #[default]
  DateAdded,
  Relevance,
  Random,
  Views,
  Favorites,
  Toplist,
}

impl Sorting {
  /// Value for the API `sorting` parameter, also the cache-key token.
  pub fn as_str(self) -> &'static str {
    match self {
      Sorting::DateAdded => "date_added",
      Sorting::Relevance => "relevance",
      Sorting::Random => "random",
      Sorting::Views => "views",
      Sorting::Favorites => "favorites",
      Sorting::Toplist => "toplist",
    }
  }
}

/// How much mature content a search may return.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Purity {
  /// Safe-for-work results only
  #[default]
  Sfw,
  /// Safe plus sketchy results
  Sketchy,
  /// Everything the account's API key is allowed to see
  Unfiltered,
}

impl Purity {
  /// Bitmask for the API `purity` parameter.
  pub fn api_param(self) -> &'static str {
    match self {
      Purity::Sfw => "100",
      Purity::Sketchy => "110",
      Purity::Unfiltered => "111",
    }
  }
}

/// Parameters identifying one logical search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
  pub query: String,
  pub category: Category,
  pub sorting: Sorting,
}

impl SearchParams {
  /// Copy with surrounding whitespace stripped from the query.
  pub fn normalized(&self) -> SearchParams {
    SearchParams {
      query: self.query.trim().to_string(),
      category: self.category,
      sorting: self.sorting,
    }
  }
}

/// One page of results as returned by the remote source.
#[derive(Debug, Clone)]
pub struct SearchPage {
  pub wallpapers: Vec<Wallpaper>,
  pub current_page: u32,
  pub last_page: u32,
  pub total: u64,
}

impl SearchPage {
  pub fn has_next_page(&self) -> bool {
    self.current_page < self.last_page
  }
}
