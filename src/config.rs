use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::wallhaven::Purity;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub wallhaven: WallhavenConfig,
  pub cache: CacheConfig,
  pub skins: SkinsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WallhavenConfig {
  pub base_url: String,
  /// How much mature content searches may return
  pub purity: Purity,
  pub timeout_secs: u64,
}

impl Default for WallhavenConfig {
  fn default() -> Self {
    Self {
      base_url: "https://wallhaven.cc/api/v1".to_string(),
      purity: Purity::Sfw,
      timeout_secs: 10,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Entry-count cap before eviction kicks in
  pub max_entries: usize,
  /// Age at which entries expire on read
  pub max_age_minutes: u64,
  /// Age at which a cache hit also triggers a background refresh
  pub stale_after_minutes: u64,
  /// Items kept per entry on fresh writes
  pub max_items_per_entry: usize,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      max_entries: 50,
      max_age_minutes: 30,
      stale_after_minutes: 15,
      max_items_per_entry: 200,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SkinsConfig {
  /// URL of the community skin catalog CSV
  pub catalog_url: String,
  pub ttl_minutes: u64,
}

impl Default for SkinsConfig {
  fn default() -> Self {
    Self {
      catalog_url: "https://rainmeter-skins.example.org/catalog.csv".to_string(),
      ttl_minutes: 30,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./wallscout.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/wallscout/config.yaml
  ///
  /// Without a file, built-in defaults apply; the wallpaper API is usable
  /// anonymously.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => {
        info!("no configuration file found, using defaults");
        Ok(Self::default())
      }
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("wallscout.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("wallscout").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Get the wallpaper API key from environment variables.
  ///
  /// Checks WALLSCOUT_API_KEY first, then WALLHAVEN_API_KEY as fallback.
  /// Anonymous access works without one.
  pub fn api_key() -> Option<String> {
    std::env::var("WALLSCOUT_API_KEY")
      .or_else(|_| std::env::var("WALLHAVEN_API_KEY"))
      .ok()
  }
}

impl WallhavenConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

impl CacheConfig {
  pub fn max_age(&self) -> Duration {
    Duration::from_secs(self.max_age_minutes * 60)
  }

  pub fn stale_after(&self) -> Duration {
    Duration::from_secs(self.stale_after_minutes * 60)
  }
}

impl SkinsConfig {
  pub fn ttl(&self) -> Duration {
    Duration::from_secs(self.ttl_minutes * 60)
  }
}
