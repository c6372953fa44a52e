mod app;
mod cache;
mod config;
mod event;
mod query;
mod skins;
mod wallhaven;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use wallhaven::{Category, Purity, SearchParams, Sorting};

#[derive(Parser, Debug)]
#[command(name = "wallscout")]
#[command(about = "Browse wallpapers and Rainmeter skins from the terminal")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/wallscout/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Override the purity filter for this invocation
  #[arg(long, value_enum)]
  purity: Option<Purity>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Search wallpapers
  Search {
    /// Search terms
    query: String,

    #[arg(short = 'C', long, value_enum, default_value = "all")]
    category: Category,

    #[arg(short, long, value_enum, default_value = "date-added")]
    sorting: Sorting,

    /// Load this many pages, appending like an infinite scroll
    #[arg(short, long, default_value_t = 1)]
    pages: u32,
  },

  /// Bypass the cache and re-fetch the first page of a search
  Refresh {
    query: String,

    #[arg(short = 'C', long, value_enum, default_value = "all")]
    category: Category,

    #[arg(short, long, value_enum, default_value = "date-added")]
    sorting: Sorting,
  },

  /// Browse the Rainmeter skin catalog
  Skins {
    /// Filter terms (matches name, author, description)
    query: Option<String>,

    #[arg(short = 'C', long)]
    category: Option<String>,

    #[arg(short, long, default_value_t = 1)]
    page: u32,
  },

  /// Find the catalog entry for an installed skin's folder name
  SkinMatch {
    name: String,
  },

  /// Cache maintenance
  Cache {
    #[command(subcommand)]
    action: CacheAction,
  },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
  /// Show entry count, size, and health
  Stats,
  /// Remove all cached searches
  Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let (stderr_writer, _guard) = tracing_appender::non_blocking(std::io::stderr());
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(stderr_writer)
    .init();

  let args = Args::parse();

  let config = config::Config::load(args.config.as_deref())?;
  let app = app::App::new(config)?;

  if let Some(purity) = args.purity {
    app.set_purity(purity);
  }

  match args.command {
    Command::Search {
      query,
      category,
      sorting,
      pages,
    } => {
      let params = SearchParams {
        query,
        category,
        sorting,
      };
      app.search(params, pages.max(1)).await
    }
    Command::Refresh {
      query,
      category,
      sorting,
    } => {
      let params = SearchParams {
        query,
        category,
        sorting,
      };
      app.refresh(params).await
    }
    Command::Skins {
      query,
      category,
      page,
    } => app.skins(query.as_deref(), category.as_deref(), page).await,
    Command::SkinMatch { name } => app.skin_match(&name).await,
    Command::Cache { action } => match action {
      CacheAction::Stats => app.cache_stats(),
      CacheAction::Clear => app.clear_cache(),
    },
  }
}
