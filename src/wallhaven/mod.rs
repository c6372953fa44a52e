//! Wallpaper search: the remote API client, the result cache, and the
//! provider that composes them with cache-first semantics.

mod api_types;
mod cache;
mod client;
mod error;
mod provider;
mod types;

pub use cache::{SearchCache, SearchEntry, SearchKey};
pub use client::WallhavenClient;
pub use error::ApiError;
pub use provider::{RemoteSearch, SearchOutcome, SearchProvider};
pub use types::{Category, Purity, SearchPage, SearchParams, Sorting, Wallpaper};
