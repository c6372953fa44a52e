//! Rainmeter skin catalog: whole-document cache, in-memory search, and
//! the installed-skin matcher.

mod catalog;
mod matcher;
mod types;

pub use catalog::SkinCatalog;
pub use matcher::{find_catalog_match, slugify};
pub use types::{Skin, SkinPage};
