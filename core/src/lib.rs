use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod catalog;
pub mod index;
pub mod persist;
pub mod tokenizer;

pub use catalog::{Catalog, CatalogError, Filler, Hit, Snapshot, UpdateDiff};
pub use index::InvertedIndex;
pub use persist::{MemoryStore, SledStore, Store, StoreError};

/// Position of a comic in the remote sequence, assigned by the source.
pub type ComicId = u32;

/// The complete set of known entries at one point in time.
pub type EntryUniverse = HashMap<ComicId, Entry>;

/// Normalized representation of one comic.
///
/// An entry with an empty `url` is the fetch-failure sentinel: it marks an id
/// that could not be fetched and is never indexed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub url: String,
    pub keywords: Vec<String>,
}

impl Entry {
    pub fn new(url: impl Into<String>, keywords: Vec<String>) -> Self {
        Self { url: url.into(), keywords }
    }

    pub fn sentinel() -> Self { Self::default() }

    pub fn is_sentinel(&self) -> bool { self.url.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_distinct_from_empty_keywords() {
        assert!(Entry::sentinel().is_sentinel());
        let blank = Entry::new("https://imgs.example/blank.png", vec![]);
        assert!(!blank.is_sentinel());
    }
}
