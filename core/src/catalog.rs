//! Live catalog of comics: the authoritative universe, its inverted index,
//! and the full-refresh update that replaces both.
//!
//! The live state is an immutable [`Snapshot`] behind an `Arc`. Updates build
//! the next snapshot off to the side and swap the reference, so a search runs
//! against whichever snapshot was current when it started and never sees an
//! index that belongs to a different universe.

use crate::{ComicId, Entry, EntryUniverse, InvertedIndex};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Produces a brand-new, complete universe on demand.
#[async_trait]
pub trait Filler: Send + Sync {
    async fn fill_missed_comics(&self, cancel: &CancellationToken) -> anyhow::Result<EntryUniverse>;
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("refreshing comics failed: {0:#}")]
    Fill(anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpdateDiff {
    #[serde(rename = "new")]
    pub new_count: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hit {
    pub id: ComicId,
    pub url: String,
}

/// A universe together with the index derived from it.
#[derive(Debug, Default)]
pub struct Snapshot {
    entries: EntryUniverse,
    index: InvertedIndex,
}

impl Snapshot {
    pub fn new(entries: EntryUniverse) -> Self {
        let index = InvertedIndex::build(&entries);
        Self { entries, index }
    }

    pub fn entries(&self) -> &EntryUniverse { &self.entries }

    pub fn index(&self) -> &InvertedIndex { &self.index }

    pub fn find_by_index<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<ComicId> {
        self.index.find(tokens)
    }

    pub fn hit(&self, id: ComicId) -> Option<Hit> {
        self.entries.get(&id).map(|e| Hit { id, url: e.url.clone() })
    }
}

pub struct Catalog {
    current: RwLock<Arc<Snapshot>>,
    // serializes diff + swap between concurrent updates
    transition: Mutex<()>,
    filler: Arc<dyn Filler>,
}

impl Catalog {
    pub fn new(entries: EntryUniverse, filler: Arc<dyn Filler>) -> Self {
        let snapshot = Snapshot::new(entries);
        tracing::info!(comics = snapshot.entries.len(), terms = snapshot.index.num_terms(), "catalog index built");
        Self { current: RwLock::new(Arc::new(snapshot)), transition: Mutex::new(()), filler }
    }

    /// The snapshot current at the time of the call.
    pub fn snapshot(&self) -> Arc<Snapshot> { self.current.read().clone() }

    pub fn len(&self) -> usize { self.snapshot().entries.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn get(&self, id: ComicId) -> Option<Entry> { self.snapshot().entries.get(&id).cloned() }

    /// Ids of the comics containing any of the tokens, deduplicated, no ranking.
    pub fn find_by_index<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<ComicId> {
        self.snapshot().find_by_index(tokens)
    }

    /// Union search resolved to image urls from a single snapshot. Returns the
    /// number of matching comics and the first `limit` of them.
    pub fn search<S: AsRef<str>>(&self, tokens: &[S], limit: usize) -> (usize, Vec<Hit>) {
        let snapshot = self.snapshot();
        let ids = snapshot.find_by_index(tokens);
        let hits = ids.iter().filter_map(|id| snapshot.hit(*id)).take(limit).collect();
        (ids.len(), hits)
    }

    /// Full refresh through the filler. The live state is replaced only when
    /// the new universe differs from the old one; on error it is left as is.
    pub async fn update_comics(&self, cancel: &CancellationToken) -> Result<UpdateDiff, CatalogError> {
        let updated = self.filler.fill_missed_comics(cancel).await.map_err(CatalogError::Fill)?;
        Ok(self.install(updated))
    }

    fn install(&self, updated: EntryUniverse) -> UpdateDiff {
        let _guard = self.transition.lock();
        let old = self.snapshot();
        let diff = UpdateDiff { new_count: count_changed(&old.entries, &updated), total: updated.len() };
        if updated != old.entries {
            let next = Arc::new(Snapshot::new(updated));
            *self.current.write() = next;
            tracing::info!(new = diff.new_count, total = diff.total, "catalog replaced");
        } else {
            tracing::info!(total = diff.total, "catalog unchanged");
        }
        diff
    }
}

/// Ids of `new` whose keywords differ from `old`; ids absent from `old` count.
fn count_changed(old: &EntryUniverse, new: &EntryUniverse) -> usize {
    new.iter()
        .filter(|(id, entry)| old.get(*id).map_or(true, |prev| prev.keywords != entry.keywords))
        .count()
}
