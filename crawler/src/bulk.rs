//! Bulk mode: fetch a closed id range in admission waves.
//!
//! Unlike the streaming crawl, failed ids are simply absent from the result
//! and results are keyed by the id each payload reports.

use crate::fetcher::{FetchError, Fetcher};
use comics_core::{ComicId, Entry, EntryUniverse};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;

#[derive(Debug, Error)]
pub enum BulkError {
    #[error("last comic {end} precedes first comic {start}")]
    Range { start: ComicId, end: ComicId },
    #[error("resolving latest comic: {0}")]
    Latest(#[source] FetchError),
}

/// Tasks launched before admission pauses until the whole wave completes.
pub const WAVE_SIZE: usize = 500;

type WaveResult = Result<(ComicId, Entry), (ComicId, FetchError)>;

/// Fetch `[start, end]`. A missing or zero `start` means 1; a missing or zero
/// `end` is resolved to the latest comic id.
pub async fn fetch_range(
    fetcher: Arc<dyn Fetcher>,
    start: Option<ComicId>,
    end: Option<ComicId>,
) -> Result<EntryUniverse, BulkError> {
    fetch_range_in_waves(fetcher, start, end, WAVE_SIZE).await
}

pub async fn fetch_range_in_waves(
    fetcher: Arc<dyn Fetcher>,
    start: Option<ComicId>,
    end: Option<ComicId>,
    wave_size: usize,
) -> Result<EntryUniverse, BulkError> {
    let (start, end) = resolve_range(fetcher.as_ref(), start, end).await?;
    let wave_size = wave_size.max(1);
    tracing::info!(start, end, wave_size, "bulk fetch started");

    let mut comics = EntryUniverse::with_capacity((end - start) as usize + 1);
    let mut wave: JoinSet<WaveResult> = JoinSet::new();
    for id in start..=end {
        let fetcher = fetcher.clone();
        wave.spawn(async move { fetcher.fetch(id).await.map_err(|err| (id, err)) });
        if wave.len() >= wave_size {
            drain_wave(&mut wave, &mut comics).await;
        }
    }
    drain_wave(&mut wave, &mut comics).await;

    let requested = (end - start) as usize + 1;
    tracing::info!(fetched = comics.len(), missing = requested.saturating_sub(comics.len()), "bulk fetch finished");
    Ok(comics)
}

async fn resolve_range(
    fetcher: &dyn Fetcher,
    start: Option<ComicId>,
    end: Option<ComicId>,
) -> Result<(ComicId, ComicId), BulkError> {
    let start = start.filter(|s| *s >= 1).unwrap_or(1);
    let end = match end.filter(|e| *e >= 1) {
        Some(end) => end,
        None => fetcher.latest_id().await.map_err(BulkError::Latest)?,
    };
    if end < start {
        return Err(BulkError::Range { start, end });
    }
    Ok((start, end))
}

async fn drain_wave(wave: &mut JoinSet<WaveResult>, comics: &mut EntryUniverse) {
    while let Some(joined) = wave.join_next().await {
        match joined {
            Ok(Ok((id, entry))) => {
                comics.insert(id, entry);
            }
            Ok(Err((id, err))) => tracing::warn!(id, error = %err, "comic fetch failed"),
            Err(err) => tracing::warn!(error = %err, "fetch task failed"),
        }
    }
}
