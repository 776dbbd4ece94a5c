#![allow(dead_code)]

use async_trait::async_trait;
use comics_core::{ComicId, Entry};
use comics_crawler::{FetchError, Fetcher};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Serves comics `1..=latest`, failing the ids in `failing` and everything past `latest`.
#[derive(Default)]
pub struct ScriptedFetcher {
    pub latest: ComicId,
    pub failing: HashSet<ComicId>,
    pub cancel_during: Option<(ComicId, CancellationToken)>,
    pub delay: Duration,
    calls: Mutex<Vec<ComicId>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn up_to(latest: ComicId) -> Self {
        Self { latest, ..Self::default() }
    }

    pub fn failing(mut self, ids: &[ComicId]) -> Self {
        self.failing.extend(ids.iter().copied());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn cancel_during(mut self, id: ComicId, token: CancellationToken) -> Self {
        self.cancel_during = Some((id, token));
        self
    }

    pub fn calls(&self) -> Vec<ComicId> {
        let mut calls = self.calls.lock().clone();
        calls.sort_unstable();
        calls
    }

    pub fn max_active(&self) -> usize { self.max_active.load(Ordering::SeqCst) }
}

pub fn comic(id: ComicId) -> Entry {
    Entry::new(format!("https://imgs.example/{id}.png"), vec![format!("word{id}"), "comic".to_string()])
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, id: ComicId) -> Result<(ComicId, Entry), FetchError> {
        self.calls.lock().push(id);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        if let Some((cancel_id, token)) = &self.cancel_during {
            if *cancel_id == id {
                token.cancel();
            }
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if id > self.latest || self.failing.contains(&id) {
            return Err(FetchError::Status { url: format!("mock://{id}/info.0.json"), status: 404 });
        }
        Ok((id, comic(id)))
    }

    async fn latest_id(&self) -> Result<ComicId, FetchError> {
        Ok(self.latest)
    }
}
