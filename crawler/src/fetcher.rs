use async_trait::async_trait;
use comics_core::tokenizer::normalize_text;
use comics_core::{ComicId, Entry};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Failure to fetch one comic. Every variant is worth retrying later; the
/// fetcher itself never retries.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid source url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} answered {status}")]
    Status { url: String, status: u16 },
    #[error("malformed comic payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Retrieves comic metadata from the remote source.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch one comic, returning the id reported by the payload and its normalized entry.
    async fn fetch(&self, id: ComicId) -> Result<(ComicId, Entry), FetchError>;

    /// Id of the most recent comic published by the source.
    async fn latest_id(&self) -> Result<ComicId, FetchError>;
}

#[derive(Debug, Deserialize)]
pub struct ComicInfo {
    pub num: ComicId,
    #[serde(default)]
    pub img: String,
    #[serde(default)]
    pub safe_title: String,
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub alt: String,
}

impl ComicInfo {
    pub fn into_entry(self) -> (ComicId, Entry) {
        let text = [self.safe_title.as_str(), self.transcript.as_str(), self.alt.as_str()].join(" ");
        (self.num, Entry::new(self.img, normalize_text(&text)))
    }
}

/// Fetcher for an xkcd-style source: `{base}/{id}/info.0.json` per comic and
/// `{base}/info.0.json` for the latest one.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    base: Url,
}

impl HttpFetcher {
    pub fn new(source_url: &str, timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let mut base = Url::parse(source_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, base })
    }

    fn info_url(&self, id: Option<ComicId>) -> Result<Url, FetchError> {
        let rel = match id {
            Some(id) => format!("{id}/info.0.json"),
            None => "info.0.json".to_string(),
        };
        Ok(self.base.join(&rel)?)
    }

    async fn get_info(&self, url: Url) -> Result<ComicInfo, FetchError> {
        let resp = self.client.get(url.clone()).send().await?;
        if !resp.status().is_success() {
            return Err(FetchError::Status { url: url.to_string(), status: resp.status().as_u16() });
        }
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, id: ComicId) -> Result<(ComicId, Entry), FetchError> {
        let url = self.info_url(Some(id))?;
        tracing::debug!(%url, "fetching comic");
        Ok(self.get_info(url).await?.into_entry())
    }

    async fn latest_id(&self) -> Result<ComicId, FetchError> {
        let url = self.info_url(None)?;
        Ok(self.get_info(url).await?.num)
    }
}
