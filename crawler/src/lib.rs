pub mod bulk;
pub mod fetcher;
pub mod filler;
pub mod pool;

pub use bulk::{BulkError, fetch_range, fetch_range_in_waves, WAVE_SIZE};
pub use fetcher::{ComicInfo, FetchError, Fetcher, HttpFetcher};
pub use filler::{load_cached, CrawlFiller};
pub use pool::{CrawlError, CrawlOutcome, WorkerPool, DEFAULT_CONCURRENCY};
