//! Feed ingestion engine.
//!
//! Remote RSS documents flow one way into the post store:
//!
//! - [`scheduler`] - Fixed-interval loop picking the most stale feed each tick
//! - [`fetcher`] - HTTP retrieval with a per-fetch timeout and body size cap
//! - [`parser`] - RSS 2.0 decoding via the `rss` crate, plus HTML entity unescaping
//! - [`ingestor`] - Writes each item as a post, skipping urls already stored
//! - [`dates`] - Publish-date normalization with an explicit estimated flag
//!
//! # Example
//!
//! ```ignore
//! use gator::feed::{run_ingestion_loop, FeedFetcher, DEFAULT_FETCH_TIMEOUT, DEFAULT_USER_AGENT};
//!
//! let fetcher = FeedFetcher::new(DEFAULT_USER_AGENT, DEFAULT_FETCH_TIMEOUT)?;
//! run_ingestion_loop(db, fetcher, "1m", tokio::signal::ctrl_c().map(|_| ())).await?;
//! ```

pub mod dates;
pub mod fetcher;
pub mod ingestor;
pub mod parser;
pub mod scheduler;

pub use dates::{normalize_published, PublishedAt};
pub use fetcher::{FeedFetcher, FetchError, DEFAULT_FETCH_TIMEOUT, DEFAULT_USER_AGENT};
pub use ingestor::{ingest_feed, IngestSummary};
pub use parser::{parse_rss, ParseError, RawFeedItem, RssChannel, RssFeed};
pub use scheduler::{run_ingestion_loop, CycleOutcome, Scheduler};
