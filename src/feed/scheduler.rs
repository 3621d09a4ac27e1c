//! Fixed-interval ingestion loop.
//!
//! Each tick fetches exactly one feed, the most stale one, so every feed is
//! revisited in turn without any per-feed bookkeeping beyond `last_fetched_at`.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::config::{parse_interval, ConfigError};
use crate::feed::fetcher::{FeedFetcher, FetchError};
use crate::feed::ingestor::{ingest_feed, IngestSummary};
use crate::storage::{Database, DatabaseError, Feed};

/// Cycles between sweeps of turn records for feeds deleted while the loop runs
const PRUNE_EVERY: u64 = 64;

/// What one cycle did.
#[derive(Debug)]
pub enum CycleOutcome {
    /// No feed was eligible
    Idle,
    /// The feed could not be fetched; it was not marked fetched
    FetchFailed { feed_id: Uuid, error: FetchError },
    /// The feed was fetched, marked and its items ingested
    Ingested { feed_id: Uuid, summary: IngestSummary },
    /// Feed selection failed
    StoreError(DatabaseError),
}

pub struct Scheduler {
    db: Database,
    fetcher: FeedFetcher,
    period: Duration,
    /// Cycles started so far
    cycle: u64,
    /// Cycle of each feed's latest fetch attempt in this process
    last_turn: HashMap<Uuid, u64>,
    /// Feeds whose latest fetch failed. They keep their `last_fetched_at`, so the
    /// store would offer them again at once; instead they queue behind every feed
    /// whose turn came earlier, and one unreachable feed cannot monopolise the loop.
    failed: HashSet<Uuid>,
}

impl Scheduler {
    /// Fails with [`ConfigError::InvalidInterval`] if `interval` is unparsable or not positive.
    pub fn new(db: Database, fetcher: FeedFetcher, interval: &str) -> Result<Self, ConfigError> {
        let period = parse_interval(interval)?;
        Ok(Self {
            db,
            fetcher,
            period,
            cycle: 0,
            last_turn: HashMap::new(),
            failed: HashSet::new(),
        })
    }

    /// Tick until `shutdown` resolves. Returns the number of completed cycles.
    ///
    /// The first tick fires immediately. A cycle that overruns the period delays
    /// the next tick rather than overlapping it. `shutdown` is raced against both
    /// the wait and the cycle itself, so an in-flight fetch is dropped as soon as
    /// it fires.
    pub async fn run<F>(&mut self, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut cycles = 0;
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, abandoning in-flight cycle");
                    break;
                }
                _ = self.run_cycle() => cycles += 1,
            }
        }

        tracing::info!(cycles, "Ingestion loop stopped");
        cycles
    }

    /// Select the most stale feed, fetch it, mark it fetched and ingest its items.
    ///
    /// Never returns an error: every failure is logged and reported in the outcome.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let feed = match self.next_feed().await {
            Ok(Some(feed)) => feed,
            Ok(None) => {
                tracing::debug!("No feeds to fetch");
                self.last_turn.clear();
                self.failed.clear();
                return CycleOutcome::Idle;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to select next feed");
                return CycleOutcome::StoreError(e);
            }
        };

        self.cycle += 1;
        if self.cycle % PRUNE_EVERY == 0 {
            if let Err(e) = self.prune_deleted_feeds().await {
                tracing::warn!(error = %e, "Failed to prune deleted feeds");
            }
        }
        self.last_turn.insert(feed.id, self.cycle);
        tracing::info!(feed = %feed.name, url = %feed.url, "Fetching feed");

        let rss = match self.fetcher.fetch(&feed.url).await {
            Ok(rss) => rss,
            Err(error) => {
                tracing::warn!(feed = %feed.name, url = %feed.url, error = %error, "Failed to fetch feed");
                self.failed.insert(feed.id);
                return CycleOutcome::FetchFailed {
                    feed_id: feed.id,
                    error,
                };
            }
        };
        self.failed.remove(&feed.id);

        if let Err(e) = self.db.mark_fetched(feed.id, Utc::now()).await {
            tracing::warn!(feed = %feed.name, error = %e, "Failed to mark feed fetched");
        }

        let summary = ingest_feed(&self.db, feed.id, &rss).await;
        tracing::info!(
            feed = %feed.name,
            items = rss.channel.items.len(),
            created = summary.created,
            duplicates = summary.duplicates,
            skipped = summary.skipped,
            failed = summary.failed,
            "Feed ingested"
        );

        CycleOutcome::Ingested {
            feed_id: feed.id,
            summary,
        }
    }

    async fn next_feed(&mut self) -> Result<Option<Feed>, DatabaseError> {
        loop {
            let exclude: Vec<Uuid> = self.failed.iter().copied().collect();
            let candidate = self.db.select_most_stale_feed_excluding(&exclude).await?;

            let Some((retry_id, retry_turn)) = self
                .failed
                .iter()
                .map(|id| (*id, self.turn_of(id)))
                .min_by_key(|(_, turn)| *turn)
            else {
                return Ok(candidate);
            };

            if let Some(feed) = &candidate {
                if self.turn_of(&feed.id) < retry_turn {
                    return Ok(candidate);
                }
            }

            match self.db.get_feed_by_id(retry_id).await? {
                Some(feed) => return Ok(Some(feed)),
                // Deleted since it failed
                None => {
                    self.failed.remove(&retry_id);
                    self.last_turn.remove(&retry_id);
                }
            }
        }
    }

    /// Forget feeds that no longer exist in the store.
    async fn prune_deleted_feeds(&mut self) -> Result<(), DatabaseError> {
        let known: Vec<Uuid> = self.last_turn.keys().copied().collect();
        for id in known {
            if self.db.get_feed_by_id(id).await?.is_none() {
                self.last_turn.remove(&id);
                self.failed.remove(&id);
            }
        }
        Ok(())
    }

    fn turn_of(&self, feed_id: &Uuid) -> u64 {
        self.last_turn.get(feed_id).copied().unwrap_or(0)
    }
}

/// Run the ingestion loop until `shutdown` resolves.
///
/// Only an invalid interval is reported as an error; everything that goes wrong
/// inside a cycle is logged and the loop carries on.
pub async fn run_ingestion_loop<F>(
    db: Database,
    fetcher: FeedFetcher,
    interval: &str,
    shutdown: F,
) -> Result<(), ConfigError>
where
    F: Future<Output = ()>,
{
    let mut scheduler = Scheduler::new(db, fetcher, interval)?;
    println!("Collecting feeds every {}", interval.trim());
    scheduler.run(shutdown).await;
    Ok(())
}
