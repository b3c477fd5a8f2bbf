// src/pipeline/sync.rs

//! One sync cycle: fetch → detect → dispatch.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::models::{ChangeSummary, Config, OutboxConfig, PendingChange};
use crate::services::{FeedFetcher, FeedSource, JobBoardClient};
use crate::storage::{SyncState, SyncStore};
use crate::utils::http;

use super::circuit_breaker::CircuitBreaker;
use super::detect::ChangeDetector;
use super::dispatch::ChangeDispatcher;

/// Summary of a sync cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Whether the feed could be fetched; `false` means the cycle was skipped
    pub fetched: bool,
    /// Jobs listed in the feed
    pub job_count: usize,
    /// Changes detected in this cycle
    pub changes: ChangeSummary,
    /// Outbox events re-sent from earlier cycles
    pub retried: usize,
    pub delivered: usize,
    pub skipped: usize,
    /// Events the API refused permanently
    pub rejected: usize,
    /// Events dropped after failing for `outbox.max_cycles` cycles
    pub expired: usize,
    /// Events left in the outbox afterwards
    pub pending: usize,
}

impl CycleReport {
    fn skipped(started_at: DateTime<Utc>, pending: usize) -> Self {
        Self {
            started_at,
            finished_at: Utc::now(),
            fetched: false,
            job_count: 0,
            changes: ChangeSummary::default(),
            retried: 0,
            delivered: 0,
            skipped: 0,
            rejected: 0,
            expired: 0,
            pending,
        }
    }
}

/// The fetch → detect → dispatch pipeline.
pub struct SyncPipeline {
    source: Arc<dyn FeedSource>,
    detector: ChangeDetector,
    dispatcher: ChangeDispatcher,
    circuit_breaker: Option<CircuitBreaker>,
    outbox: OutboxConfig,
    store: Arc<dyn SyncStore>,
}

impl SyncPipeline {
    /// Create a pipeline with the default detector and outbox.
    pub fn new(
        source: Arc<dyn FeedSource>,
        dispatcher: ChangeDispatcher,
        store: Arc<dyn SyncStore>,
    ) -> Self {
        Self {
            source,
            detector: ChangeDetector::new(),
            dispatcher,
            circuit_breaker: None,
            outbox: OutboxConfig::default(),
            store,
        }
    }

    /// Build the HTTP-backed pipeline described by the configuration.
    pub fn from_config(config: &Config, store: Arc<dyn SyncStore>) -> Result<Self> {
        let client = http::create_async_client(&config.http)?;
        let fetcher = FeedFetcher::new(client.clone(), &config.feed.url);
        let board = JobBoardClient::new(client, &config.api)?;
        let dispatcher = ChangeDispatcher::new(Arc::new(board), config.retry.clone());

        let mut pipeline = Self::new(Arc::new(fetcher), dispatcher, store)
            .with_detector(ChangeDetector::with_compare_fields(
                config.detection.compare_fields.clone(),
            ))
            .with_outbox(config.outbox.clone());

        if config.guard.enabled {
            pipeline = pipeline.with_circuit_breaker(CircuitBreaker::with_config(&config.guard));
        }

        Ok(pipeline)
    }

    pub fn with_detector(mut self, detector: ChangeDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: CircuitBreaker) -> Self {
        self.circuit_breaker = Some(circuit_breaker);
        self
    }

    pub fn with_outbox(mut self, outbox: OutboxConfig) -> Self {
        self.outbox = outbox;
        self
    }

    pub fn store(&self) -> &Arc<dyn SyncStore> {
        &self.store
    }

    /// Run one cycle against the given state.
    ///
    /// If the feed cannot be fetched the cycle is skipped and the state is
    /// left as is. A malformed feed or a tripped circuit breaker returns an
    /// error, also without touching the state.
    pub async fn run_cycle(&self, state: &mut SyncState) -> Result<CycleReport> {
        let started_at = Utc::now();

        let Some(document) = self.source.fetch().await else {
            log::warn!("Feed unavailable, skipping cycle");
            return Ok(CycleReport::skipped(started_at, state.pending.len()));
        };

        let jobs = ChangeDetector::extract_jobs(&document)?;
        let job_count = jobs.len();

        if let Some(circuit_breaker) = &self.circuit_breaker {
            circuit_breaker.validate(job_count, state.snapshot.len())?;
        }

        let events = self.detector.detect(jobs, &mut state.snapshot);
        let changes = ChangeSummary::from_events(&events);
        if changes.has_changes() {
            log::info!(
                "Changes: {} new, {} updated, {} stopped",
                changes.new,
                changes.updated,
                changes.stopped
            );
        } else {
            log::info!("No changes in {} jobs", job_count);
        }

        let mut queue = std::mem::take(&mut state.pending);
        let retried = queue.len();
        if retried > 0 {
            log::info!("Retrying {} pending changes first", retried);
        }
        queue.extend(events.into_iter().map(PendingChange::new));

        let outcome = self.dispatcher.dispatch_all(queue).await;
        let (pending, expired) = self.keep_undelivered(outcome.undelivered);
        state.pending = pending;
        state.updated_at = Some(Utc::now());

        self.store.save_state(state).await?;

        Ok(CycleReport {
            started_at,
            finished_at: Utc::now(),
            fetched: true,
            job_count,
            changes,
            retried,
            delivered: outcome.delivered,
            skipped: outcome.skipped,
            rejected: outcome.rejected,
            expired,
            pending: state.pending.len(),
        })
    }

    /// Apply the outbox policy to undelivered events.
    ///
    /// Returns the events to keep and how many expired.
    fn keep_undelivered(&self, undelivered: Vec<PendingChange>) -> (Vec<PendingChange>, usize) {
        if undelivered.is_empty() {
            return (undelivered, 0);
        }

        if !self.outbox.enabled {
            log::warn!(
                "Dropping {} undelivered changes (outbox disabled)",
                undelivered.len()
            );
            return (Vec::new(), 0);
        }

        let (expired, mut kept): (Vec<_>, Vec<_>) = undelivered
            .into_iter()
            .partition(|change| change.failed_cycles >= self.outbox.max_cycles);
        for change in &expired {
            log::error!(
                "Giving up on {} after {} failed cycles",
                change.event,
                change.failed_cycles
            );
        }

        if kept.len() > self.outbox.max_pending {
            let overflow = kept.len() - self.outbox.max_pending;
            log::warn!(
                "Outbox full: dropping {} oldest pending changes",
                overflow
            );
            kept.drain(..overflow);
        }

        if !kept.is_empty() {
            log::warn!("{} changes pending for the next cycle", kept.len());
        }
        (kept, expired.len())
    }
}
