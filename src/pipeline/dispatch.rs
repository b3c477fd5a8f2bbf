//! Change dispatch with retry.
//!
//! Changes are sent one at a time, in order. Each one gets up to
//! `max_attempts` tries with exponential backoff. A change the API rejects
//! outright is dropped. Once a change for a job fails otherwise, later
//! changes for the same job are held back so the downstream API never sees
//! them out of order.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::models::{ChangeEvent, PendingChange, RetryConfig};
use crate::services::JobBoard;
use crate::utils::backoff_delay;

/// Result of dispatching a batch of changes.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// Changes accepted downstream
    pub delivered: usize,
    /// Changes of unknown kind that were skipped
    pub skipped: usize,
    /// Changes the API refused permanently; they are not kept
    pub rejected: usize,
    /// Changes held back behind an earlier failure for the same job
    pub deferred: usize,
    /// Failed and deferred changes, in original order
    pub undelivered: Vec<PendingChange>,
}

/// Sends change events to a job board.
pub struct ChangeDispatcher {
    board: Arc<dyn JobBoard>,
    retry: RetryConfig,
}

impl ChangeDispatcher {
    pub fn new(board: Arc<dyn JobBoard>, retry: RetryConfig) -> Self {
        Self { board, retry }
    }

    /// Dispatch one event, retrying with backoff unless it is rejected.
    pub async fn dispatch(&self, event: &ChangeEvent) -> Result<()> {
        let max_attempts = self.retry.max_attempts.max(1);
        let base = Duration::from_millis(self.retry.base_delay_ms);
        let max = Duration::from_millis(self.retry.max_delay_ms);

        let mut attempt = 1;
        loop {
            match self.board.apply(event).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_permanent() || attempt >= max_attempts => return Err(e),
                Err(e) => {
                    let delay = backoff_delay(attempt, base, max);
                    log::warn!(
                        "Dispatch of {} failed (attempt {}/{}): {}. Retrying in {:?}",
                        event,
                        attempt,
                        max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Dispatch a batch sequentially. Failures never abort the batch.
    ///
    /// Each change that fails after all retries has its `failed_cycles`
    /// bumped; deferred changes keep theirs.
    pub async fn dispatch_all(&self, changes: Vec<PendingChange>) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        let mut failed_ids: HashSet<String> = HashSet::new();

        for mut change in changes {
            let Some(id) = change.event.id().map(str::to_string) else {
                log::debug!("Skipping event of unknown kind");
                outcome.skipped += 1;
                continue;
            };

            if failed_ids.contains(&id) {
                log::warn!("Deferring {} behind an earlier failed change", change.event);
                outcome.deferred += 1;
                outcome.undelivered.push(change);
                continue;
            }

            match self.dispatch(&change.event).await {
                Ok(()) => {
                    log::debug!("Dispatched {}", change.event);
                    outcome.delivered += 1;
                }
                Err(e) if e.is_permanent() => {
                    log::error!("Dropping {}: {}", change.event, e);
                    outcome.rejected += 1;
                }
                Err(e) => {
                    log::error!("Error {}: {}", id, e);
                    failed_ids.insert(id);
                    change.failed_cycles += 1;
                    outcome.undelivered.push(change);
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobRecord;
    use crate::testing::RecordingBoard;

    fn no_delay(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    fn pending(events: Vec<ChangeEvent>) -> Vec<PendingChange> {
        events.into_iter().map(PendingChange::new).collect()
    }

    #[tokio::test]
    async fn test_dispatches_in_order() {
        let board = Arc::new(RecordingBoard::new());
        let dispatcher = ChangeDispatcher::new(board.clone(), no_delay(3));

        let outcome = dispatcher
            .dispatch_all(pending(vec![
                ChangeEvent::new_job(JobRecord::new("1", "active")),
                ChangeEvent::updated(JobRecord::new("2", "closed")),
                ChangeEvent::stopped("3"),
            ]))
            .await;

        assert_eq!(outcome.delivered, 3);
        assert!(outcome.undelivered.is_empty());
        assert_eq!(board.attempts(), vec!["new(1)", "updated(2)", "stopped(3)"]);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let board = Arc::new(RecordingBoard::new());
        board.fail("1", 2);
        let dispatcher = ChangeDispatcher::new(board.clone(), no_delay(3));

        dispatcher.dispatch(&ChangeEvent::stopped("1")).await.unwrap();
        assert_eq!(board.attempts().len(), 3);
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_batch() {
        let board = Arc::new(RecordingBoard::new());
        board.fail("1", usize::MAX);
        let dispatcher = ChangeDispatcher::new(board.clone(), no_delay(2));

        let outcome = dispatcher
            .dispatch_all(pending(vec![
                ChangeEvent::stopped("1"),
                ChangeEvent::stopped("2"),
            ]))
            .await;

        assert_eq!(outcome.delivered, 1);
        assert_eq!(
            outcome.undelivered,
            vec![PendingChange {
                event: ChangeEvent::stopped("1"),
                failed_cycles: 1,
            }]
        );
        assert_eq!(board.attempts(), vec!["stopped(1)", "stopped(1)", "stopped(2)"]);
    }

    #[tokio::test]
    async fn test_later_events_for_failed_id_are_deferred() {
        let board = Arc::new(RecordingBoard::new());
        board.fail("1", 1);
        let dispatcher = ChangeDispatcher::new(board.clone(), no_delay(1));

        let events = vec![
            ChangeEvent::new_job(JobRecord::new("1", "active")),
            ChangeEvent::stopped("2"),
            ChangeEvent::stopped("1"),
        ];
        let outcome = dispatcher.dispatch_all(pending(events)).await;

        assert_eq!(outcome.delivered, 1);
        assert_eq!(outcome.deferred, 1);
        assert_eq!(
            outcome
                .undelivered
                .iter()
                .map(|c| (c.event.to_string(), c.failed_cycles))
                .collect::<Vec<_>>(),
            vec![("new(1)".to_string(), 1), ("stopped(1)".to_string(), 0)]
        );
        // The deferred stop was never sent
        assert_eq!(board.attempts(), vec!["new(1)", "stopped(2)"]);
    }

    #[tokio::test]
    async fn test_unknown_events_are_skipped() {
        let board = Arc::new(RecordingBoard::new());
        let dispatcher = ChangeDispatcher::new(board.clone(), no_delay(1));

        let outcome = dispatcher
            .dispatch_all(pending(vec![ChangeEvent::Unknown]))
            .await;
        assert_eq!(outcome.skipped, 1);
        assert!(board.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_change_is_not_retried() {
        let board = Arc::new(RecordingBoard::new());
        board.reject("1", 409);
        let dispatcher = ChangeDispatcher::new(board.clone(), no_delay(3));

        let err = dispatcher
            .dispatch(&ChangeEvent::new_job(JobRecord::new("1", "active")))
            .await
            .unwrap_err();
        assert!(err.is_permanent());
        assert_eq!(board.attempts(), vec!["new(1)"]);
    }

    #[tokio::test]
    async fn test_rejected_change_is_dropped_without_blocking_id() {
        let board = Arc::new(RecordingBoard::new());
        board.reject("1", 409);
        let dispatcher = ChangeDispatcher::new(board.clone(), no_delay(3));

        let outcome = dispatcher
            .dispatch_all(pending(vec![
                ChangeEvent::new_job(JobRecord::new("1", "active")),
                ChangeEvent::stopped("1"),
            ]))
            .await;

        assert_eq!(outcome.rejected, 2);
        assert_eq!(outcome.deferred, 0);
        assert!(outcome.undelivered.is_empty());
        assert_eq!(board.attempts(), vec!["new(1)", "stopped(1)"]);
    }
}
