//! Circuit Breaker pattern implementation.
//!
//! Prevents mass deletions downstream by aborting a cycle when the feed's job
//! count drops sharply compared to the snapshot. A feed that suddenly lists
//! nothing is far more likely broken than empty.

use crate::error::{AppError, Result};
use crate::models::GuardConfig;

/// Circuit breaker for preventing bad feeds from propagating.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    max_drop_percent: u8,
    min_baseline: usize,
}

/// Result of circuit breaker check.
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitBreakerResult {
    /// Safe to proceed
    Safe {
        current_count: usize,
        previous_count: usize,
    },
    /// Empty or small snapshot - nothing to compare against
    ColdStart { current_count: usize },
    /// Circuit breaker triggered - abort cycle
    Triggered {
        current_count: usize,
        previous_count: usize,
        drop_percent: f64,
    },
    /// Empty feed while the snapshot is not
    EmptyResult,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default thresholds.
    pub fn new() -> Self {
        Self::with_config(&GuardConfig::default())
    }

    /// Create a circuit breaker from guard settings.
    pub fn with_config(config: &GuardConfig) -> Self {
        Self {
            max_drop_percent: config.max_drop_percent,
            min_baseline: config.min_baseline,
        }
    }

    /// Compare the feed's job count with the snapshot size.
    pub fn check(&self, current_count: usize, previous_count: usize) -> CircuitBreakerResult {
        // Case 1: Empty feed
        if current_count == 0 {
            if previous_count == 0 {
                return CircuitBreakerResult::ColdStart { current_count };
            }
            return CircuitBreakerResult::EmptyResult;
        }

        // Case 2: Cold start (no previous data or below baseline)
        if previous_count < self.min_baseline {
            return CircuitBreakerResult::ColdStart { current_count };
        }

        // Case 3: Check drop percentage
        if current_count < previous_count {
            let drop = previous_count - current_count;
            let drop_percent = (drop as f64 / previous_count as f64) * 100.0;

            if drop_percent > self.max_drop_percent as f64 {
                return CircuitBreakerResult::Triggered {
                    current_count,
                    previous_count,
                    drop_percent,
                };
            }
        }

        CircuitBreakerResult::Safe {
            current_count,
            previous_count,
        }
    }

    /// Validate and return Ok if safe, Err if circuit breaker triggered.
    pub fn validate(&self, current_count: usize, previous_count: usize) -> Result<()> {
        match self.check(current_count, previous_count) {
            CircuitBreakerResult::Safe {
                current_count,
                previous_count,
            } => {
                log::debug!(
                    "Circuit breaker: SAFE ({} jobs, was {})",
                    current_count,
                    previous_count
                );
                Ok(())
            }
            CircuitBreakerResult::ColdStart { current_count } => {
                log::debug!(
                    "Circuit breaker: COLD START ({} jobs, snapshot below baseline)",
                    current_count
                );
                Ok(())
            }
            CircuitBreakerResult::Triggered {
                current_count,
                previous_count,
                drop_percent,
            } => {
                log::error!(
                    "Circuit breaker: TRIGGERED! {} → {} jobs ({:.1}% drop > {}% threshold)",
                    previous_count,
                    current_count,
                    drop_percent,
                    self.max_drop_percent
                );
                Err(AppError::CircuitBreakerTriggered {
                    current_count,
                    previous_count,
                    drop_percent,
                    threshold_percent: self.max_drop_percent,
                })
            }
            CircuitBreakerResult::EmptyResult => {
                log::error!("Circuit breaker: EMPTY FEED - aborting cycle");
                Err(AppError::EmptyFeed)
            }
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}
