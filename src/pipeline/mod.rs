//! Pipeline entry points for sync operations.
//!
//! - `SyncPipeline::run_cycle`: one fetch → detect → dispatch pass
//! - `start_scheduler`: run the pipeline on a cron schedule

pub mod circuit_breaker;
pub mod detect;
pub mod dispatch;
pub mod schedule;
pub mod sync;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerResult};
pub use detect::{ChangeDetector, detect_changes};
pub use dispatch::{ChangeDispatcher, DispatchOutcome};
pub use schedule::{normalize_cron, run_guarded, start_scheduler};
pub use sync::{CycleReport, SyncPipeline};
