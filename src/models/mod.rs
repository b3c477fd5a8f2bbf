// src/models/mod.rs

//! Domain models for the sync application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod change;
mod config;
mod document;
mod job;
mod snapshot;

// Re-export all public types
pub use change::{ChangeEvent, ChangeSummary, PendingChange};
pub use config::{
    ApiConfig, Config, DetectionConfig, FeedConfig, GuardConfig, HttpConfig, OutboxConfig,
    RetryConfig, ScheduleConfig, StorageConfig,
};
pub use document::{FeedDocument, XmlElement};
pub use job::JobRecord;
pub use snapshot::Snapshot;
