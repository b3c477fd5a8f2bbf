//! Storage abstractions for sync state persistence.
//!
//! The sync state is the snapshot of last-seen jobs plus the outbox of
//! changes that could not be delivered yet.
//!
//! - [`MemoryStorage`]: keeps nothing; state is lost on restart and every
//!   posting is reported as new again.
//! - [`LocalStorage`]: writes the state as JSON into the storage directory.
//!
//! ```text
//! storage/
//! ├── config.toml           # Sync configuration
//! └── state.json            # Snapshot + pending changes
//! ```

pub mod local;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{PendingChange, Snapshot};

// Re-export for convenience
pub use local::LocalStorage;
pub use memory::MemoryStorage;

/// State carried from one sync cycle to the next.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    /// Last-seen record of every known job
    #[serde(default)]
    pub snapshot: Snapshot,
    /// Changes whose dispatch failed, oldest first
    #[serde(default)]
    pub pending: Vec<PendingChange>,
    /// When the last completed cycle finished
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Trait for sync state storage backends.
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Load the stored state, or an empty one if nothing is stored.
    async fn load_state(&self) -> Result<SyncState>;

    /// Persist the state after a cycle.
    async fn save_state(&self, state: &SyncState) -> Result<()>;
}
