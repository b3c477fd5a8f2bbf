//! Non-persistent storage.

use async_trait::async_trait;

use crate::error::Result;
use crate::storage::{SyncState, SyncStore};

/// Storage backend that keeps nothing between restarts.
///
/// The live state is owned by the scheduler, so saving is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryStorage;

impl MemoryStorage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SyncStore for MemoryStorage {
    async fn load_state(&self) -> Result<SyncState> {
        Ok(SyncState::new())
    }

    async fn save_state(&self, state: &SyncState) -> Result<()> {
        log::debug!(
            "State kept in memory only ({} jobs, {} pending)",
            state.snapshot.len(),
            state.pending.len()
        );
        Ok(())
    }
}
