//! Change events produced by comparing a feed against the snapshot.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::JobRecord;

/// A difference between the current feed and the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// Posting not seen before
    New { id: String, job: JobRecord },
    /// Posting whose meaningful fields changed
    Updated { id: String, job: JobRecord },
    /// Posting no longer in the feed
    Stopped { id: String },
    /// Event kind this version does not know about (e.g. from a newer outbox)
    #[serde(other)]
    Unknown,
}

impl ChangeEvent {
    pub fn new_job(job: JobRecord) -> Self {
        Self::New {
            id: job.id.clone(),
            job,
        }
    }

    pub fn updated(job: JobRecord) -> Self {
        Self::Updated {
            id: job.id.clone(),
            job,
        }
    }

    pub fn stopped(id: impl Into<String>) -> Self {
        Self::Stopped { id: id.into() }
    }

    /// Job id the event refers to.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::New { id, .. } | Self::Updated { id, .. } | Self::Stopped { id } => Some(id),
            Self::Unknown => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::New { .. } => "new",
            Self::Updated { .. } => "updated",
            Self::Stopped { .. } => "stopped",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.id().unwrap_or("?"))
    }
}

/// A change waiting in the outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChange {
    pub event: ChangeEvent,
    /// Cycles in which sending this change failed
    #[serde(default)]
    pub failed_cycles: u32,
}

impl PendingChange {
    pub fn new(event: ChangeEvent) -> Self {
        Self {
            event,
            failed_cycles: 0,
        }
    }
}

impl From<ChangeEvent> for PendingChange {
    fn from(event: ChangeEvent) -> Self {
        Self::new(event)
    }
}

/// Per-kind counts for a batch of events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub new: usize,
    pub updated: usize,
    pub stopped: usize,
}

impl ChangeSummary {
    pub fn from_events(events: &[ChangeEvent]) -> Self {
        let mut summary = Self::default();
        for event in events {
            match event {
                ChangeEvent::New { .. } => summary.new += 1,
                ChangeEvent::Updated { .. } => summary.updated += 1,
                ChangeEvent::Stopped { .. } => summary.stopped += 1,
                ChangeEvent::Unknown => {}
            }
        }
        summary
    }

    /// Check if there are any changes.
    pub fn has_changes(&self) -> bool {
        self.change_count() > 0
    }

    /// Get the total number of changes.
    pub fn change_count(&self) -> usize {
        self.new + self.updated + self.stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_serialization() {
        let event = ChangeEvent::stopped("9");
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"stopped","id":"9"}"#);
    }

    #[test]
    fn test_unknown_kind_deserializes() {
        let event: ChangeEvent = serde_json::from_str(r#"{"type":"archived","id":"9"}"#).unwrap();
        assert_eq!(event, ChangeEvent::Unknown);
        assert_eq!(event.id(), None);
    }

    #[test]
    fn test_pending_change_defaults_failed_cycles() {
        let pending: PendingChange =
            serde_json::from_str(r#"{"event":{"type":"stopped","id":"9"}}"#).unwrap();
        assert_eq!(pending, PendingChange::new(ChangeEvent::stopped("9")));
    }

    #[test]
    fn test_summary_counts() {
        let events = vec![
            ChangeEvent::new_job(JobRecord::new("1", "active")),
            ChangeEvent::new_job(JobRecord::new("2", "active")),
            ChangeEvent::updated(JobRecord::new("3", "closed")),
            ChangeEvent::stopped("4"),
        ];

        let summary = ChangeSummary::from_events(&events);
        assert_eq!(summary.new, 2);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.stopped, 1);
        assert_eq!(summary.change_count(), 4);
        assert!(summary.has_changes());
        assert_eq!(events[3].to_string(), "stopped(4)");
    }
}
