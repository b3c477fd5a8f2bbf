//! Last-seen state of every known job.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::JobRecord;

/// Mapping from job id to the last-seen record, ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    jobs: BTreeMap<String, JobRecord>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&JobRecord> {
        self.jobs.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.jobs.contains_key(id)
    }

    /// Store a record under its id, returning the previous one.
    pub fn insert(&mut self, job: JobRecord) -> Option<JobRecord> {
        self.jobs.insert(job.id.clone(), job)
    }

    pub fn remove(&mut self, id: &str) -> Option<JobRecord> {
        self.jobs.remove(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.jobs.keys().map(String::as_str)
    }
}

impl FromIterator<JobRecord> for Snapshot {
    fn from_iter<I: IntoIterator<Item = JobRecord>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for job in iter {
            snapshot.insert(job);
        }
        snapshot
    }
}
