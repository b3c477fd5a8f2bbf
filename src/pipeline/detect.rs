//! Change detection against the snapshot.
//!
//! Compares the jobs of a freshly fetched feed with the snapshot of the
//! previous cycle and emits new, updated and stopped events. The snapshot is
//! updated in place so the next cycle compares against this one.

use std::collections::HashSet;

use crate::error::{AppError, Result};
use crate::models::{ChangeEvent, FeedDocument, JobRecord, Snapshot};

/// Element holding the job entries.
const JOBS_ELEMENT: &str = "jobs";

/// Detector for changes between the feed and the snapshot.
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector {
    /// Fields besides `status` whose change counts as an update
    compare_fields: Vec<String>,
}

impl ChangeDetector {
    /// Create a detector that only compares `status`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detector that also compares the given fields.
    pub fn with_compare_fields(compare_fields: Vec<String>) -> Self {
        Self { compare_fields }
    }

    /// Extract job records from a feed document.
    ///
    /// The job list is the root element when it is named `jobs`, otherwise
    /// the first `jobs` child of the root. Every child element of the list is
    /// a job entry.
    pub fn extract_jobs(document: &FeedDocument) -> Result<Vec<JobRecord>> {
        let root = &document.root;
        let list = if root.name == JOBS_ELEMENT {
            root
        } else {
            root.child(JOBS_ELEMENT).ok_or_else(|| {
                AppError::malformed(format!("no <{}> element under <{}>", JOBS_ELEMENT, root.name))
            })?
        };

        list.children.iter().map(JobRecord::from_element).collect()
    }

    /// Compare jobs against the snapshot, updating it in place.
    ///
    /// New and updated events follow feed order; stopped events follow
    /// snapshot (id) order.
    pub fn detect(&self, jobs: Vec<JobRecord>, snapshot: &mut Snapshot) -> Vec<ChangeEvent> {
        let mut events = Vec::new();
        let mut current_ids: HashSet<String> = HashSet::with_capacity(jobs.len());

        for job in jobs {
            current_ids.insert(job.id.clone());

            match snapshot.get(&job.id) {
                None => events.push(ChangeEvent::new_job(job.clone())),
                Some(previous) if job.differs_from(previous, &self.compare_fields) => {
                    events.push(ChangeEvent::updated(job.clone()))
                }
                Some(_) => {}
            }

            snapshot.insert(job);
        }

        let stopped: Vec<String> = snapshot
            .ids()
            .filter(|id| !current_ids.contains(*id))
            .map(str::to_string)
            .collect();

        for id in stopped {
            snapshot.remove(&id);
            events.push(ChangeEvent::stopped(id));
        }

        events
    }

    /// Extract jobs from a document and detect changes.
    ///
    /// A malformed document leaves the snapshot untouched.
    pub fn detect_document(
        &self,
        document: &FeedDocument,
        snapshot: &mut Snapshot,
    ) -> Result<Vec<ChangeEvent>> {
        let jobs = Self::extract_jobs(document)?;
        Ok(self.detect(jobs, snapshot))
    }
}

/// Convenience function to detect changes with the default detector.
pub fn detect_changes(document: &FeedDocument, snapshot: &mut Snapshot) -> Result<Vec<ChangeEvent>> {
    ChangeDetector::new().detect_document(document, snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(jobs: &[(&str, &str)]) -> FeedDocument {
        let body: String = jobs
            .iter()
            .map(|(id, status)| {
                format!("<job><id>{id}</id><status>{status}</status><title>Job {id}</title></job>")
            })
            .collect();
        FeedDocument::parse(&format!("<jobs>{body}</jobs>")).unwrap()
    }

    fn snapshot(jobs: &[(&str, &str)]) -> Snapshot {
        jobs.iter()
            .map(|(id, status)| JobRecord::new(*id, *status))
            .collect()
    }

    #[test]
    fn test_new_job_into_empty_snapshot() {
        let mut snap = Snapshot::new();
        let events = detect_changes(&feed(&[("1", "active")]), &mut snap).unwrap();

        assert_eq!(events.len(), 1);
        match &events[0] {
            ChangeEvent::New { id, job } => {
                assert_eq!(id, "1");
                assert_eq!(job.status, "active");
                assert_eq!(job.fields["title"], "Job 1");
            }
            other => panic!("expected New, got {other:?}"),
        }
        assert_eq!(snap.get("1").unwrap().status, "active");
    }

    #[test]
    fn test_every_unseen_job_is_new() {
        let mut snap = Snapshot::new();
        let events =
            detect_changes(&feed(&[("a", "active"), ("b", "active"), ("c", "closed")]), &mut snap)
                .unwrap();

        let ids: Vec<_> = events.iter().filter_map(ChangeEvent::id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(events.iter().all(|e| matches!(e, ChangeEvent::New { .. })));
    }

    #[test]
    fn test_status_change_is_update() {
        let mut snap = snapshot(&[("1", "active")]);
        let events = detect_changes(&feed(&[("1", "closed")]), &mut snap).unwrap();

        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            ChangeEvent::Updated { id, job } if id == "1" && job.status == "closed"
        ));
        assert_eq!(snap.get("1").unwrap().status, "closed");
    }

    #[test]
    fn test_unchanged_status_emits_nothing() {
        let mut snap = snapshot(&[("1", "active")]);
        let events = detect_changes(&feed(&[("1", "active")]), &mut snap).unwrap();

        assert!(events.is_empty());
        // The stored record is refreshed with the extra fields from the feed
        assert_eq!(snap.get("1").unwrap().fields["title"], "Job 1");
    }

    #[test]
    fn test_missing_job_is_stopped() {
        let mut snap = snapshot(&[("1", "active")]);
        let events = detect_changes(&feed(&[]), &mut snap).unwrap();

        assert_eq!(events, vec![ChangeEvent::stopped("1")]);
        assert!(snap.is_empty());
    }

    #[test]
    fn test_mixed_changes() {
        let mut snap = snapshot(&[("keep", "active"), ("flip", "active"), ("gone", "active")]);
        let events = detect_changes(
            &feed(&[("keep", "active"), ("flip", "closed"), ("fresh", "active")]),
            &mut snap,
        )
        .unwrap();

        let kinds: Vec<String> = events.iter().map(ToString::to_string).collect();
        assert_eq!(kinds, vec!["updated(flip)", "new(fresh)", "stopped(gone)"]);
        assert_eq!(snap.ids().collect::<Vec<_>>(), vec!["flip", "fresh", "keep"]);
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let document = feed(&[("1", "active"), ("2", "closed")]);
        let mut snap = Snapshot::new();

        assert_eq!(detect_changes(&document, &mut snap).unwrap().len(), 2);
        assert!(detect_changes(&document, &mut snap).unwrap().is_empty());
    }

    #[test]
    fn test_compare_fields_opt_in() {
        let mut snap = Snapshot::new();
        let detector = ChangeDetector::with_compare_fields(vec!["title".to_string()]);
        detector
            .detect_document(&feed(&[("1", "active")]), &mut snap)
            .unwrap();

        let renamed = FeedDocument::parse(
            "<jobs><job><id>1</id><status>active</status><title>Renamed</title></job></jobs>",
        )
        .unwrap();

        let mut plain = snap.clone();
        assert!(detect_changes(&renamed, &mut plain).unwrap().is_empty());

        let events = detector.detect_document(&renamed, &mut snap).unwrap();
        assert!(matches!(&events[0], ChangeEvent::Updated { .. }));
    }

    #[test]
    fn test_nested_jobs_element() {
        let document = FeedDocument::parse(
            "<feed><meta>x</meta><jobs><job><id>1</id><status>active</status></job></jobs></feed>",
        )
        .unwrap();

        let jobs = ChangeDetector::extract_jobs(&document).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, "1");
    }

    #[test]
    fn test_malformed_feed_leaves_snapshot_untouched() {
        let mut snap = snapshot(&[("1", "active")]);
        let before = snap.clone();

        let no_jobs = FeedDocument::parse("<feed><items/></feed>").unwrap();
        assert!(matches!(
            detect_changes(&no_jobs, &mut snap),
            Err(AppError::MalformedFeed(_))
        ));

        let missing_status = FeedDocument::parse(
            "<jobs><job><id>2</id><status>active</status></job><job><id>3</id></job></jobs>",
        )
        .unwrap();
        assert!(detect_changes(&missing_status, &mut snap).is_err());

        assert_eq!(snap, before);
    }
}
