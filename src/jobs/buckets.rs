use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::job::{Bucket, OperationJob};
use crate::identifiers::JobId;

/// Build/preview jobs grouped by lifecycle bucket.
///
/// Updates return a new value and leave `self` untouched, so a view rendered
/// from an older `JobBuckets` stays consistent while the next one is built.
/// Within a bucket jobs keep arrival order; the last successful job is the
/// one whose preview is shown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobBuckets {
    buckets: [Vec<OperationJob>; 4],
}

fn idx_for(bucket: Bucket) -> usize {
    match bucket {
        Bucket::Running => 0,
        Bucket::Crashed => 1,
        Bucket::Failed => 2,
        Bucket::Successful => 3,
    }
}

impl JobBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds buckets from an authoritative listing. Duplicate ids collapse to
    /// their first occurrence so the exclusivity invariant holds even if the
    /// server repeats a job.
    pub fn from_listing<I>(listing: I) -> Self
    where
        I: IntoIterator<Item = (Bucket, Vec<OperationJob>)>,
    {
        let mut seeded = Self::default();
        for (bucket, jobs) in listing {
            for job in jobs {
                if seeded.bucket_of(&job.id).is_none() {
                    seeded.buckets[idx_for(bucket)].push(job);
                }
            }
        }
        seeded
    }

    /// Files `job` under `bucket` unless a job with the same id is already
    /// there.
    pub fn add_to_bucket(&self, bucket: Bucket, job: OperationJob) -> Self {
        if self.contains(bucket, &job.id) {
            return self.clone();
        }
        let mut next = self.clone();
        next.buckets[idx_for(bucket)].push(job);
        next
    }

    /// Drops the job with `job_id` from `bucket`; a missing id is a no-op.
    pub fn remove_from_bucket(&self, bucket: Bucket, job_id: &JobId) -> Self {
        let mut next = self.clone();
        next.buckets[idx_for(bucket)].retain(|job| &job.id != job_id);
        next
    }

    /// Files `job` under `bucket` after taking it out of every other bucket,
    /// keeping each id in at most one bucket.
    pub fn move_to(&self, bucket: Bucket, job: OperationJob) -> Self {
        let mut next = self.clone();
        for other in Bucket::ALL.into_iter().filter(|other| *other != bucket) {
            next.buckets[idx_for(other)].retain(|existing| existing.id != job.id);
        }
        next.add_to_bucket(bucket, job)
    }

    pub fn jobs(&self, bucket: Bucket) -> &[OperationJob] {
        &self.buckets[idx_for(bucket)]
    }

    pub fn contains(&self, bucket: Bucket, job_id: &JobId) -> bool {
        self.jobs(bucket).iter().any(|job| &job.id == job_id)
    }

    pub fn bucket_of(&self, job_id: &JobId) -> Option<Bucket> {
        Bucket::ALL
            .into_iter()
            .find(|bucket| self.contains(*bucket, job_id))
    }

    pub fn has_running(&self) -> bool {
        !self.jobs(Bucket::Running).is_empty()
    }

    /// New work may be submitted only when nothing is running.
    pub fn submission_allowed(&self) -> bool {
        !self.has_running()
    }

    pub fn latest_successful(&self) -> Option<&OperationJob> {
        self.jobs(Bucket::Successful).last()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }
}

impl Serialize for JobBuckets {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Bucket::ALL.len()))?;
        for bucket in Bucket::ALL {
            map.serialize_entry(bucket.as_str(), self.jobs(bucket))?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn job(id: &str) -> OperationJob {
        OperationJob::new(id)
    }

    #[test]
    fn add_is_idempotent_per_bucket() {
        let once = JobBuckets::new().add_to_bucket(Bucket::Running, job("b1"));
        let twice = once.add_to_bucket(Bucket::Running, job("b1"));
        assert_eq!(once, twice);
        assert_eq!(twice.jobs(Bucket::Running).len(), 1);
    }

    #[test]
    fn updates_do_not_touch_the_original() {
        let empty = JobBuckets::new();
        let with_job = empty.add_to_bucket(Bucket::Running, job("b1"));
        assert!(empty.is_empty());
        let removed = with_job.remove_from_bucket(Bucket::Running, &JobId::new("b1"));
        assert!(with_job.contains(Bucket::Running, &JobId::new("b1")));
        assert!(removed.is_empty());
    }

    #[test]
    fn removing_a_missing_job_is_a_no_op() {
        let buckets = JobBuckets::new().add_to_bucket(Bucket::Failed, job("b1"));
        assert_eq!(
            buckets.remove_from_bucket(Bucket::Running, &JobId::new("b1")),
            buckets
        );
    }

    #[test]
    fn move_to_leaves_a_single_membership() {
        let buckets = JobBuckets::new()
            .add_to_bucket(Bucket::Running, job("b1"))
            .move_to(Bucket::Failed, job("b1"))
            .move_to(Bucket::Successful, job("b1"));
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets.bucket_of(&JobId::new("b1")), Some(Bucket::Successful));
    }

    #[test]
    fn listing_collapses_repeated_ids() {
        let seeded = JobBuckets::from_listing([
            (Bucket::Running, vec![job("b1"), job("b1")]),
            (Bucket::Failed, vec![job("b1"), job("b2")]),
        ]);
        assert_eq!(seeded.len(), 2);
        assert_eq!(seeded.bucket_of(&JobId::new("b1")), Some(Bucket::Running));
        assert_eq!(seeded.bucket_of(&JobId::new("b2")), Some(Bucket::Failed));
    }

    #[test]
    fn serializes_every_bucket_by_name() {
        let buckets = JobBuckets::new().add_to_bucket(Bucket::Successful, job("b1"));
        let value = serde_json::to_value(&buckets).unwrap();
        assert_eq!(value["running"], serde_json::json!([]));
        assert_eq!(value["successful"][0]["id"], "b1");
    }

    proptest! {
        #[test]
        fn repeated_adds_match_a_single_add(id in "[a-z0-9]{1,6}", repeats in 1usize..5) {
            let once = JobBuckets::new().add_to_bucket(Bucket::Running, job(&id));
            let mut many = JobBuckets::new();
            for _ in 0..repeats {
                many = many.add_to_bucket(Bucket::Running, job(&id));
            }
            prop_assert_eq!(once, many);
        }
    }
}
