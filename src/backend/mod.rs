//! The REST side of the view: authoritative snapshots, view refreshes and
//! new work submission.

pub mod http;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::controller::ViewSubject;
use crate::dispatch::LiveTables;
use crate::error::BackendError;
use crate::identifiers::{RevisionId, ThreadId};
use crate::jobs::{Bucket, JobBuckets, OperationJob};

pub use http::HttpBackend;

/// Server-side listing of the jobs behind one revision.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct OperationSnapshot {
    #[serde(default)]
    pub running: Vec<OperationJob>,
    #[serde(default)]
    pub crashed: Vec<OperationJob>,
    #[serde(default)]
    pub failed: Vec<OperationJob>,
    #[serde(default)]
    pub successful: Vec<OperationJob>,
}

impl OperationSnapshot {
    pub fn bucket_mut(&mut self, bucket: Bucket) -> &mut Vec<OperationJob> {
        match bucket {
            Bucket::Running => &mut self.running,
            Bucket::Crashed => &mut self.crashed,
            Bucket::Failed => &mut self.failed,
            Bucket::Successful => &mut self.successful,
        }
    }

    /// Fresh tables seeded from the listing. Generation sessions are never
    /// part of a snapshot; finished text comes back through a view refresh.
    pub fn into_tables(self) -> LiveTables {
        LiveTables {
            jobs: JobBuckets::from_listing([
                (Bucket::Running, self.running),
                (Bucket::Crashed, self.crashed),
                (Bucket::Failed, self.failed),
                (Bucket::Successful, self.successful),
            ]),
            ..LiveTables::new()
        }
    }
}

#[async_trait]
pub trait ViewBackend: Send + Sync {
    /// Jobs in progress or finished for the subject's revision. A subject
    /// without a revision has nothing to list.
    async fn fetch_snapshot(&self, subject: &ViewSubject) -> Result<OperationSnapshot, BackendError>;

    /// Everything else the view shows (persisted messages, title, image).
    async fn refresh_view(&self, subject: &ViewSubject) -> Result<Value, BackendError>;

    async fn launch_operation(
        &self,
        thread_id: &ThreadId,
        revision_id: &RevisionId,
    ) -> Result<(), BackendError>;
}
