use serde::Serialize;

use crate::events::ChatArtifact;
use crate::generation::GenerationTable;
use crate::jobs::JobBuckets;

/// Chat-level artefacts (title, cover image) currently being generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingArtifacts {
    pub title: bool,
    pub image: bool,
}

impl PendingArtifacts {
    pub fn with(mut self, artifact: ChatArtifact, pending: bool) -> Self {
        match artifact {
            ChatArtifact::Title => self.title = pending,
            ChatArtifact::Image => self.image = pending,
        }
        self
    }
}

/// Everything one view tracks live. Generation sessions and jobs sit in
/// separate tables, so a task id and a job id can never collide.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveTables {
    pub generations: GenerationTable,
    pub jobs: JobBuckets,
    pub artifacts: PendingArtifacts,
}

impl LiveTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submission_allowed(&self) -> bool {
        self.jobs.submission_allowed()
    }
}
