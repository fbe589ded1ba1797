use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::dispatch::{LiveTables, PendingArtifacts};
use crate::generation::GenerationSession;
use crate::identifiers::TaskId;
use crate::jobs::JobBuckets;
use crate::segmentation::{segment_text, tokens_per_second};

/// A message still being generated, as the view shows it.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratingMessage {
    pub task_id: TaskId,
    pub thinking: String,
    pub spoken: String,
    pub is_thinking: bool,
    pub tokens_per_second: u64,
}

impl GeneratingMessage {
    pub fn from_session(session: &GenerationSession, now: DateTime<Utc>) -> Self {
        let segments = segment_text(session);
        Self {
            task_id: session.task_id.clone(),
            thinking: segments.thinking.to_string(),
            spoken: segments.spoken.to_string(),
            is_thinking: session.is_thinking(),
            tokens_per_second: tokens_per_second(session, now),
        }
    }
}

/// Everything handed to the rendering sink. Derived from the live tables on
/// every render and never stored.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LiveView {
    /// The first snapshot has not arrived yet.
    pub loading: bool,
    pub generating: Vec<GeneratingMessage>,
    pub jobs: JobBuckets,
    pub submission_allowed: bool,
    pub pending_artifacts: PendingArtifacts,
    /// Preview of the most recent successful job, if it published one.
    pub preview_url: Option<String>,
}

impl LiveView {
    /// `tables` is `None` until the view has been seeded. Submission needs a
    /// seeded view with a revision to build and nothing running.
    pub fn from_tables(tables: Option<&LiveTables>, has_revision: bool, now: DateTime<Utc>) -> Self {
        let Some(tables) = tables else {
            return Self::loading();
        };

        let preview_url = tables
            .jobs
            .latest_successful()
            .and_then(|job| job.payload.get("url"))
            .and_then(|url| url.as_str())
            .map(str::to_string);

        Self {
            loading: false,
            generating: tables
                .generations
                .sessions()
                .map(|session| GeneratingMessage::from_session(session, now))
                .collect(),
            jobs: tables.jobs.clone(),
            submission_allowed: has_revision && tables.submission_allowed(),
            pending_artifacts: tables.artifacts,
            preview_url,
        }
    }

    pub fn loading() -> Self {
        Self {
            loading: true,
            generating: Vec::new(),
            jobs: JobBuckets::new(),
            submission_allowed: false,
            pending_artifacts: PendingArtifacts::default(),
            preview_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{Bucket, OperationJob};
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn unseeded_view_is_loading_and_blocks_submission() {
        let view = LiveView::from_tables(None, true, Utc::now());
        assert!(view.loading);
        assert!(!view.submission_allowed);
    }

    #[test]
    fn renders_segments_and_throughput() {
        let start = Utc::now();
        let mut tables = LiveTables::new();
        tables.generations = tables.generations.start(TaskId::new("t1"), start);
        tables.generations = tables.generations.append_token(&TaskId::new("t1"), "Hi", start);
        tables.generations = tables.generations.open_thinking(&TaskId::new("t1"));
        tables.generations = tables.generations.append_token(&TaskId::new("t1"), "!", start);

        let view = LiveView::from_tables(Some(&tables), false, start + Duration::seconds(1));
        assert_eq!(view.generating.len(), 1);
        assert_eq!(view.generating[0].thinking, "Hi!");
        assert_eq!(view.generating[0].spoken, "");
        assert!(view.generating[0].is_thinking);
        assert_eq!(view.generating[0].tokens_per_second, 1);
        assert!(!view.submission_allowed);
    }

    #[test]
    fn preview_comes_from_latest_successful_job() {
        let mut older = OperationJob::new("b1");
        older.payload.insert("url".into(), json!("http://preview/1"));
        let mut newer = OperationJob::new("b2");
        newer.payload.insert("url".into(), json!("http://preview/2"));

        let mut tables = LiveTables::new();
        tables.jobs = JobBuckets::from_listing([(Bucket::Successful, vec![older, newer])]);

        let view = LiveView::from_tables(Some(&tables), true, Utc::now());
        assert_eq!(view.preview_url.as_deref(), Some("http://preview/2"));
        assert!(view.submission_allowed);

        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["previewUrl"], "http://preview/2");
        assert_eq!(value["jobs"]["successful"][1]["id"], "b2");
        assert_eq!(value["pendingArtifacts"]["title"], false);
    }
}
