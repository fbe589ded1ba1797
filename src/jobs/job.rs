use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::identifiers::JobId;

/// Lifecycle group a build/preview job is filed under.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Bucket {
    Running,
    Crashed,
    Failed,
    Successful,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [
        Bucket::Running,
        Bucket::Crashed,
        Bucket::Failed,
        Bucket::Successful,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Running => "running",
            Bucket::Crashed => "crashed",
            Bucket::Failed => "failed",
            Bucket::Successful => "successful",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Bucket::Running)
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `state` string that names no terminal bucket.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{0}` is not a terminal bucket")]
pub struct UnknownBucket(pub String);

impl FromStr for Bucket {
    type Err = UnknownBucket;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "running" => Ok(Bucket::Running),
            "crashed" => Ok(Bucket::Crashed),
            "failed" => Ok(Bucket::Failed),
            "successful" => Ok(Bucket::Successful),
            other => Err(UnknownBucket(other.to_string())),
        }
    }
}

/// One build/preview job as the server describes it.
///
/// Only `id` and `state` are interpreted; logs, urls, timestamps and anything
/// else the server sends ride along in `payload` and are serialized back out
/// unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationJob {
    pub id: JobId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl OperationJob {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: JobId::new(id),
            state: None,
            payload: Map::new(),
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Terminal bucket named by `state`. A missing state, `running`, or an
    /// unrecognised name are all contract violations for a finished job.
    pub fn final_bucket(&self) -> Result<Bucket, UnknownBucket> {
        let state = self.state.as_deref().unwrap_or_default();
        match state.parse::<Bucket>() {
            Ok(bucket) if bucket.is_terminal() => Ok(bucket),
            _ => Err(UnknownBucket(state.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_round_trips_untouched() {
        let raw = json!({
            "id": 5,
            "state": "successful",
            "url": "http://preview/5",
            "start_time": "2024-01-01T00:00:00Z"
        });
        let job: OperationJob = serde_json::from_value(raw).unwrap();
        assert_eq!(job.payload["url"], "http://preview/5");

        let back = serde_json::to_value(&job).unwrap();
        assert_eq!(back["id"], "5");
        assert_eq!(back["url"], "http://preview/5");
        assert_eq!(back["start_time"], "2024-01-01T00:00:00Z");
    }

    #[test]
    fn final_bucket_rejects_running_and_unknown_states() {
        assert_eq!(
            OperationJob::new("1").with_state("crashed").final_bucket(),
            Ok(Bucket::Crashed)
        );
        assert_eq!(
            OperationJob::new("1").with_state("running").final_bucket(),
            Err(UnknownBucket("running".into()))
        );
        assert_eq!(
            OperationJob::new("1").with_state("exploded").final_bucket(),
            Err(UnknownBucket("exploded".into()))
        );
        assert_eq!(
            OperationJob::new("1").final_bucket(),
            Err(UnknownBucket(String::new()))
        );
    }
}
