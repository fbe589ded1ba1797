use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{OperationSnapshot, ViewBackend};
use crate::controller::ViewSubject;
use crate::error::BackendError;
use crate::identifiers::{RevisionId, ThreadId};
use crate::jobs::{Bucket, OperationJob};

#[derive(Deserialize)]
struct RevisionBody {
    #[serde(default)]
    operation_suites: Vec<String>,
}

#[derive(Deserialize)]
struct SuiteBody {
    /// Bucket name to job detail links.
    #[serde(default)]
    builds: BTreeMap<String, Vec<String>>,
}

/// [`ViewBackend`] over the workspace REST API.
///
/// A revision lists its operation suites by link; only the last suite is
/// live. The suite groups its build links by bucket and every link is
/// fetched for the full job record.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| BackendError::Request {
                url: base_url.clone(),
                source,
            })?;
        Ok(Self { client, base_url })
    }

    /// Links from the API are absolute; paths are taken relative to the base.
    fn resolve(&self, link: &str) -> String {
        if link.starts_with("http://") || link.starts_with("https://") {
            link.to_string()
        } else {
            format!("{}/{}", self.base_url, link.trim_start_matches('/'))
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, BackendError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| BackendError::Request {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(BackendError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        response.json::<T>().await.map_err(|err| BackendError::Body {
            url: url.to_string(),
            reason: err.to_string(),
        })
    }

    async fn fetch_bucket(&self, links: &[String]) -> Result<Vec<OperationJob>, BackendError> {
        try_join_all(links.iter().map(|link| {
            let url = self.resolve(link);
            async move { self.get_json::<OperationJob>(&url).await }
        }))
        .await
    }
}

#[async_trait]
impl ViewBackend for HttpBackend {
    async fn fetch_snapshot(&self, subject: &ViewSubject) -> Result<OperationSnapshot, BackendError> {
        let Some(revision_id) = &subject.revision_id else {
            return Ok(OperationSnapshot::default());
        };

        let revision: RevisionBody = self
            .get_json(&format!("{}/revisions/{}/", self.base_url, revision_id))
            .await?;
        let Some(last_suite) = revision.operation_suites.last() else {
            debug!("[backend] revision {revision_id} has no operation suites");
            return Ok(OperationSnapshot::default());
        };

        let suite: SuiteBody = self.get_json(&self.resolve(last_suite)).await?;
        let mut snapshot = OperationSnapshot::default();
        for (name, links) in &suite.builds {
            match name.parse::<Bucket>() {
                Ok(bucket) => *snapshot.bucket_mut(bucket) = self.fetch_bucket(links).await?,
                Err(unknown) => warn!("[backend] suite for revision {revision_id}: {unknown}"),
            }
        }
        Ok(snapshot)
    }

    async fn refresh_view(&self, subject: &ViewSubject) -> Result<Value, BackendError> {
        self.get_json(&format!("{}/chats/{}/", self.base_url, subject.thread_id))
            .await
    }

    async fn launch_operation(
        &self,
        thread_id: &ThreadId,
        revision_id: &RevisionId,
    ) -> Result<(), BackendError> {
        let url = format!("{}/operation-suites/", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "thread": thread_id, "revision": revision_id }))
            .send()
            .await
            .map_err(|source| BackendError::Request {
                url: url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(BackendError::Status {
                url,
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> HttpBackend {
        HttpBackend::new("http://localhost:8000/api/", Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn relative_links_join_the_base() {
        let backend = backend();
        assert_eq!(backend.resolve("/builds/3/"), "http://localhost:8000/api/builds/3/");
        assert_eq!(
            backend.resolve("http://django:8000/api/builds/3/"),
            "http://django:8000/api/builds/3/"
        );
    }

    #[test]
    fn suite_body_groups_links_by_bucket_name() {
        let suite: SuiteBody = serde_json::from_value(serde_json::json!({
            "id": 4,
            "builds": {"running": ["/builds/1/"], "successful": []},
            "lints": {}
        }))
        .unwrap();
        assert_eq!(suite.builds["running"], vec!["/builds/1/".to_string()]);
        assert!(suite.builds["successful"].is_empty());
    }

    #[tokio::test]
    async fn subject_without_revision_lists_nothing() {
        let subject = ViewSubject::new(ThreadId::new("7"), None);
        let snapshot = backend().fetch_snapshot(&subject).await.unwrap();
        assert_eq!(snapshot, OperationSnapshot::default());
    }
}
