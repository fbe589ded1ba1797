use thiserror::Error;

/// Failures on the push channel: either a single message could not be
/// decoded, or the transport itself broke.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("malformed channel message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("`{event_type}` payload is missing `{field}`")]
    MissingField {
        event_type: String,
        field: &'static str,
    },

    #[error("channel transport failed: {0}")]
    Transport(String),
}

/// Failures talking to the REST collaborator.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("unexpected response body from {url}: {reason}")]
    Body { url: String, reason: String },
}

#[derive(Debug, Error)]
pub enum LiveError {
    #[error("no view is mounted")]
    NotMounted,

    #[error("the current view has no revision to build")]
    NoRevision,

    #[error("new work cannot be submitted while an operation is running")]
    SubmissionBlocked,

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}
