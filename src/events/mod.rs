//! Everything that can arrive on the push channel, as a closed set.
//!
//! `decode` turns one raw text frame into a `ChannelEvent`; the dispatcher
//! matches on it exhaustively. Adding an event type means adding a variant
//! here, which the compiler then forces every consumer to handle.

pub mod sse;
pub mod wire;

use serde_json::Value;

use crate::identifiers::{RevisionId, TaskId};
use crate::jobs::OperationJob;

pub use wire::decode;

/// Which auxiliary chat artefact a background task is producing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatArtifact {
    Title,
    Image,
}

/// Phase of a streamed speech payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioPhase {
    Started,
    Chunk,
    Ended,
}

/// Opaque speech signal, handed to the audio collaborator untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSignal {
    pub task_id: TaskId,
    pub phase: AudioPhase,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    GenerationStarted {
        task_id: TaskId,
    },
    TokenArrived {
        task_id: TaskId,
        token: String,
    },
    ThinkingStarted {
        task_id: TaskId,
    },
    ThinkingEnded {
        task_id: TaskId,
    },
    /// A streaming event for a session that carries nothing the tables track
    /// (content part bookkeeping, output item completion, ...).
    ResponseProgress {
        task_id: TaskId,
        sse_type: String,
    },
    GenerationEnded {
        task_id: TaskId,
        errors: Vec<String>,
    },
    ArtifactGenerationStarted {
        artifact: ChatArtifact,
    },
    ArtifactGenerationEnded {
        artifact: ChatArtifact,
    },
    OperationStarted {
        revision_id: Option<RevisionId>,
        job: OperationJob,
    },
    OperationFinished {
        revision_id: Option<RevisionId>,
        job: OperationJob,
    },
    Audio(AudioSignal),
    Unrecognized {
        event_type: String,
    },
}

impl ChannelEvent {
    /// Revision the event belongs to, for events scoped to one.
    pub fn revision_id(&self) -> Option<&RevisionId> {
        match self {
            ChannelEvent::OperationStarted { revision_id, .. }
            | ChannelEvent::OperationFinished { revision_id, .. } => revision_id.as_ref(),
            _ => None,
        }
    }

    pub fn is_operation_event(&self) -> bool {
        matches!(
            self,
            ChannelEvent::OperationStarted { .. } | ChannelEvent::OperationFinished { .. }
        )
    }
}
