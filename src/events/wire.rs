use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::sse::{self, SseEvent};
use super::{AudioPhase, AudioSignal, ChannelEvent, ChatArtifact};
use crate::error::ChannelError;
use crate::identifiers::{RevisionId, TaskId};
use crate::jobs::OperationJob;

/// Outer shape of every frame: `{event_type, data}`; the legacy chat socket
/// also puts `task_id` next to `event_type`.
#[derive(Debug, Deserialize)]
struct Envelope {
    event_type: String,
    #[serde(default)]
    task_id: Option<TaskId>,
    #[serde(default)]
    data: Value,
}

impl Envelope {
    /// Reads `data.<name>`. Absent and `null` are both `None`; a value of
    /// the wrong shape is malformed.
    fn optional<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ChannelError> {
        match self.data.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(T::deserialize(value)?)),
        }
    }

    fn required<T: DeserializeOwned>(&self, name: &'static str) -> Result<T, ChannelError> {
        self.optional(name)?.ok_or_else(|| self.missing(name))
    }

    fn task_id(&self) -> Result<TaskId, ChannelError> {
        self.optional("task_id")?
            .or_else(|| self.task_id.clone())
            .ok_or_else(|| self.missing("task_id"))
    }

    fn missing(&self, field: &'static str) -> ChannelError {
        ChannelError::MissingField {
            event_type: self.event_type.clone(),
            field,
        }
    }

    /// Errors listed under `data.generation.errors`. Anything else there is
    /// not ours to judge.
    fn generation_errors(&self) -> Vec<String> {
        self.data
            .get("generation")
            .and_then(|generation| generation.get("errors"))
            .and_then(Value::as_array)
            .map(|errors| errors.iter().cloned().map(error_text).collect())
            .unwrap_or_default()
    }
}

/// Decodes one text frame from the channel.
///
/// Unknown `event_type`s decode successfully to `ChannelEvent::Unrecognized`;
/// only frames that are not JSON, or whose payload lacks what their type
/// requires, are errors. Each type reads only its own fields out of `data`.
pub fn decode(frame: &str) -> Result<ChannelEvent, ChannelError> {
    let envelope: Envelope = serde_json::from_str(frame)?;

    let event = match envelope.event_type.as_str() {
        "generation_started" => ChannelEvent::GenerationStarted {
            task_id: envelope.task_id()?,
        },
        "response_event" => {
            let task_id = envelope.task_id()?;
            let sse_event: SseEvent = envelope.required("sse_event")?;
            sse::classify(task_id, sse_event)
        }
        "token_arrived" => ChannelEvent::TokenArrived {
            task_id: envelope.task_id()?,
            token: envelope.required("token")?,
        },
        "generation_ended" => ChannelEvent::GenerationEnded {
            task_id: envelope.task_id()?,
            errors: envelope.generation_errors(),
        },
        "chat_title_generation_started" => ChannelEvent::ArtifactGenerationStarted {
            artifact: ChatArtifact::Title,
        },
        "chat_title_generation_ended" => ChannelEvent::ArtifactGenerationEnded {
            artifact: ChatArtifact::Title,
        },
        "chat_image_generation_started" => ChannelEvent::ArtifactGenerationStarted {
            artifact: ChatArtifact::Image,
        },
        "chat_image_generation_ended" => ChannelEvent::ArtifactGenerationEnded {
            artifact: ChatArtifact::Image,
        },
        "build_started" => ChannelEvent::OperationStarted {
            revision_id: envelope.optional::<RevisionId>("revision_id")?,
            job: envelope.required::<OperationJob>("build")?,
        },
        "build_finished" => ChannelEvent::OperationFinished {
            revision_id: envelope.optional::<RevisionId>("revision_id")?,
            job: envelope.required::<OperationJob>("build")?,
        },
        "speech_stream_started" | "speech_chunk" | "speech_stream_ended" => {
            let phase = match envelope.event_type.as_str() {
                "speech_stream_started" => AudioPhase::Started,
                "speech_chunk" => AudioPhase::Chunk,
                _ => AudioPhase::Ended,
            };
            let task_id = envelope.task_id()?;
            ChannelEvent::Audio(AudioSignal {
                task_id,
                phase,
                payload: envelope.data,
            })
        }
        _ => ChannelEvent::Unrecognized {
            event_type: envelope.event_type.clone(),
        },
    };

    Ok(event)
}

fn error_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::Bucket;

    #[test]
    fn decodes_generation_lifecycle() {
        let started = decode(r#"{"event_type":"generation_started","data":{"task_id":"t1"}}"#)
            .unwrap();
        assert_eq!(
            started,
            ChannelEvent::GenerationStarted { task_id: "t1".into() }
        );

        let ended = decode(
            r#"{"event_type":"generation_ended","data":{"task_id":7,"generation":{"errors":["rate limited",{"code":500}]}}}"#,
        )
        .unwrap();
        assert_eq!(
            ended,
            ChannelEvent::GenerationEnded {
                task_id: "7".into(),
                errors: vec!["rate limited".into(), "{\"code\":500}".into()],
            }
        );
    }

    #[test]
    fn legacy_frames_carry_task_id_at_top_level() {
        let event =
            decode(r#"{"event_type":"token_arrived","task_id":"t9","data":{"token":"Hi"}}"#)
                .unwrap();
        assert_eq!(
            event,
            ChannelEvent::TokenArrived {
                task_id: "t9".into(),
                token: "Hi".into()
            }
        );
    }

    #[test]
    fn response_event_is_mapped_through_sse_classification() {
        let event = decode(
            r#"{"event_type":"response_event","data":{"task_id":"t1","sse_event":{"type":"response.output_text.delta","delta":" world"}}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ChannelEvent::TokenArrived {
                task_id: "t1".into(),
                token: " world".into()
            }
        );
    }

    #[test]
    fn build_finished_keeps_revision_and_state() {
        let event = decode(
            r#"{"event_type":"build_finished","data":{"revision_id":3,"build":{"id":11,"state":"failed","logs":"boom"}}}"#,
        )
        .unwrap();
        match event {
            ChannelEvent::OperationFinished { revision_id, job } => {
                assert_eq!(revision_id, Some("3".into()));
                assert_eq!(job.id.as_str(), "11");
                assert_eq!(job.final_bucket(), Ok(Bucket::Failed));
                assert_eq!(job.payload["logs"], "boom");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn unknown_event_types_are_not_errors() {
        let event = decode(r#"{"event_type":"presence_ping","data":{}}"#).unwrap();
        assert_eq!(
            event,
            ChannelEvent::Unrecognized {
                event_type: "presence_ping".into()
            }
        );
    }

    #[test]
    fn unknown_event_types_ignore_foreign_data() {
        let event = decode(
            r#"{"event_type":"lint_finished","data":{"revision_id":3,"build":{"state":"failed"}}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ChannelEvent::Unrecognized {
                event_type: "lint_finished".into()
            }
        );
    }

    #[test]
    fn artefact_end_does_not_read_unrelated_fields() {
        let event = decode(
            r#"{"event_type":"chat_title_generation_ended","data":{"generation":"New title"}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ChannelEvent::ArtifactGenerationEnded {
                artifact: ChatArtifact::Title
            }
        );
    }

    #[test]
    fn generation_end_tolerates_an_unexpected_outcome_shape() {
        let event = decode(
            r#"{"event_type":"generation_ended","data":{"task_id":"t1","generation":"done"}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ChannelEvent::GenerationEnded {
                task_id: "t1".into(),
                errors: Vec::new(),
            }
        );
    }

    #[test]
    fn malformed_frames_are_errors() {
        assert!(matches!(decode("not json"), Err(ChannelError::Malformed(_))));
        assert!(matches!(
            decode(r#"{"event_type":"build_started","data":{"revision_id":1}}"#),
            Err(ChannelError::MissingField { field: "build", .. })
        ));
        assert!(matches!(
            decode(r#"{"event_type":"generation_started","data":{}}"#),
            Err(ChannelError::MissingField { field: "task_id", .. })
        ));
        assert!(matches!(
            decode(r#"{"event_type":"build_finished","data":{"build":{"state":"failed"}}}"#),
            Err(ChannelError::Malformed(_))
        ));
    }

    #[test]
    fn speech_frames_pass_their_payload_through() {
        let event = decode(
            r#"{"event_type":"speech_chunk","data":{"task_id":"t1","audio":"AAAA"}}"#,
        )
        .unwrap();
        match event {
            ChannelEvent::Audio(signal) => {
                assert_eq!(signal.phase, AudioPhase::Chunk);
                assert_eq!(signal.payload["audio"], "AAAA");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
