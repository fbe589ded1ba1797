use chrono::{DateTime, Utc};
use log::{debug, warn};

use super::tables::LiveTables;
use crate::events::{AudioSignal, ChannelEvent, ChatArtifact};
use crate::identifiers::{JobId, TaskId};
use crate::jobs::Bucket;

/// Why the surrounding view has to be refetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResyncReason {
    GenerationEnded(TaskId),
    ArtifactReady(ChatArtifact),
    OperationFinished(JobId),
}

/// Side effects the controller performs after a reduction. The reducer
/// itself never does I/O.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Refetch authoritative state; the event was a signal, not the data.
    Resync(ResyncReason),
    /// Errors reported by a finished generation, shown as-is.
    ShowErrors {
        task_id: TaskId,
        errors: Vec<String>,
    },
    /// The last running job finished; new work may be submitted.
    SubmissionAllowed,
    /// A finished job named no terminal bucket. It has left `running` but is
    /// filed nowhere.
    UnfiledJob { job_id: JobId, state: String },
    /// Speech payload for the audio collaborator.
    Audio(AudioSignal),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    pub tables: LiveTables,
    pub effects: Vec<Effect>,
}

impl Reduction {
    fn quiet(tables: LiveTables) -> Self {
        Self {
            tables,
            effects: Vec::new(),
        }
    }
}

/// Applies one channel event to `tables`, returning the next tables and the
/// effects the event calls for. `tables` is never modified.
pub fn reduce(tables: &LiveTables, event: &ChannelEvent, now: DateTime<Utc>) -> Reduction {
    match event {
        ChannelEvent::GenerationStarted { task_id } => Reduction::quiet(LiveTables {
            generations: tables.generations.start(task_id.clone(), now),
            ..tables.clone()
        }),
        ChannelEvent::TokenArrived { task_id, token } => Reduction::quiet(LiveTables {
            generations: tables.generations.append_token(task_id, token, now),
            ..tables.clone()
        }),
        ChannelEvent::ThinkingStarted { task_id } => {
            if !tables.generations.contains(task_id) {
                debug!("[dispatch] thinking start for unknown task {task_id} ignored");
            }
            Reduction::quiet(LiveTables {
                generations: tables.generations.open_thinking(task_id),
                ..tables.clone()
            })
        }
        ChannelEvent::ThinkingEnded { task_id } => {
            if !tables.generations.contains(task_id) {
                debug!("[dispatch] thinking end for unknown task {task_id} ignored");
            }
            Reduction::quiet(LiveTables {
                generations: tables.generations.close_thinking(task_id),
                ..tables.clone()
            })
        }
        ChannelEvent::ResponseProgress { .. } => Reduction::quiet(tables.clone()),
        ChannelEvent::GenerationEnded { task_id, errors } => {
            let mut effects = Vec::new();
            if !errors.is_empty() {
                effects.push(Effect::ShowErrors {
                    task_id: task_id.clone(),
                    errors: errors.clone(),
                });
            }
            effects.push(Effect::Resync(ResyncReason::GenerationEnded(task_id.clone())));
            Reduction {
                tables: LiveTables {
                    generations: tables.generations.end(task_id),
                    ..tables.clone()
                },
                effects,
            }
        }
        ChannelEvent::ArtifactGenerationStarted { artifact } => Reduction::quiet(LiveTables {
            artifacts: tables.artifacts.with(*artifact, true),
            ..tables.clone()
        }),
        ChannelEvent::ArtifactGenerationEnded { artifact } => Reduction {
            tables: LiveTables {
                artifacts: tables.artifacts.with(*artifact, false),
                ..tables.clone()
            },
            effects: vec![Effect::Resync(ResyncReason::ArtifactReady(*artifact))],
        },
        ChannelEvent::OperationStarted { job, .. } => {
            // A redelivered start must not pull a finished job back into
            // `running`.
            if let Some(bucket) = tables.jobs.bucket_of(&job.id) {
                debug!("[dispatch] job {} already filed under {bucket}", job.id);
                return Reduction::quiet(tables.clone());
            }
            Reduction::quiet(LiveTables {
                jobs: tables.jobs.add_to_bucket(Bucket::Running, job.clone()),
                ..tables.clone()
            })
        }
        ChannelEvent::OperationFinished { job, .. } => {
            let mut jobs = tables.jobs.remove_from_bucket(Bucket::Running, &job.id);
            let mut effects = Vec::new();

            match job.final_bucket() {
                Ok(bucket) => jobs = jobs.move_to(bucket, job.clone()),
                Err(unknown) => effects.push(Effect::UnfiledJob {
                    job_id: job.id.clone(),
                    state: unknown.0,
                }),
            }

            if jobs.submission_allowed() {
                effects.push(Effect::SubmissionAllowed);
            }
            effects.push(Effect::Resync(ResyncReason::OperationFinished(job.id.clone())));

            Reduction {
                tables: LiveTables {
                    jobs,
                    ..tables.clone()
                },
                effects,
            }
        }
        ChannelEvent::Audio(signal) => Reduction {
            tables: tables.clone(),
            effects: vec![Effect::Audio(signal.clone())],
        },
        ChannelEvent::Unrecognized { event_type } => {
            warn!("[dispatch] unknown event type `{event_type}` ignored");
            Reduction::quiet(tables.clone())
        }
    }
}

/// Replays events on top of a freshly fetched baseline. Effects were already
/// performed when the events first arrived, so they are discarded here.
pub fn replay<'a, I>(baseline: LiveTables, events: I, now: DateTime<Utc>) -> LiveTables
where
    I: IntoIterator<Item = &'a ChannelEvent>,
{
    events
        .into_iter()
        .fold(baseline, |tables, event| reduce(&tables, event, now).tables)
}
