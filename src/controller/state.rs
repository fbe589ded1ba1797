use chrono::{DateTime, Utc};
use log::debug;

use super::ViewSubject;
use crate::backend::OperationSnapshot;
use crate::dispatch::{reduce, replay, Effect, LiveTables};
use crate::events::ChannelEvent;
use crate::identifiers::RevisionId;
use crate::view::LiveView;

/// Handed out when a snapshot fetch starts and returned with its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub epoch: u64,
    /// Sequence number of the first event the fetched snapshot may not
    /// reflect.
    pub start_seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// The view was unmounted or moved to another subject meanwhile.
    Stale,
    /// A fetch that started later has already been applied.
    Superseded,
    Failed,
}

/// Everything one mounted view knows. Owned by the controller behind a lock;
/// every method is synchronous so a reduction never spans an await.
#[derive(Debug, Default)]
pub struct ViewState {
    epoch: u64,
    subject: Option<ViewSubject>,
    live: LiveTables,
    seeded: bool,
    next_seq: u64,
    /// Operation events received while a fetch was in flight.
    journal: Vec<(u64, ChannelEvent)>,
    in_flight: Vec<u64>,
    applied_start: Option<u64>,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn subject(&self) -> Option<&ViewSubject> {
        self.subject.as_ref()
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// Starts a new epoch for `subject` with empty, unseeded tables.
    pub fn mount(&mut self, subject: ViewSubject) -> u64 {
        self.reset();
        self.subject = Some(subject);
        self.epoch
    }

    pub fn unmount(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        *self = Self {
            epoch: self.epoch.wrapping_add(1),
            ..Self::default()
        };
    }

    /// Reduces one event into the live tables and returns its effects.
    /// Operation events for another revision than the mounted one are
    /// dropped before they reach the reducer. A missing revision on either
    /// side never matches.
    pub fn apply(&mut self, event: &ChannelEvent, now: DateTime<Utc>) -> Vec<Effect> {
        let Some(subject) = &self.subject else {
            return Vec::new();
        };
        if event.is_operation_event()
            && !same_revision(event.revision_id(), subject.revision_id.as_ref())
        {
            debug!(
                "[controller] dropping operation event for revision {:?}",
                event.revision_id()
            );
            return Vec::new();
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        if event.is_operation_event() && !self.in_flight.is_empty() {
            self.journal.push((seq, event.clone()));
        }

        let reduction = reduce(&self.live, event, now);
        self.live = reduction.tables;
        reduction.effects
    }

    pub fn begin_fetch(&mut self) -> FetchTicket {
        let ticket = FetchTicket {
            epoch: self.epoch,
            start_seq: self.next_seq,
        };
        self.in_flight.push(ticket.start_seq);
        ticket
    }

    /// Applies a finished fetch. The snapshot replaces the job buckets and
    /// every journalled operation event received since the fetch started is
    /// replayed on top; generation sessions and artefact markers are not part
    /// of a snapshot and carry over.
    pub fn finish_fetch<E>(
        &mut self,
        ticket: FetchTicket,
        result: Result<OperationSnapshot, E>,
        now: DateTime<Utc>,
    ) -> FetchOutcome {
        if ticket.epoch != self.epoch {
            return FetchOutcome::Stale;
        }
        if let Some(position) = self.in_flight.iter().position(|seq| *seq == ticket.start_seq) {
            self.in_flight.swap_remove(position);
        }

        let outcome = match result {
            Err(_) => FetchOutcome::Failed,
            Ok(_) if self.applied_start.is_some_and(|applied| ticket.start_seq < applied) => {
                FetchOutcome::Superseded
            }
            Ok(snapshot) => {
                let baseline = LiveTables {
                    jobs: snapshot.into_tables().jobs,
                    ..self.live.clone()
                };
                let newer = self
                    .journal
                    .iter()
                    .filter(|(seq, _)| *seq >= ticket.start_seq)
                    .map(|(_, event)| event);
                self.live = replay(baseline, newer, now);
                self.seeded = true;
                self.applied_start = Some(ticket.start_seq);
                FetchOutcome::Applied
            }
        };

        self.prune_journal();
        outcome
    }

    fn prune_journal(&mut self) {
        match self.in_flight.iter().min() {
            Some(oldest) => {
                let oldest = *oldest;
                self.journal.retain(|(seq, _)| *seq >= oldest);
            }
            None => self.journal.clear(),
        }
    }

    pub fn tables(&self) -> Option<&LiveTables> {
        self.seeded.then_some(&self.live)
    }

    pub fn view(&self, now: DateTime<Utc>) -> LiveView {
        let has_revision = self
            .subject
            .as_ref()
            .is_some_and(|subject| subject.revision_id.is_some());
        LiveView::from_tables(self.tables(), has_revision, now)
    }
}

fn same_revision(event: Option<&RevisionId>, mounted: Option<&RevisionId>) -> bool {
    matches!((event, mounted), (Some(event), Some(mounted)) if event == mounted)
}
