use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::state::GenerationSession;
use crate::identifiers::TaskId;

/// In-flight generation sessions keyed by task id.
///
/// Every transition returns a new table. Sessions are shared behind `Arc`,
/// so a transition copies only the session it touches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationTable {
    sessions: BTreeMap<TaskId, Arc<GenerationSession>>,
}

impl GenerationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a fresh session, replacing any existing one for `task_id`.
    pub fn start(&self, task_id: TaskId, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.sessions.insert(
            task_id.clone(),
            Arc::new(GenerationSession::begin(task_id, now)),
        );
        next
    }

    /// Appends a token. A token for an unknown task opens a session first,
    /// which recovers from a start event lost before this view subscribed.
    pub fn append_token(&self, task_id: &TaskId, token: &str, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        let session = next
            .sessions
            .entry(task_id.clone())
            .or_insert_with(|| Arc::new(GenerationSession::begin(task_id.clone(), now)));
        Arc::make_mut(session).push_token(token, now);
        next
    }

    /// Marks the thinking zone open. Unknown tasks are left alone: thinking
    /// markers never create sessions.
    pub fn open_thinking(&self, task_id: &TaskId) -> Self {
        self.update_existing(task_id, GenerationSession::open_thinking)
    }

    /// Closes the thinking zone at the current text length. Unknown tasks are
    /// left alone.
    pub fn close_thinking(&self, task_id: &TaskId) -> Self {
        self.update_existing(task_id, GenerationSession::close_thinking)
    }

    /// Drops the session; ending an unknown task is a no-op.
    pub fn end(&self, task_id: &TaskId) -> Self {
        if !self.sessions.contains_key(task_id) {
            return self.clone();
        }
        let mut next = self.clone();
        next.sessions.remove(task_id);
        next
    }

    pub fn get(&self, task_id: &TaskId) -> Option<&GenerationSession> {
        self.sessions.get(task_id).map(Arc::as_ref)
    }

    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.sessions.contains_key(task_id)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &GenerationSession> {
        self.sessions.values().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn update_existing(
        &self,
        task_id: &TaskId,
        apply: impl FnOnce(&mut GenerationSession),
    ) -> Self {
        let mut next = self.clone();
        if let Some(session) = next.sessions.get_mut(task_id) {
            apply(Arc::make_mut(session));
        }
        next
    }
}

impl FromIterator<GenerationSession> for GenerationTable {
    fn from_iter<I: IntoIterator<Item = GenerationSession>>(iter: I) -> Self {
        Self {
            sessions: iter
                .into_iter()
                .map(|session| (session.task_id.clone(), Arc::new(session)))
                .collect(),
        }
    }
}
