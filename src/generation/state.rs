use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::identifiers::TaskId;

/// Observed state of one in-flight text generation.
///
/// `thinking_start`/`thinking_end` are byte offsets into `text`. Tokens are
/// appended whole, so every recorded offset falls on a char boundary.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSession {
    pub task_id: TaskId,
    pub text: String,
    pub thinking_start: Option<usize>,
    pub thinking_end: Option<usize>,
    pub token_count: u64,
    /// Throughput origin. Moved to the arrival of the first token so queueing
    /// and cold-start time are not counted.
    pub started_at: DateTime<Utc>,
}

impl GenerationSession {
    pub fn begin(task_id: TaskId, now: DateTime<Utc>) -> Self {
        Self {
            task_id,
            text: String::new(),
            thinking_start: None,
            thinking_end: None,
            token_count: 0,
            started_at: now,
        }
    }

    pub fn push_token(&mut self, token: &str, now: DateTime<Utc>) {
        if self.text.is_empty() {
            self.started_at = now;
            self.token_count = 0;
        } else {
            self.token_count += 1;
        }
        self.text.push_str(token);
    }

    pub fn open_thinking(&mut self) {
        self.thinking_start = Some(0);
    }

    pub fn close_thinking(&mut self) {
        self.thinking_end = Some(self.text.len());
    }

    pub fn is_thinking(&self) -> bool {
        self.thinking_start.is_some() && self.thinking_end.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn first_token_restarts_the_clock_without_counting() {
        let created = Utc::now();
        let mut session = GenerationSession::begin("t1".into(), created);

        let first = created + Duration::seconds(3);
        session.push_token("Hel", first);
        assert_eq!(session.started_at, first);
        assert_eq!(session.token_count, 0);

        session.push_token("lo", first + Duration::seconds(1));
        assert_eq!(session.started_at, first);
        assert_eq!(session.token_count, 1);
        assert_eq!(session.text, "Hello");
    }

    #[test]
    fn closing_thinking_reads_current_length() {
        let now = Utc::now();
        let mut session = GenerationSession::begin("t1".into(), now);
        session.open_thinking();
        assert!(session.is_thinking());
        session.push_token("abc", now);
        session.close_thinking();
        session.push_token("de", now);
        assert_eq!(session.thinking_end, Some(3));
        assert!(!session.is_thinking());
    }
}
