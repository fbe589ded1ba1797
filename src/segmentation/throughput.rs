use chrono::{DateTime, Utc};

use crate::generation::GenerationSession;

/// Tokens per second since the session's first token, rounded.
///
/// Zero or negative elapsed time (first frame, clock skew) yields 0 rather
/// than an infinite or NaN rate.
pub fn tokens_per_second(session: &GenerationSession, now: DateTime<Utc>) -> u64 {
    let elapsed_ms = (now - session.started_at).num_milliseconds();
    if elapsed_ms <= 0 {
        return 0;
    }

    let rate = session.token_count as f64 / (elapsed_ms as f64 / 1000.0);
    if rate.is_finite() && rate > 0.0 {
        rate.round() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn session_at(started_at: DateTime<Utc>, token_count: u64) -> GenerationSession {
        let mut session = GenerationSession::begin("t1".into(), started_at);
        session.token_count = token_count;
        session
    }

    #[test]
    fn zero_elapsed_is_zero() {
        let now = Utc::now();
        assert_eq!(tokens_per_second(&session_at(now, 50), now), 0);
    }

    #[test]
    fn rounds_to_nearest_whole_rate() {
        let start = Utc::now();
        let session = session_at(start, 25);
        assert_eq!(tokens_per_second(&session, start + Duration::seconds(2)), 13);
        assert_eq!(tokens_per_second(&session, start + Duration::seconds(10)), 3);
    }

    #[test]
    fn clock_skew_is_zero() {
        let start = Utc::now();
        let session = session_at(start, 10);
        assert_eq!(tokens_per_second(&session, start - Duration::seconds(5)), 0);
    }

    proptest! {
        #[test]
        fn rate_is_always_finite(tokens in 0u64..1_000_000, elapsed_ms in -10_000i64..10_000_000) {
            let start = Utc::now();
            let session = session_at(start, tokens);
            let rate = tokens_per_second(&session, start + Duration::milliseconds(elapsed_ms));
            if elapsed_ms <= 0 {
                prop_assert_eq!(rate, 0);
            }
            prop_assert!(rate <= tokens.saturating_mul(1000));
        }
    }
}
