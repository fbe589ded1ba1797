use serde::Serialize;

use crate::generation::GenerationSession;

/// A session's text split into the reasoning zone and the user-facing reply.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TextSegments<'a> {
    pub thinking: &'a str,
    pub spoken: &'a str,
}

/// Splits `session.text` into thinking and spoken ranges.
///
/// - no `thinking_start`: nothing is thinking, the whole buffer is spoken;
/// - `thinking_start` only: the zone is still open, everything so far is
///   thinking and spoken is empty;
/// - both set: `[start, end)` is thinking, `[end, len)` is spoken.
///
/// Offsets past the buffer or off a char boundary (only possible with a
/// hand-built session) are clamped instead of panicking.
pub fn segment_text(session: &GenerationSession) -> TextSegments<'_> {
    let text = session.text.as_str();
    let Some(start) = session.thinking_start else {
        return TextSegments {
            thinking: "",
            spoken: text,
        };
    };

    let end = clamp_to_boundary(text, session.thinking_end.unwrap_or(text.len()));
    let start = clamp_to_boundary(text, start).min(end);

    TextSegments {
        thinking: &text[start..end],
        spoken: &text[end..],
    }
}

fn clamp_to_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn session(text: &str, start: Option<usize>, end: Option<usize>) -> GenerationSession {
        let mut session = GenerationSession::begin("t1".into(), Utc::now());
        session.text = text.to_string();
        session.thinking_start = start;
        session.thinking_end = end;
        session
    }

    #[test]
    fn without_thinking_everything_is_spoken() {
        let s = session("Hello", None, None);
        assert_eq!(
            segment_text(&s),
            TextSegments {
                thinking: "",
                spoken: "Hello"
            }
        );
    }

    #[test]
    fn open_zone_swallows_the_whole_buffer() {
        let s = session("pondering", Some(0), None);
        assert_eq!(
            segment_text(&s),
            TextSegments {
                thinking: "pondering",
                spoken: ""
            }
        );
    }

    #[test]
    fn closed_zone_splits_at_end_offset() {
        let s = session("Hello world", Some(0), Some(5));
        assert_eq!(
            segment_text(&s),
            TextSegments {
                thinking: "Hello",
                spoken: " world"
            }
        );
    }

    #[test]
    fn end_without_start_renders_no_thinking() {
        let s = session("abc", None, Some(2));
        assert_eq!(segment_text(&s).thinking, "");
        assert_eq!(segment_text(&s).spoken, "abc");
    }

    #[test]
    fn bad_offsets_are_clamped() {
        let s = session("héllo", Some(0), Some(2));
        let segments = segment_text(&s);
        assert_eq!(segments.thinking, "h");
        assert_eq!(segments.spoken, "éllo");

        let s = session("abc", Some(0), Some(99));
        assert_eq!(segment_text(&s).thinking, "abc");
    }
}
