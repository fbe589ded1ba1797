use serde::Deserialize;

use super::ChannelEvent;
use crate::identifiers::TaskId;

// Every token passes through here; keep quiet unless debugging the stream.
const ENABLE_LOGS: bool = false;

use crate::log_debug;

pub const OUTPUT_ITEM_ADDED: &str = "response.output_item.added";
pub const REASONING_TEXT_DELTA: &str = "response.reasoning_text.delta";
pub const REASONING_TEXT_DONE: &str = "response.reasoning_text.done";
pub const OUTPUT_TEXT_DELTA: &str = "response.output_text.delta";

const REASONING_ITEM: &str = "reasoning";

/// One Responses-API-style streaming event as relayed by the server inside a
/// `response_event` message.
#[derive(Debug, Clone, Deserialize)]
pub struct SseEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub delta: Option<String>,
    #[serde(default)]
    pub item: Option<SseItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SseItem {
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// Maps a streaming event onto the generation transition it stands for.
///
/// Reasoning items open the thinking zone and `reasoning_text.done` closes
/// it; both kinds of text delta are plain tokens. Everything else is
/// progress bookkeeping with no effect on the tables.
pub fn classify(task_id: TaskId, event: SseEvent) -> ChannelEvent {
    match event.kind.as_str() {
        OUTPUT_ITEM_ADDED if is_reasoning(&event) => ChannelEvent::ThinkingStarted { task_id },
        REASONING_TEXT_DELTA | OUTPUT_TEXT_DELTA => match event.delta {
            Some(token) => ChannelEvent::TokenArrived { task_id, token },
            None => {
                log_debug!("[sse] {} for {} without delta", event.kind, task_id);
                ChannelEvent::ResponseProgress {
                    task_id,
                    sse_type: event.kind,
                }
            }
        },
        REASONING_TEXT_DONE => ChannelEvent::ThinkingEnded { task_id },
        _ => ChannelEvent::ResponseProgress {
            task_id,
            sse_type: event.kind,
        },
    }
}

fn is_reasoning(event: &SseEvent) -> bool {
    event
        .item
        .as_ref()
        .map(|item| item.kind == REASONING_ITEM)
        .unwrap_or(false)
}
