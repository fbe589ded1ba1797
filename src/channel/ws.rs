use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use super::{ChannelSource, MessageStream};
use crate::error::ChannelError;

// Set to true to trace every frame received from the socket
const ENABLE_LOGS: bool = false;

use crate::log_debug;

/// WebSocket subscription to the workspace event hub.
///
/// The hub expects a session id as the first frame after the socket opens;
/// after that every text frame is one channel message.
#[derive(Debug, Clone)]
pub struct WsChannel {
    url: String,
    session_id: String,
}

impl WsChannel {
    pub fn new(url: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            session_id: session_id.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn frame_text(message: Message) -> Option<Result<String, ChannelError>> {
    match message {
        Message::Text(text) => Some(Ok(text)),
        Message::Binary(bytes) => Some(
            String::from_utf8(bytes)
                .map_err(|err| ChannelError::Transport(format!("binary frame is not UTF-8: {err}"))),
        ),
        // Ping/pong are answered by tungstenite; close ends the stream below.
        _ => None,
    }
}

#[async_trait]
impl ChannelSource for WsChannel {
    async fn subscribe(&self) -> Result<MessageStream, ChannelError> {
        let (mut socket, _) = connect_async(self.url.as_str())
            .await
            .map_err(|err| ChannelError::Transport(format!("connect to {}: {err}", self.url)))?;

        socket
            .send(Message::Text(self.session_id.clone()))
            .await
            .map_err(|err| ChannelError::Transport(format!("session hello: {err}")))?;

        let frames = socket
            .take_while(|message| futures_util::future::ready(!matches!(message, Ok(Message::Close(_)))))
            .filter_map(|message| async move {
                match message {
                    Ok(message) => {
                        let frame = frame_text(message);
                        if let Some(Ok(text)) = &frame {
                            log_debug!("[channel] frame: {text}");
                        }
                        frame
                    }
                    Err(err) => Some(Err(ChannelError::Transport(err.to_string()))),
                }
            });

        Ok(Box::pin(frames))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_and_utf8_binary_frames_become_messages() {
        assert_eq!(
            frame_text(Message::Text("{}".into())).unwrap().unwrap(),
            "{}"
        );
        assert_eq!(
            frame_text(Message::Binary(b"{\"a\":1}".to_vec())).unwrap().unwrap(),
            "{\"a\":1}"
        );
        assert!(frame_text(Message::Binary(vec![0xff, 0xfe])).unwrap().is_err());
        assert!(frame_text(Message::Ping(Vec::new())).is_none());
    }

    #[tokio::test]
    async fn unreachable_hub_is_a_transport_error() {
        let channel = WsChannel::new("ws://127.0.0.1:9", "0");
        match channel.subscribe().await {
            Err(ChannelError::Transport(reason)) => assert!(reason.contains("127.0.0.1:9")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("connected to a closed port"),
        }
    }
}
