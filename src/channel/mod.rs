//! The push channel a view subscribes to.

pub mod ws;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::error::ChannelError;

pub use ws::WsChannel;

/// Raw text frames in arrival order. Dropping the stream unsubscribes.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<String, ChannelError>> + Send>>;

#[async_trait]
pub trait ChannelSource: Send + Sync {
    /// Opens one subscription. Each view holds exactly one at a time.
    async fn subscribe(&self) -> Result<MessageStream, ChannelError>;
}
