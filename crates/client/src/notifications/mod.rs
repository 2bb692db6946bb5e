//! Live notification channel.
//!
//! - `Backoff` - reconnect delay arithmetic
//! - `Connector` / `WsConnector` - opens the push socket
//! - `NotificationChannel` - reconnect state machine and the held list

mod backoff;
mod channel;
mod transport;

use async_trait::async_trait;

use crate::error::ClientError;

pub use backoff::Backoff;
pub use channel::{ChannelState, NotificationChannel};
pub use transport::{Connector, FrameStream, WsConnector};

/// Tells the server a notification was read.
#[async_trait]
pub trait ReadReceipts: Send + Sync {
    async fn mark_read(&self, notification_id: u64) -> Result<(), ClientError>;
}
