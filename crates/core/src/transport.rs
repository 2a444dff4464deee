//! The chat-transport seam.
//!
//! The framework never speaks a wire protocol itself; everything it needs
//! from the chat server goes through [`ChatTransport`]. Implementations own
//! connection lifecycle and delivery semantics — the host treats both as
//! opaque and in particular leaves idempotency of connect/disconnect to the
//! transport.

use {
    async_trait::async_trait,
    bramble_common::types::{RawEvent, RoomId, UserId},
    thiserror::Error,
    tokio::sync::broadcast,
};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{message}")]
    Message { message: String },

    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl TransportError {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Client for one chat server connection.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Start the client session.
    async fn connect(&self) -> Result<()>;

    /// Stop the client session.
    async fn disconnect(&self) -> Result<()>;

    /// Join the given room.
    async fn join_room(&self, room: &RoomId) -> Result<()>;

    /// Send a plain text message into the given room.
    async fn send_text(&self, room: &RoomId, body: &str) -> Result<()>;

    /// Subscribe to the raw event stream (timeline entries and membership
    /// changes). Every subscriber sees every event.
    fn raw_events(&self) -> broadcast::Receiver<RawEvent>;

    /// The avatar content URI currently set for `user`, if any.
    async fn avatar_url(&self, _user: &UserId) -> Result<Option<String>> {
        Ok(None)
    }

    /// Upload a blob to the server's content store, returning its URI.
    async fn upload_content(&self, _data: Vec<u8>, _content_type: &str) -> Result<String> {
        Err(TransportError::message("content upload not supported"))
    }

    /// Point the bot account's avatar at a previously uploaded URI.
    async fn set_avatar_url(&self, _uri: &str) -> Result<()> {
        Err(TransportError::message("profile updates not supported"))
    }
}
