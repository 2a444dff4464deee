//! Canonical events published on the host bus.
//!
//! Bus events are transport-independent: extensions subscribe to these, not
//! to the raw stream, unless they are in the business of normalizing raw
//! events themselves.

use std::{fmt, sync::Arc};

use bramble_common::types::{MessageContent, RoomId, TimelineEntry, UserId};

use crate::{
    extension::Extension,
    host::{HostHandle, SendOptions},
    transport,
};

/// An event on the host bus. Every variant has a stable name, retrievable
/// via [`BusEvent::name`], matching the subscription surface of the original
/// named-event bus.
#[derive(Clone)]
pub enum BusEvent {
    /// The host connected its transport.
    Connect,
    /// The host disconnected its transport.
    Disconnect,
    /// An extension was registered; carries the instance.
    Plugin(Arc<Extension>),
    /// An extension failed registration; carries the error text and the
    /// offending instance.
    PluginError {
        error: String,
        extension: Arc<Extension>,
    },
    /// The host joined a room.
    JoinRoom { room: RoomId },
    /// A normalized chat message.
    Message(MessageEvent),
    /// An event published by a non-core extension (e.g. `message.nlp`).
    Derived {
        name: String,
        /// The canonical message this event was derived from, when there is
        /// one.
        message: Option<MessageEvent>,
        payload: serde_json::Value,
    },
}

impl BusEvent {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Plugin(_) => "plugin",
            Self::PluginError { .. } => "pluginError",
            Self::JoinRoom { .. } => "joinRoom",
            Self::Message(_) => "message",
            Self::Derived { name, .. } => name,
        }
    }
}

impl fmt::Debug for BusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plugin(extension) => f.debug_tuple("Plugin").field(&extension.name()).finish(),
            Self::PluginError { error, extension } => f
                .debug_struct("PluginError")
                .field("error", error)
                .field("extension", &extension.name())
                .finish(),
            Self::Message(message) => f.debug_tuple("Message").field(message).finish(),
            Self::Derived { name, .. } => f.debug_tuple("Derived").field(name).finish(),
            other => f.write_str(other.name()),
        }
    }
}

/// A normalized chat message plus its bound reply capability.
#[derive(Clone)]
pub struct MessageEvent {
    /// The raw timeline entry the message was derived from.
    pub raw: TimelineEntry,
    pub sender: UserId,
    pub content: MessageContent,
    pub reply: Reply,
}

impl fmt::Debug for MessageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageEvent")
            .field("sender", &self.sender)
            .field("body", &self.content.body)
            .finish_non_exhaustive()
    }
}

/// Sends text back into the room a message arrived from.
///
/// Closed over the originating room id at normalization time so consumers
/// never have to track where a message came from.
#[derive(Clone)]
pub struct Reply {
    handle: HostHandle,
    room: RoomId,
}

impl Reply {
    pub(crate) fn new(handle: HostHandle, room: RoomId) -> Self {
        Self { handle, room }
    }

    #[must_use]
    pub fn room(&self) -> &RoomId {
        &self.room
    }

    /// Send `body` into the originating room.
    pub async fn send(&self, body: &str) -> transport::Result<()> {
        self.handle
            .send_text(&self.room, body, SendOptions::default())
            .await
    }

    /// Send `body` into the originating room, mentioning `user`.
    pub async fn send_mentioning(&self, body: &str, user: &UserId) -> transport::Result<()> {
        self.handle
            .send_text(
                &self.room,
                body,
                SendOptions {
                    mention: Some(user.clone()),
                },
            )
            .await
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply").field("room", &self.room).finish()
    }
}
