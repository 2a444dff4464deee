//! Identifier newtypes and the raw transport event model.
//!
//! Raw events are what the chat transport delivers before any filtering or
//! normalization. Extensions normally consume the canonical bus events
//! derived from these instead.

use {
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// Platform event type carried by timeline entries for plain text messages.
pub const TEXT_MESSAGE_TYPE: &str = "m.room.message";

// ── Identifiers ─────────────────────────────────────────────────────────────

/// Opaque room identifier assigned by the chat server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

/// Fully-qualified user identifier (e.g. `@bot:example.org`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl RoomId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl UserId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ── Raw transport events ────────────────────────────────────────────────────

/// Unfiltered event delivered by the transport's raw stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawEvent {
    /// A room timeline entry (messages, state changes, anything the server
    /// puts on the timeline).
    Timeline(TimelineEntry),
    /// A room membership change (invite, join, leave, ...).
    Membership(MembershipChange),
}

/// One entry of a room timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// Platform event type (e.g. [`TEXT_MESSAGE_TYPE`]).
    pub event_type: String,
    pub room: RoomId,
    pub sender: UserId,
    pub content: MessageContent,
    /// True when this entry is historical replay delivered during sync
    /// rather than a live event.
    #[serde(default)]
    pub backfill: bool,
}

/// Body of a message-bearing timeline entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageContent {
    pub body: String,
    /// Platform-specific fields beyond the plain body.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub extra: serde_json::Value,
}

impl MessageContent {
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            extra: serde_json::Value::Null,
        }
    }
}

/// A change to one user's membership in one room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipChange {
    pub room: RoomId,
    /// The user whose membership changed (for invitations, the invitee).
    pub user: UserId,
    /// The user who caused the change (for invitations, the inviter).
    pub sender: UserId,
    pub membership: Membership,
}

/// Membership states a room can hold for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Membership {
    Invite,
    Join,
    Leave,
    Ban,
    Knock,
}

impl fmt::Display for Membership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::Invite => "invite",
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Ban => "ban",
            Self::Knock => "knock",
        };
        f.write_str(value)
    }
}
