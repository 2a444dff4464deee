//! In-process transport for tests and embedded hosts.
//!
//! [`MemoryTransport`] implements [`ChatTransport`] without any network:
//! raw events are injected by hand and outbound effects are recorded for
//! later assertions.

use std::sync::{
    Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use {
    async_trait::async_trait,
    bramble_common::types::{
        Membership, MembershipChange, MessageContent, RawEvent, RoomId, TEXT_MESSAGE_TYPE,
        TimelineEntry, UserId,
    },
    tokio::sync::broadcast,
};

use crate::transport::{ChatTransport, Result};

const RAW_CAPACITY: usize = 256;

/// A text message recorded by [`MemoryTransport::send_text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentText {
    pub room: RoomId,
    pub body: String,
}

/// A blob recorded by [`MemoryTransport::upload_content`].
#[derive(Debug, Clone)]
pub struct Upload {
    pub content_type: String,
    pub len: usize,
}

#[derive(Debug)]
pub struct MemoryTransport {
    raw: broadcast::Sender<RawEvent>,
    connected: AtomicBool,
    sent: Mutex<Vec<SentText>>,
    joined: Mutex<Vec<RoomId>>,
    avatar: Mutex<Option<String>>,
    uploads: Mutex<Vec<Upload>>,
    upload_seq: AtomicUsize,
}

impl MemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        let (raw, _) = broadcast::channel(RAW_CAPACITY);
        Self {
            raw,
            connected: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            joined: Mutex::new(Vec::new()),
            avatar: Mutex::new(None),
            uploads: Mutex::new(Vec::new()),
            upload_seq: AtomicUsize::new(0),
        }
    }

    /// Push a raw event to every subscriber.
    pub fn inject(&self, event: RawEvent) {
        let _ = self.raw.send(event);
    }

    /// Push a live text message.
    pub fn inject_message(&self, room: &str, sender: &str, body: &str) {
        self.inject(RawEvent::Timeline(TimelineEntry {
            event_type: TEXT_MESSAGE_TYPE.to_string(),
            room: RoomId::from(room),
            sender: UserId::from(sender),
            content: MessageContent::text(body),
            backfill: false,
        }));
    }

    /// Push a historical (backfill) text message.
    pub fn inject_backfill(&self, room: &str, sender: &str, body: &str) {
        self.inject(RawEvent::Timeline(TimelineEntry {
            event_type: TEXT_MESSAGE_TYPE.to_string(),
            room: RoomId::from(room),
            sender: UserId::from(sender),
            content: MessageContent::text(body),
            backfill: true,
        }));
    }

    /// Push a membership change.
    pub fn inject_membership(&self, room: &str, user: &str, sender: &str, membership: Membership) {
        self.inject(RawEvent::Membership(MembershipChange {
            room: RoomId::from(room),
            user: UserId::from(user),
            sender: UserId::from(sender),
            membership,
        }));
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Everything sent with `send_text`, oldest first.
    #[must_use]
    pub fn sent_texts(&self) -> Vec<SentText> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Rooms joined, oldest first.
    #[must_use]
    pub fn joined_rooms(&self) -> Vec<RoomId> {
        self.joined
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Pre-set the account avatar, as if one already existed server-side.
    pub fn set_existing_avatar(&self, uri: &str) {
        *self.avatar.lock().unwrap_or_else(|e| e.into_inner()) = Some(uri.to_string());
    }

    #[must_use]
    pub fn current_avatar(&self) -> Option<String> {
        self.avatar
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Blobs uploaded, oldest first.
    #[must_use]
    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for MemoryTransport {
    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::Relaxed);
        Ok(())
    }

    async fn join_room(&self, room: &RoomId) -> Result<()> {
        self.joined
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(room.clone());
        Ok(())
    }

    async fn send_text(&self, room: &RoomId, body: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SentText {
                room: room.clone(),
                body: body.to_string(),
            });
        Ok(())
    }

    fn raw_events(&self) -> broadcast::Receiver<RawEvent> {
        self.raw.subscribe()
    }

    async fn avatar_url(&self, _user: &UserId) -> Result<Option<String>> {
        Ok(self.current_avatar())
    }

    async fn upload_content(&self, data: Vec<u8>, content_type: &str) -> Result<String> {
        self.uploads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Upload {
                content_type: content_type.to_string(),
                len: data.len(),
            });
        let seq = self.upload_seq.fetch_add(1, Ordering::Relaxed);
        Ok(format!("mem://content/{seq}"))
    }

    async fn set_avatar_url(&self, uri: &str) -> Result<()> {
        *self.avatar.lock().unwrap_or_else(|e| e.into_inner()) = Some(uri.to_string());
        Ok(())
    }
}
