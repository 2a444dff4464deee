//! Built-in message normalizer.
//!
//! Filters the transport's raw timeline stream through a fixed rule set and
//! republishes what survives as canonical `message` events, each carrying a
//! reply capability bound to the originating room.

use {
    bramble_common::types::{RawEvent, TEXT_MESSAGE_TYPE, TimelineEntry},
    bramble_rules::{EventContext, Rule},
    tokio::sync::broadcast::error::RecvError,
    tracing::{info, warn},
};

use crate::{
    bus::{BusEvent, MessageEvent, Reply},
    error::ExtensionError,
    extension::{ExtensionBehavior, ExtensionContext},
};

/// Publishes a canonical `message` event for every live chat message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeMessages;

impl ExtensionBehavior for NormalizeMessages {
    type Ctx = TimelineEntry;

    fn name(&self) -> &'static str {
        "normalize-messages"
    }

    fn description(&self) -> &'static str {
        "Publishes a \"message\" event to all subscribed listeners when a chat message is received"
    }

    fn rules(&self) -> Vec<Rule<TimelineEntry>> {
        vec![
            Rule::reject_when(1, "only text messages", |ctx: &EventContext<TimelineEntry>| {
                ctx.data.event_type != TEXT_MESSAGE_TYPE
            }),
            Rule::reject_when(2, "no backfill", |ctx: &EventContext<TimelineEntry>| {
                ctx.data.backfill
            }),
        ]
    }

    fn bind_listeners(&self, ext: &ExtensionContext<TimelineEntry>) -> Result<(), ExtensionError> {
        let mut raw = ext.handle().raw_events();
        let ext = ext.clone();

        tokio::spawn(async move {
            loop {
                let event = match raw.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        ext.span().in_scope(|| warn!(skipped, "raw event stream lagged"));
                        continue;
                    },
                    Err(RecvError::Closed) => break,
                };
                let RawEvent::Timeline(entry) = event else {
                    continue;
                };

                let mut ctx = EventContext::new(entry);
                if !ext.check_rules(&mut ctx).result {
                    continue;
                }
                let entry = ctx.into_data();

                ext.span().in_scope(|| {
                    info!(sender = %entry.sender, body = %entry.content.body, "received message");
                });

                let reply = Reply::new(ext.handle().clone(), entry.room.clone());
                ext.handle().emit(BusEvent::Message(MessageEvent {
                    sender: entry.sender.clone(),
                    content: entry.content.clone(),
                    raw: entry,
                    reply,
                }));
            }
        });

        Ok(())
    }
}
