//! Built-in invitation handler.
//!
//! Applies the same rule-engine pattern as the message normalizer to
//! membership changes: invitations addressed to the bot itself are accepted
//! by joining the referenced room.

use {
    bramble_common::types::{Membership, MembershipChange, RawEvent, UserId},
    bramble_rules::{EventContext, Rule},
    tokio::sync::broadcast::error::RecvError,
    tracing::{info, warn},
};

use crate::{
    error::ExtensionError,
    extension::{ExtensionBehavior, ExtensionContext},
};

/// Rule payload: the membership change plus the bot's own identity, passed
/// explicitly so the rules stay pure.
#[derive(Debug)]
pub struct InviteContext {
    pub change: MembershipChange,
    pub bot: UserId,
}

/// Automatically joins rooms the bot is invited to.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptInvitations;

impl ExtensionBehavior for AcceptInvitations {
    type Ctx = InviteContext;

    fn name(&self) -> &'static str {
        "accept-invitations"
    }

    fn description(&self) -> &'static str {
        "Automatically join rooms when the bot receives an invitation"
    }

    fn rules(&self) -> Vec<Rule<InviteContext>> {
        vec![
            Rule::reject_when(1, "only invitations", |ctx: &EventContext<InviteContext>| {
                ctx.data.change.membership != Membership::Invite
            }),
            Rule::reject_when(
                2,
                "only when bot is recipient",
                |ctx: &EventContext<InviteContext>| ctx.data.change.user != ctx.data.bot,
            ),
        ]
    }

    fn bind_listeners(&self, ext: &ExtensionContext<InviteContext>) -> Result<(), ExtensionError> {
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
                let RawEvent::Membership(change) = event else {
                    continue;
                };
                let Some(bot) = ext.handle().user_id() else {
                    break;
                };

                let mut ctx = EventContext::new(InviteContext { change, bot });
                if !ext.check_rules(&mut ctx).result {
                    continue;
                }
                let change = ctx.into_data().change;

                ext.span().in_scope(|| {
                    info!(room = %change.room, sender = %change.sender, "received room invitation, joining");
                });
                if let Err(error) = ext.handle().join_room(&change.room).await {
                    ext.span()
                        .in_scope(|| warn!(%error, room = %change.room, "failed to join room"));
                }
            }
        });

        Ok(())
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use {
        std::{sync::Arc, time::Duration},
        tokio::time::timeout,
    };

    use {
        super::*,
        crate::{
            bus::BusEvent,
            config::HostConfig,
            extension::Extension,
            host::Host,
            testing::MemoryTransport,
        },
        bramble_common::types::RoomId,
        bramble_rules::RuleEngine,
        serde_json::json,
    };

    fn invite(user: &str) -> InviteContext {
        InviteContext {
            change: MembershipChange {
                room: RoomId::from("!room:example.org"),
                user: UserId::from(user),
                sender: UserId::from("@alice:example.org"),
                membership: Membership::Invite,
            },
            bot: UserId::from("@bot:example.org"),
        }
    }

    #[test]
    fn rule_set_accepts_invitations_for_the_bot() {
        let engine = RuleEngine::new(AcceptInvitations.rules());
        let mut ctx = EventContext::new(invite("@bot:example.org"));
        assert!(engine.evaluate(&mut ctx).result);
    }

    #[test]
    fn rule_set_rejects_invitations_for_other_users() {
        let engine = RuleEngine::new(AcceptInvitations.rules());
        let mut ctx = EventContext::new(invite("@carol:example.org"));
        assert!(!engine.evaluate(&mut ctx).result);
    }

    #[test]
    fn rule_set_rejects_non_invite_memberships() {
        let engine = RuleEngine::new(AcceptInvitations.rules());
        let mut joined = invite("@bot:example.org");
        joined.change.membership = Membership::Join;
        let mut ctx = EventContext::new(joined);
        assert!(!engine.evaluate(&mut ctx).result);
    }

    #[tokio::test]
    async fn joins_rooms_the_bot_is_invited_to() {
        let transport = Arc::new(MemoryTransport::new());
        let host = Host::new(HostConfig::new("@bot:example.org"), transport.clone());
        let invitations =
            Extension::build(&host.handle(), AcceptInvitations, json!({})).unwrap();
        host.register([invitations]).unwrap();

        let mut bus = host.subscribe();
        transport.inject_membership(
            "!room:example.org",
            "@bot:example.org",
            "@alice:example.org",
            Membership::Invite,
        );

        let room = timeout(Duration::from_secs(1), async {
            loop {
                match bus.recv().await.unwrap() {
                    BusEvent::JoinRoom { room } => break room,
                    _ => continue,
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(room.as_str(), "!room:example.org");
        assert_eq!(transport.joined_rooms(), vec![room]);
    }

    #[tokio::test]
    async fn ignores_invitations_for_other_users() {
        let transport = Arc::new(MemoryTransport::new());
        let host = Host::new(HostConfig::new("@bot:example.org"), transport.clone());
        let invitations =
            Extension::build(&host.handle(), AcceptInvitations, json!({})).unwrap();
        host.register([invitations]).unwrap();

        transport.inject_membership(
            "!room:example.org",
            "@carol:example.org",
            "@alice:example.org",
            Membership::Invite,
        );
        // Let the listener task drain the injected event.
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(transport.joined_rooms().is_empty());
    }
}
