//! The bramble plugin framework.
//!
//! A [`Host`] owns an ordered extension registry, a broadcast bus of
//! canonical [`BusEvent`]s, and a [`ChatTransport`]. Extensions implement
//! [`ExtensionBehavior`] and are constructed through [`Extension::build`],
//! which enforces the contract: host capability probe, option merging,
//! scoped logging, a private rule engine, dependency validation, and the
//! mandatory listener-binding step — in that order, all-or-nothing.
//!
//! Two built-in behaviors consume the raw transport stream:
//! [`NormalizeMessages`] turns live chat messages into canonical `message`
//! events with a bound [`bus::Reply`], and [`AcceptInvitations`] joins rooms
//! the bot is invited to.

pub mod bus;
pub mod config;
pub mod error;
pub mod extension;
pub mod host;
pub mod invitations;
pub mod normalize;
pub mod testing;
pub mod transport;

pub use {
    bus::{BusEvent, MessageEvent, Reply},
    config::{HostConfig, LoggingConfig, init_logging},
    error::{ExtensionError, RegistrationError},
    extension::{Extension, ExtensionBehavior, ExtensionContext},
    host::{Host, HostHandle, PluginInfo, SendOptions},
    invitations::AcceptInvitations,
    normalize::NormalizeMessages,
    transport::{ChatTransport, TransportError},
};
