//! The host: extension registry, event bus, and transport front-end.

use std::sync::{Arc, RwLock, Weak};

use {
    bramble_common::types::{RawEvent, RoomId, UserId},
    serde::Serialize,
    tokio::sync::broadcast,
    tracing::{debug, error, info},
};

use crate::{
    bus::BusEvent,
    config::HostConfig,
    error::{ExtensionError, RegistrationError},
    extension::Extension,
    transport::{self, ChatTransport},
};

/// Buffered events per bus subscriber before a slow consumer starts lagging.
const BUS_CAPACITY: usize = 256;

// ── Registry ────────────────────────────────────────────────────────────────

/// Ordered collection of registered extensions.
///
/// Insertion order is registration order and names are not forced unique.
/// [`Registry::append`] is the only mutation point.
#[derive(Default)]
pub(crate) struct Registry {
    entries: Vec<Arc<Extension>>,
}

impl Registry {
    fn append(&mut self, extension: Arc<Extension>) {
        self.entries.push(extension);
    }

    fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name().to_string()).collect()
    }

    fn entries(&self) -> Vec<Arc<Extension>> {
        self.entries.clone()
    }
}

/// Read-only projection of one registered extension.
#[derive(Debug, Clone, Serialize)]
pub struct PluginInfo {
    pub name: String,
    pub description: String,
    /// The extension's merged configuration; present only in verbose
    /// listings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
}

// ── Host ────────────────────────────────────────────────────────────────────

pub(crate) struct HostShared {
    config: HostConfig,
    transport: Arc<dyn ChatTransport>,
    bus: broadcast::Sender<BusEvent>,
    registry: RwLock<Registry>,
}

impl HostShared {
    pub(crate) fn registry_names(&self) -> Vec<String> {
        self.registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .names()
    }
}

/// Options for outbound text messages.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Prefix the body with this user's name (`"{user}: {body}"`).
    pub mention: Option<UserId>,
}

/// Central coordinator: owns the extension registry, the event bus, and the
/// transport client. Created once per process and torn down only at process
/// exit — there is no unregistration path.
pub struct Host {
    shared: Arc<HostShared>,
}

impl Host {
    pub fn new(mut config: HostConfig, transport: Arc<dyn ChatTransport>) -> Self {
        if config.device_id.is_none() {
            config.device_id = Some(HostConfig::generate_device_id());
        }
        let (bus, _) = broadcast::channel(BUS_CAPACITY);

        debug!(
            user_id = %config.user_id,
            device_id = config.device_id.as_deref().unwrap_or_default(),
            "host initialized"
        );

        Self {
            shared: Arc::new(HostShared {
                config,
                transport,
                bus,
                registry: RwLock::new(Registry::default()),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &HostConfig {
        &self.shared.config
    }

    /// A capability handle for constructing extensions and, from listener
    /// tasks, talking back to the host. The handle is weak: it stops
    /// exposing capabilities once the host is gone.
    #[must_use]
    pub fn handle(&self) -> HostHandle {
        HostHandle {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Subscribe to the host bus.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.shared.bus.subscribe()
    }

    /// Register extension instances, in order.
    ///
    /// Each instance is checked for conformance: it must carry a name and
    /// must have been built against this host. The first non-conforming
    /// instance publishes a `pluginError` event carrying it and fails the
    /// call — instances accepted before it stay registered, instances after
    /// it are not examined.
    pub fn register<I>(&self, extensions: I) -> Result<(), RegistrationError>
    where
        I: IntoIterator<Item = Arc<Extension>>,
    {
        for extension in extensions {
            if let Err(reason) = self.conformance(&extension) {
                let err = RegistrationError {
                    extension: extension.name().to_string(),
                    reason,
                };
                error!(error = %err, "plugin registration failed");
                let _ = self.shared.bus.send(BusEvent::PluginError {
                    error: err.to_string(),
                    extension: Arc::clone(&extension),
                });
                return Err(err);
            }

            self.shared
                .registry
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .append(Arc::clone(&extension));
            info!(name = extension.name(), "plugin registered");
            let _ = self.shared.bus.send(BusEvent::Plugin(extension));
        }
        Ok(())
    }

    fn conformance(&self, extension: &Extension) -> Result<(), String> {
        if extension.name().is_empty() {
            return Err("extension has no name".to_string());
        }
        if !extension.handle().is_for(&self.shared) {
            return Err("extension was built against a different host".to_string());
        }
        Ok(())
    }

    /// Names of all registered extensions, in registration order.
    #[must_use]
    pub fn plugin_names(&self) -> Vec<String> {
        self.shared.registry_names()
    }

    /// List registered extensions. With `verbose`, each entry also carries
    /// the extension's merged configuration. No side effects.
    #[must_use]
    pub fn list_plugins(&self, verbose: bool) -> Vec<PluginInfo> {
        self.shared
            .registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .entries()
            .iter()
            .map(|extension| PluginInfo {
                name: extension.name().to_string(),
                description: extension.description().to_string(),
                options: verbose.then(|| extension.options().clone()),
            })
            .collect()
    }

    /// Connect the transport and publish a `connect` event.
    pub async fn connect(&self) -> transport::Result<()> {
        self.shared.transport.connect().await?;
        let _ = self.shared.bus.send(BusEvent::Connect);
        Ok(())
    }

    /// Disconnect the transport and publish a `disconnect` event.
    pub async fn disconnect(&self) -> transport::Result<()> {
        self.shared.transport.disconnect().await?;
        let _ = self.shared.bus.send(BusEvent::Disconnect);
        Ok(())
    }

    /// Join `room` and publish a `joinRoom` event once joined.
    pub async fn join_room(&self, room: &RoomId) -> transport::Result<()> {
        self.shared.transport.join_room(room).await?;
        let _ = self.shared.bus.send(BusEvent::JoinRoom { room: room.clone() });
        Ok(())
    }

    /// Send a text message into `room`.
    pub async fn send_text(
        &self,
        room: &RoomId,
        body: &str,
        options: SendOptions,
    ) -> transport::Result<()> {
        send_text(&self.shared, room, body, options).await
    }
}

async fn send_text(
    shared: &HostShared,
    room: &RoomId,
    body: &str,
    options: SendOptions,
) -> transport::Result<()> {
    match options.mention {
        Some(user) => {
            let body = format!("{user}: {body}");
            shared.transport.send_text(room, &body).await
        },
        None => shared.transport.send_text(room, body).await,
    }
}

// ── HostHandle ──────────────────────────────────────────────────────────────

/// Weak capability handle onto a [`Host`].
///
/// Extensions are constructed against a handle, not the host itself; the
/// construction-time capability probe and the `register` same-host check
/// both go through it. After the host is dropped, the handle's subscriptions
/// come back closed and its operations fail soft.
#[derive(Clone)]
pub struct HostHandle {
    shared: Weak<HostShared>,
}

impl HostHandle {
    /// Capability probe: the full host capability set (bus, logger scoping,
    /// registry listing) is available iff the host state is still alive.
    pub(crate) fn verify(&self, extension: &str) -> Result<Arc<HostShared>, ExtensionError> {
        self.shared
            .upgrade()
            .ok_or_else(|| ExtensionError::Configuration {
                extension: extension.to_string(),
                reason: "host has been torn down".to_string(),
            })
    }

    pub(crate) fn is_for(&self, shared: &Arc<HostShared>) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|mine| Arc::ptr_eq(&mine, shared))
    }

    /// Names currently in the host registry; empty when the host is gone.
    #[must_use]
    pub fn plugin_names(&self) -> Vec<String> {
        self.shared
            .upgrade()
            .map(|shared| shared.registry_names())
            .unwrap_or_default()
    }

    /// The bot's own user id, when the host is alive.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.shared
            .upgrade()
            .map(|shared| shared.config.user_id.clone())
    }

    /// Subscribe to the host bus. When the host is gone the receiver is
    /// already closed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        match self.shared.upgrade() {
            Some(shared) => shared.bus.subscribe(),
            None => closed_receiver(),
        }
    }

    /// Subscribe to the transport's raw event stream. When the host is gone
    /// the receiver is already closed.
    #[must_use]
    pub fn raw_events(&self) -> broadcast::Receiver<RawEvent> {
        match self.shared.upgrade() {
            Some(shared) => shared.transport.raw_events(),
            None => closed_receiver(),
        }
    }

    /// Direct access to the transport client, for extensions needing
    /// operations beyond the host's own surface (profile updates, content
    /// uploads).
    pub fn transport(&self) -> transport::Result<Arc<dyn ChatTransport>> {
        let shared = self.shared.upgrade().ok_or_else(host_gone)?;
        Ok(Arc::clone(&shared.transport))
    }

    /// Publish an event on the host bus. A missing host or an empty bus is
    /// not an error — steady-state dispatch is fail-soft.
    pub fn emit(&self, event: BusEvent) {
        if let Some(shared) = self.shared.upgrade() {
            let _ = shared.bus.send(event);
        }
    }

    /// Join `room` through the host, publishing `joinRoom` on success.
    pub async fn join_room(&self, room: &RoomId) -> transport::Result<()> {
        let shared = self.shared.upgrade().ok_or_else(host_gone)?;
        shared.transport.join_room(room).await?;
        let _ = shared.bus.send(BusEvent::JoinRoom { room: room.clone() });
        Ok(())
    }

    /// Send a text message into `room` through the host.
    pub async fn send_text(
        &self,
        room: &RoomId,
        body: &str,
        options: SendOptions,
    ) -> transport::Result<()> {
        let shared = self.shared.upgrade().ok_or_else(host_gone)?;
        send_text(&shared, room, body, options).await
    }
}

fn host_gone() -> transport::TransportError {
    transport::TransportError::message("host has been torn down")
}

fn closed_receiver<T: Clone>() -> broadcast::Receiver<T> {
    let (sender, receiver) = broadcast::channel(1);
    drop(sender);
    receiver
}
