//! The extension contract.
//!
//! A concrete extension is an [`ExtensionBehavior`] implementation plus the
//! state the framework derives for it during [`Extension::build`]: merged
//! options, a scoped logger span, and a private rule engine. Construction is
//! a single-pass state machine — an extension either comes out fully built
//! with its listeners bound, or it does not come out at all.

use std::sync::Arc;

use {
    bramble_common::deep_merge,
    bramble_rules::{Evaluation, EventContext, Rule, RuleEngine},
    serde_json::Value,
    tracing::{Span, debug, info, info_span},
};

use crate::{error::ExtensionError, host::HostHandle};

/// What a concrete extension declares: identity, configuration defaults,
/// dependencies, rules, and the mandatory listener-binding step.
pub trait ExtensionBehavior: Send + Sync + 'static {
    /// Payload type its rules evaluate over.
    type Ctx: Send + 'static;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Type-level configuration defaults; instance options deep-merge over
    /// these at construction.
    fn defaults(&self) -> Value {
        Value::Object(serde_json::Map::new())
    }

    /// Names of extensions that must already be registered on the host when
    /// this one is constructed.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// The rule set this extension's private engine is built from.
    fn rules(&self) -> Vec<Rule<Self::Ctx>> {
        Vec::new()
    }

    /// Subscribe to host-bus or raw transport events and spawn listener
    /// tasks. Runs last during construction and is the only step allowed
    /// externally visible side effects.
    ///
    /// Every behavior must override this; the default implementation fails
    /// construction with [`ExtensionError::Contract`].
    fn bind_listeners(&self, ext: &ExtensionContext<Self::Ctx>) -> Result<(), ExtensionError> {
        let _ = ext;
        Err(ExtensionError::Contract {
            extension: self.name().to_string(),
        })
    }
}

/// Per-extension state handed to [`ExtensionBehavior::bind_listeners`] and
/// cloned into listener tasks.
pub struct ExtensionContext<T> {
    name: &'static str,
    handle: HostHandle,
    options: Arc<Value>,
    engine: Arc<RuleEngine<T>>,
    span: Span,
}

// Manual impl: `T` itself need not be `Clone`.
impl<T> Clone for ExtensionContext<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            handle: self.handle.clone(),
            options: Arc::clone(&self.options),
            engine: Arc::clone(&self.engine),
            span: self.span.clone(),
        }
    }
}

impl<T> ExtensionContext<T> {
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn handle(&self) -> &HostHandle {
        &self.handle
    }

    /// The merged configuration (instance options over defaults).
    #[must_use]
    pub fn options(&self) -> &Value {
        &self.options
    }

    /// The extension's logger span.
    #[must_use]
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Evaluate this extension's rule set against `ctx`.
    pub fn check_rules(&self, ctx: &mut EventContext<T>) -> Evaluation {
        let _guard = self.span.enter();
        debug!("checking event against rule set");
        self.engine.evaluate(ctx)
    }
}

/// A fully constructed extension, ready for registration.
pub struct Extension {
    name: String,
    description: String,
    options: Value,
    handle: HostHandle,
}

impl Extension {
    /// Run the construction state machine:
    ///
    /// 1. probe the host capability set,
    /// 2. deep-merge instance options over the behavior's defaults,
    /// 3. derive a logger span scoped with the extension name,
    /// 4. build the private rule engine,
    /// 5. check declared dependencies against the host's current registry,
    /// 6. bind listeners.
    ///
    /// Any failure aborts before listener binding takes effect; no partially
    /// constructed extension escapes.
    pub fn build<B: ExtensionBehavior>(
        handle: &HostHandle,
        behavior: B,
        options: Value,
    ) -> Result<Arc<Self>, ExtensionError> {
        let name = behavior.name();

        let shared = handle.verify(name)?;

        let merged = deep_merge(&behavior.defaults(), &options);

        let span = info_span!("extension", name);

        let engine = Arc::new(RuleEngine::new(behavior.rules()));

        let registered = shared.registry_names();
        for dependency in behavior.dependencies() {
            if !registered.contains(&dependency) {
                return Err(ExtensionError::Dependency {
                    extension: name.to_string(),
                    dependency,
                });
            }
        }
        drop(shared);

        let ctx = ExtensionContext {
            name,
            handle: handle.clone(),
            options: Arc::new(merged.clone()),
            engine,
            span: span.clone(),
        };
        behavior.bind_listeners(&ctx)?;

        span.in_scope(|| info!("extension initialized"));

        Ok(Arc::new(Self {
            name: name.to_string(),
            description: behavior.description().to_string(),
            options: merged,
            handle: handle.clone(),
        }))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The merged configuration this extension was constructed with.
    #[must_use]
    pub fn options(&self) -> &Value {
        &self.options
    }

    pub(crate) fn handle(&self) -> &HostHandle {
        &self.handle
    }
}

impl std::fmt::Debug for Extension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extension")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
