use thiserror::Error;

/// Construction-time failures of the extension contract.
///
/// All variants are synchronous, fatal to the construction that raised them,
/// and never retried: a failed extension does not exist.
#[derive(Debug, Error)]
pub enum ExtensionError {
    /// The host handle no longer exposes the required capability set.
    #[error("extension \"{extension}\": host capability check failed: {reason}")]
    Configuration { extension: String, reason: String },

    /// The behavior does not override the mandatory listener-binding step.
    #[error("extension \"{extension}\" must bind listeners")]
    Contract { extension: String },

    /// A declared dependency is not present in the host registry.
    #[error("extension \"{extension}\" requires \"{dependency}\" to be registered first")]
    Dependency {
        extension: String,
        dependency: String,
    },

    /// Behavior-specific construction failure.
    #[error("{0}")]
    Message(String),
}

impl ExtensionError {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

/// A value passed to [`Host::register`](crate::Host::register) that does not
/// conform to the extension contract.
#[derive(Debug, Error)]
#[error("cannot register \"{extension}\": {reason}")]
pub struct RegistrationError {
    pub extension: String,
    pub reason: String,
}
