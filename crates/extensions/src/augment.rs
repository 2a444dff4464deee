//! Augment extension: republishes incoming messages with a textual analysis.
//!
//! Consumers subscribe to the derived `message.nlp` event instead of the
//! plain `message` event when they want the analysis alongside the original
//! content and reply capability.

use {
    bramble_core::{BusEvent, ExtensionBehavior, ExtensionContext, ExtensionError},
    serde_json::{Value, json},
    tokio::sync::broadcast::error::RecvError,
    tracing::warn,
};

/// Name of the derived event this extension publishes.
pub const AUGMENTED_EVENT: &str = "message.nlp";

/// Attaches a simple analysis to every canonical message and republishes it
/// as [`AUGMENTED_EVENT`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Augment;

impl ExtensionBehavior for Augment {
    type Ctx = ();

    fn name(&self) -> &'static str {
        "augment"
    }

    fn description(&self) -> &'static str {
        "Republishes incoming messages as \"message.nlp\" events carrying a textual analysis"
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["normalize-messages".to_string()]
    }

    fn bind_listeners(&self, ext: &ExtensionContext<()>) -> Result<(), ExtensionError> {
        let mut bus = ext.handle().subscribe();
        let ext = ext.clone();

        tokio::spawn(async move {
            loop {
                match bus.recv().await {
                    Ok(BusEvent::Message(message)) => {
                        let payload = analyze(&message.content.body);
                        ext.handle().emit(BusEvent::Derived {
                            name: AUGMENTED_EVENT.to_string(),
                            message: Some(message),
                            payload,
                        });
                    },
                    Ok(_) => {},
                    Err(RecvError::Lagged(skipped)) => {
                        ext.span().in_scope(|| warn!(skipped, "bus lagged"));
                    },
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Ok(())
    }
}

/// Tokenize and measure a message body.
#[must_use]
pub fn analyze(body: &str) -> Value {
    let tokens: Vec<String> = body
        .split_whitespace()
        .map(|token| {
            token
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|token| !token.is_empty())
        .collect();

    json!({
        "chars": body.chars().count(),
        "words": tokens.len(),
        "tokens": tokens,
        "lowercase": body.to_lowercase(),
    })
}
