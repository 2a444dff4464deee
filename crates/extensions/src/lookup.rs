//! Lookup extension: answers chat commands with results from configurable
//! search engines.
//!
//! Engines are plain configuration — base URL, query parameter, fixed
//! parameters, response shape, aliases — merged from the extension defaults
//! the same way as any other options. The listener answers messages of the
//! form `!lookup [engine] query` through the bound reply capability.

use std::{
    collections::BTreeMap,
    sync::{Arc, OnceLock, RwLock},
};

use {
    bramble_core::{
        BusEvent, ExtensionBehavior, ExtensionContext, ExtensionError, HostHandle, MessageEvent,
    },
    bramble_rules::{EventContext, Rule},
    serde::{Deserialize, Serialize},
    serde_json::{Value, json},
    tokio::sync::broadcast::error::RecvError,
    tracing::{info, warn},
};

use crate::error::Error;

/// Derived event published when an engine is added at runtime.
pub const ENGINE_ADDED_EVENT: &str = "searchengine.add";
/// Derived event published when an engine is removed at runtime.
pub const ENGINE_REMOVED_EVENT: &str = "searchengine.remove";

const DEFAULT_PREFIX: &str = "!lookup";
const SUMMARY_LIMIT: usize = 400;

// ── Engine configuration ────────────────────────────────────────────────────

/// How a search engine's HTTP response should be interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    Json,
    #[default]
    Text,
}

/// One configured search engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchEngine {
    #[serde(default)]
    pub aliases: Vec<String>,
    pub base_url: String,
    /// Query-string parameter the search terms go into.
    pub query_param: String,
    /// Fixed parameters appended to every query.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub response: ResponseKind,
}

/// A search result in the shape the engine declared.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Json(Value),
    Text(String),
}

impl SearchOutcome {
    /// A reply-sized rendering of the outcome.
    #[must_use]
    pub fn summary(&self, limit: usize) -> String {
        let full = match self {
            Self::Json(value) => value.to_string(),
            Self::Text(text) => text.split_whitespace().collect::<Vec<_>>().join(" "),
        };
        if full.chars().count() <= limit {
            full
        } else {
            let mut truncated: String = full.chars().take(limit).collect();
            truncated.push('…');
            truncated
        }
    }
}

/// Build the query URL for `engine`: fixed params first, search terms last.
pub fn build_query_url(engine: &SearchEngine, query: &str) -> Result<url::Url, Error> {
    let mut url = url::Url::parse(&engine.base_url)?;
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &engine.params {
            pairs.append_pair(key, value);
        }
        pairs.append_pair(&engine.query_param, query);
    }
    Ok(url)
}

#[derive(Default)]
struct EngineSet {
    engines: BTreeMap<String, SearchEngine>,
    default_engine: String,
}

impl EngineSet {
    /// Exact name first, then alias scan.
    fn find(&self, name_or_alias: &str) -> Option<(String, SearchEngine)> {
        if let Some(engine) = self.engines.get(name_or_alias) {
            return Some((name_or_alias.to_string(), engine.clone()));
        }
        self.engines
            .iter()
            .find(|(_, engine)| engine.aliases.iter().any(|alias| alias == name_or_alias))
            .map(|(name, engine)| (name.clone(), engine.clone()))
    }

    fn default(&self) -> Option<(String, SearchEngine)> {
        self.engines
            .get(&self.default_engine)
            .map(|engine| (self.default_engine.clone(), engine.clone()))
    }
}

/// The merged option keys this extension understands.
#[derive(Deserialize)]
struct LookupOptions {
    #[serde(default)]
    engines: BTreeMap<String, SearchEngine>,
    #[serde(default)]
    default_engine: String,
}

// ── Client ──────────────────────────────────────────────────────────────────

/// Engine registry plus HTTP client, shared between the listener task and
/// any embedder that wants to add or remove engines at runtime.
pub struct LookupClient {
    engines: RwLock<EngineSet>,
    handle: OnceLock<HostHandle>,
    http: reqwest::Client,
}

impl LookupClient {
    fn new() -> Self {
        Self {
            engines: RwLock::new(<EngineSet as Default>::default()),
            handle: OnceLock::new(),
            http: reqwest::Client::new(),
        }
    }

    /// Replace the engine set from merged extension options.
    fn configure(&self, options: &Value) -> Result<(), Error> {
        let parsed: LookupOptions = serde_json::from_value(options.clone())?;
        let mut engines = self.engines.write().unwrap_or_else(|e| e.into_inner());
        engines.engines = parsed.engines;
        engines.default_engine = parsed.default_engine;
        Ok(())
    }

    #[must_use]
    pub fn engine_names(&self) -> Vec<String> {
        self.engines
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .engines
            .keys()
            .cloned()
            .collect()
    }

    /// Resolve by name or alias, falling back to the default engine.
    #[must_use]
    pub fn resolve(&self, name_or_alias: &str) -> Option<(String, SearchEngine)> {
        let engines = self.engines.read().unwrap_or_else(|e| e.into_inner());
        engines.find(name_or_alias).or_else(|| engines.default())
    }

    fn find_exact(&self, name_or_alias: &str) -> Option<(String, SearchEngine)> {
        self.engines
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .find(name_or_alias)
    }

    /// Add (or replace) an engine, publishing [`ENGINE_ADDED_EVENT`].
    pub fn add_engine(&self, name: impl Into<String>, engine: SearchEngine) {
        let name = name.into();
        self.engines
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .engines
            .insert(name.clone(), engine);
        self.emit_engine_event(ENGINE_ADDED_EVENT, &name);
    }

    /// Remove an engine, publishing [`ENGINE_REMOVED_EVENT`] if it existed.
    pub fn remove_engine(&self, name: &str) -> bool {
        let removed = self
            .engines
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .engines
            .remove(name)
            .is_some();
        if removed {
            self.emit_engine_event(ENGINE_REMOVED_EVENT, name);
        }
        removed
    }

    fn emit_engine_event(&self, event: &str, engine: &str) {
        if let Some(handle) = self.handle.get() {
            handle.emit(BusEvent::Derived {
                name: event.to_string(),
                message: None,
                payload: json!({ "engine": engine }),
            });
        }
    }

    /// Run a search. `selector` picks an engine by name or alias; `None`
    /// uses the default engine.
    pub async fn search(
        &self,
        selector: Option<&str>,
        query: &str,
    ) -> Result<(String, SearchOutcome), Error> {
        let (name, engine) = match selector {
            Some(selector) => self
                .resolve(selector)
                .ok_or_else(|| Error::UnknownEngine(selector.to_string()))?,
            None => {
                let engines = self.engines.read().unwrap_or_else(|e| e.into_inner());
                engines
                    .default()
                    .ok_or_else(|| Error::message("no default search engine configured"))?
            },
        };

        let url = build_query_url(&engine, query)?;
        let response = self.http.get(url).send().await?.error_for_status()?;
        let outcome = match engine.response {
            ResponseKind::Json => SearchOutcome::Json(response.json().await?),
            ResponseKind::Text => SearchOutcome::Text(response.text().await?),
        };
        Ok((name, outcome))
    }
}

// ── Command parsing ─────────────────────────────────────────────────────────

/// Strip the command prefix; `None` when `body` is not a lookup command.
fn parse_command<'a>(prefix: &str, body: &'a str) -> Option<&'a str> {
    let rest = body.trim().strip_prefix(prefix)?;
    if rest.is_empty() {
        return Some("");
    }
    // Reject e.g. "!lookupfoo" — the prefix must be a whole token.
    rest.starts_with(char::is_whitespace).then(|| rest.trim())
}

/// Split a leading engine selector off the arguments, when the first token
/// names a configured engine.
fn split_selector<'a>(client: &LookupClient, args: &'a str) -> (Option<&'a str>, &'a str) {
    if let Some((first, rest)) = args.split_once(char::is_whitespace)
        && !rest.trim().is_empty()
        && client.find_exact(first).is_some()
    {
        return (Some(first), rest.trim());
    }
    (None, args)
}

// ── Behavior ────────────────────────────────────────────────────────────────

/// Answers `!lookup` commands with search results.
pub struct Lookup {
    prefix: String,
    client: Arc<LookupClient>,
}

impl Lookup {
    #[must_use]
    pub fn new() -> Self {
        Self::with_prefix(DEFAULT_PREFIX)
    }

    /// Use a different command prefix than `!lookup`.
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            client: Arc::new(LookupClient::new()),
        }
    }

    /// The shared client, for adding or removing engines after construction.
    #[must_use]
    pub fn client(&self) -> Arc<LookupClient> {
        Arc::clone(&self.client)
    }
}

impl Default for Lookup {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionBehavior for Lookup {
    type Ctx = MessageEvent;

    fn name(&self) -> &'static str {
        "lookup"
    }

    fn description(&self) -> &'static str {
        "Answers lookup commands with results from configurable search engines"
    }

    fn defaults(&self) -> Value {
        json!({
            "default_engine": "duckduckgo",
            "engines": {
                "duckduckgo": {
                    "aliases": ["duck", "ddg"],
                    "base_url": "https://duckduckgo.com/html/",
                    "query_param": "q",
                    "response": "text",
                },
                "wikipedia-search": {
                    "aliases": ["wikisearch"],
                    "base_url": "https://en.wikipedia.org/w/api.php",
                    "query_param": "srsearch",
                    "response": "json",
                    "params": {
                        "action": "query",
                        "list": "search",
                        "inprop": "url",
                        "format": "json",
                    },
                },
                "wikipedia": {
                    "aliases": ["wiki"],
                    "base_url": "https://en.wikipedia.org/w/api.php",
                    "query_param": "titles",
                    "response": "json",
                    "params": {
                        "action": "query",
                        "prop": "info",
                        "inprop": "url",
                        "format": "json",
                    },
                },
            },
        })
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["normalize-messages".to_string()]
    }

    fn rules(&self) -> Vec<Rule<MessageEvent>> {
        let prefix = self.prefix.clone();
        vec![Rule::reject_when(
            1,
            "only lookup commands",
            move |ctx: &EventContext<MessageEvent>| {
                parse_command(&prefix, &ctx.data.content.body).is_none()
            },
        )]
    }

    fn bind_listeners(&self, ext: &ExtensionContext<MessageEvent>) -> Result<(), ExtensionError> {
        self.client
            .configure(ext.options())
            .map_err(|e| ExtensionError::message(format!("invalid lookup configuration: {e}")))?;
        let _ = self.client.handle.set(ext.handle().clone());

        let mut bus = ext.handle().subscribe();
        let ext = ext.clone();
        let client = Arc::clone(&self.client);
        let prefix = self.prefix.clone();

        tokio::spawn(async move {
            loop {
                match bus.recv().await {
                    Ok(BusEvent::Message(message)) => {
                        let mut ctx = EventContext::new(message);
                        if !ext.check_rules(&mut ctx).result {
                            continue;
                        }
                        let message = ctx.into_data();
                        if let Err(error) = answer(&client, &prefix, &message).await {
                            ext.span().in_scope(|| warn!(%error, "lookup failed"));
                        }
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

async fn answer(
    client: &LookupClient,
    prefix: &str,
    message: &MessageEvent,
) -> anyhow::Result<()> {
    let Some(args) = parse_command(prefix, &message.content.body) else {
        return Ok(());
    };
    if args.is_empty() {
        message
            .reply
            .send_mentioning(&format!("usage: {prefix} [engine] query"), &message.sender)
            .await?;
        return Ok(());
    }

    let (selector, query) = split_selector(client, args);
    let (engine, outcome) = client.search(selector, query).await?;
    info!(engine, query, "answering lookup command");
    message
        .reply
        .send_mentioning(&outcome.summary(SUMMARY_LIMIT), &message.sender)
        .await?;
    Ok(())
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
        bramble_core::{
            Extension, Host, HostConfig, NormalizeMessages, testing::MemoryTransport,
        },
        bramble_common::deep_merge,
    };

    fn configured_client() -> LookupClient {
        let client = LookupClient::new();
        client.configure(&Lookup::new().defaults()).unwrap();
        client
    }

    #[test]
    fn defaults_parse_into_the_engine_set() {
        let client = configured_client();
        assert_eq!(
            client.engine_names(),
            vec!["duckduckgo", "wikipedia", "wikipedia-search"]
        );
    }

    #[test]
    fn engines_resolve_by_name_alias_and_default() {
        let client = configured_client();
        assert_eq!(client.resolve("wikipedia").unwrap().0, "wikipedia");
        assert_eq!(client.resolve("wiki").unwrap().0, "wikipedia");
        assert_eq!(client.resolve("ddg").unwrap().0, "duckduckgo");
        // Unknown names fall back to the default engine.
        assert_eq!(client.resolve("nonsense").unwrap().0, "duckduckgo");
    }

    #[test]
    fn instance_options_override_the_default_engine() {
        let lookup = Lookup::new();
        let merged = deep_merge(
            &lookup.defaults(),
            &json!({"default_engine": "wikipedia"}),
        );
        let client = LookupClient::new();
        client.configure(&merged).unwrap();
        assert_eq!(client.resolve("nonsense").unwrap().0, "wikipedia");
    }

    #[test]
    fn query_urls_carry_fixed_params_and_the_query_last() {
        let client = configured_client();
        let (_, engine) = client.resolve("wikisearch").unwrap();
        let url = build_query_url(&engine, "tea kettles").unwrap();
        assert_eq!(
            url.as_str(),
            "https://en.wikipedia.org/w/api.php?action=query&format=json&inprop=url&list=search&srsearch=tea+kettles"
        );
    }

    #[test]
    fn command_parsing_requires_a_whole_token_prefix() {
        assert_eq!(parse_command("!lookup", "!lookup tea"), Some("tea"));
        assert_eq!(parse_command("!lookup", "  !lookup   tea  "), Some("tea"));
        assert_eq!(parse_command("!lookup", "!lookup"), Some(""));
        assert_eq!(parse_command("!lookup", "!lookupfoo tea"), None);
        assert_eq!(parse_command("!lookup", "tea"), None);
    }

    #[test]
    fn selector_splitting_only_matches_known_engines() {
        let client = configured_client();
        assert_eq!(
            split_selector(&client, "wiki tea"),
            (Some("wiki"), "tea")
        );
        assert_eq!(split_selector(&client, "tea pots"), (None, "tea pots"));
        // A bare engine name is a query, not a selector.
        assert_eq!(split_selector(&client, "wiki"), (None, "wiki"));
    }

    #[test]
    fn non_command_messages_are_rejected_by_the_rule_set() {
        let lookup = Lookup::new();
        let rules = lookup.rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name(), "only lookup commands");
    }

    #[test]
    fn summaries_truncate_long_output() {
        let outcome = SearchOutcome::Text("word ".repeat(200));
        let summary = outcome.summary(40);
        assert_eq!(summary.chars().count(), 41);
        assert!(summary.ends_with('…'));
    }

    #[tokio::test]
    async fn searches_a_json_engine() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api")
            .match_query(mockito::Matcher::UrlEncoded("q".into(), "tea".into()))
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok": true}"#)
            .create_async()
            .await;

        let client = LookupClient::new();
        client.add_engine("mock", SearchEngine {
            aliases: Vec::new(),
            base_url: format!("{}/api", server.url()),
            query_param: "q".to_string(),
            params: BTreeMap::new(),
            response: ResponseKind::Json,
        });

        let (name, outcome) = client.search(Some("mock"), "tea").await.unwrap();
        assert_eq!(name, "mock");
        match outcome {
            SearchOutcome::Json(value) => assert_eq!(value["ok"], true),
            SearchOutcome::Text(_) => panic!("expected a json outcome"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unknown_engine_without_default_is_an_error() {
        let client = LookupClient::new();
        let result = client.search(Some("nope"), "tea").await;
        assert!(matches!(result, Err(Error::UnknownEngine(name)) if name == "nope"));
    }

    #[tokio::test]
    async fn empty_command_gets_a_usage_reply() {
        let transport = Arc::new(MemoryTransport::new());
        let host = Host::new(HostConfig::new("@bot:example.org"), transport.clone());

        let normalizer = Extension::build(&host.handle(), NormalizeMessages, json!({})).unwrap();
        host.register([normalizer]).unwrap();
        let lookup = Extension::build(&host.handle(), Lookup::new(), json!({})).unwrap();
        host.register([lookup]).unwrap();

        transport.inject_message("!room:example.org", "@alice:example.org", "!lookup");

        let replied = timeout(Duration::from_secs(1), async {
            loop {
                let sent = transport.sent_texts();
                if let Some(first) = sent.first() {
                    break first.clone();
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(replied.room.as_str(), "!room:example.org");
        assert!(replied.body.contains("usage: !lookup"));
    }

    #[tokio::test]
    async fn plain_chatter_is_ignored() {
        let transport = Arc::new(MemoryTransport::new());
        let host = Host::new(HostConfig::new("@bot:example.org"), transport.clone());

        let normalizer = Extension::build(&host.handle(), NormalizeMessages, json!({})).unwrap();
        host.register([normalizer]).unwrap();
        let lookup = Extension::build(&host.handle(), Lookup::new(), json!({})).unwrap();
        host.register([lookup]).unwrap();

        transport.inject_message("!room:example.org", "@alice:example.org", "hello there");
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(transport.sent_texts().is_empty());
    }

    #[tokio::test]
    async fn engine_changes_publish_derived_events() {
        let transport = Arc::new(MemoryTransport::new());
        let host = Host::new(HostConfig::new("@bot:example.org"), transport.clone());

        let normalizer = Extension::build(&host.handle(), NormalizeMessages, json!({})).unwrap();
        host.register([normalizer]).unwrap();
        let behavior = Lookup::new();
        let client = behavior.client();
        let lookup = Extension::build(&host.handle(), behavior, json!({})).unwrap();
        host.register([lookup]).unwrap();

        let mut bus = host.subscribe();
        client.add_engine("custom", SearchEngine {
            aliases: Vec::new(),
            base_url: "https://search.example.org/".to_string(),
            query_param: "q".to_string(),
            params: BTreeMap::new(),
            response: ResponseKind::Text,
        });
        assert!(client.remove_engine("custom"));
        assert!(!client.remove_engine("custom"));

        let mut seen = Vec::new();
        while seen.len() < 2 {
            match bus.try_recv().unwrap() {
                BusEvent::Derived { name, payload, .. } => {
                    assert_eq!(payload["engine"], "custom");
                    seen.push(name);
                },
                _ => continue,
            }
        }
        assert_eq!(seen, vec![ENGINE_ADDED_EVENT, ENGINE_REMOVED_EVENT]);
    }
}
