//! Federated, debounced search across all providers.
//!
//! A [`SearchFederator`] is spawned into a [`FederatorHandle`]. The handle
//! accepts raw query text and entity filters and exposes a continuously
//! updated [`SearchView`] through a `watch` channel.
//!
//! Behind the handle a single task owns all state and handles one message at
//! a time:
//!
//! 1. raw query changes are coalesced until the text has been stable for the
//!    debounce window, which yields the *effective* query
//! 2. each effective query gets a new [`Generation`] before any request goes
//!    out
//! 3. one request per available provider and requested entity kind is issued
//!    concurrently
//! 4. every reply carries the generation it was issued under; replies from an
//!    older generation are dropped on arrival
//! 5. the unified view is rebuilt and republished after every accepted reply
//!
//! In-flight requests are never aborted. A superseded request runs to
//! completion and its result is ignored.
//!
//! # Examples
//!
//! ```rust,no_run
//! use ensemble::prelude::*;
//!
//! # async fn example() -> ensemble::Result<()> {
//! let mut providers = Providers::new();
//! providers.add(LocalCatalog::new("local"));
//!
//! let search = SearchFederator::new(providers).spawn();
//! search.set_query("abbey road")?;
//!
//! let view = search.wait_for(|v| v.query == "abbey road" && !v.is_loading()).await?;
//! for track in &view.results.tracks {
//!     println!("{} - {} [{}]", track.item.artist, track.item.title, track.id);
//! }
//! # Ok(())
//! # }
//! ```

mod state;

pub use state::{Generation, SearchView};

use derive_builder::Builder;
use futures::{
    FutureExt, StreamExt,
    future::BoxFuture,
    stream::FuturesUnordered,
};
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    error::{Error, Result},
    linkage::{ForeignIdLinkage, IdentityResolver},
    provider::{Provider, Providers, search_kind},
    types::{EntityFilter, EntityKind},
};
use state::{Reply, SearchState};

/// Federator tuning.
///
/// ```rust
/// use ensemble::search::FederatorConfigBuilder;
/// use std::time::Duration;
///
/// let config = FederatorConfigBuilder::default()
///     .debounce(Duration::from_millis(150))
///     .provider_priority(vec!["local".to_string(), "tidal".to_string()])
///     .build()
///     .unwrap();
///
/// assert_eq!(config.min_query_chars, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into), default)]
#[serde(default)]
pub struct FederatorConfig {
    /// Quiescence window before a raw query becomes effective
    #[serde(rename = "debounce_ms", with = "duration_ms")]
    pub debounce: Duration,

    /// Queries shorter than this (after trimming) issue no requests
    pub min_query_chars: usize,

    /// Provider ids, highest priority first; unlisted providers follow in
    /// registration order
    pub provider_priority: Vec<String>,
}

impl Default for FederatorConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(180),
            min_query_chars: 2,
            provider_priority: Vec::new(),
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Builder for the search actor.
pub struct SearchFederator {
    providers: Providers,
    config: FederatorConfig,
    resolver: Arc<dyn IdentityResolver>,
}

impl SearchFederator {
    /// Federates `providers` with the default configuration and
    /// [`ForeignIdLinkage`] de-duplication.
    pub fn new(providers: Providers) -> Self {
        Self {
            providers,
            config: FederatorConfig::default(),
            resolver: Arc::new(ForeignIdLinkage),
        }
    }

    pub fn with_config(mut self, config: FederatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the cross-provider identity strategy.
    pub fn with_resolver(mut self, resolver: impl IdentityResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Starts the federator task on the current tokio runtime.
    ///
    /// The task stops once every handle has been dropped.
    pub fn spawn(self) -> FederatorHandle {
        let providers = self.providers.prioritized(&self.config.provider_priority);
        let order = providers.iter().map(|p| p.id().to_string()).collect();
        let state = SearchState::new(order);

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(state.view(self.resolver.as_ref()));

        let actor = Actor {
            providers,
            config: self.config,
            resolver: self.resolver,
            state,
            filter: EntityFilter::all(),
            effective: None,
            view_tx,
            in_flight: FuturesUnordered::new(),
        };
        tokio::spawn(actor.run(command_rx));

        FederatorHandle {
            commands: command_tx,
            view: view_rx,
        }
    }
}

#[derive(Debug)]
enum Command {
    SetQuery(String),
    SetFilter(EntityFilter),
}

/// Cloneable handle to a running federator.
#[derive(Clone)]
pub struct FederatorHandle {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<SearchView>,
}

impl FederatorHandle {
    /// Submits raw query text. It becomes effective once it has been stable
    /// for the debounce window.
    pub fn set_query(&self, text: impl Into<String>) -> Result<()> {
        self.send(Command::SetQuery(text.into()))
    }

    /// Changes which entity kinds are searched.
    ///
    /// Takes effect immediately: when an effective query exists it is
    /// re-issued under a new generation.
    pub fn set_entity_filter(&self, filter: EntityFilter) -> Result<()> {
        self.send(Command::SetFilter(filter))
    }

    /// The latest published view.
    pub fn view(&self) -> SearchView {
        self.view.borrow().clone()
    }

    /// A receiver notified on every republished view.
    pub fn subscribe(&self) -> watch::Receiver<SearchView> {
        self.view.clone()
    }

    /// Waits until a published view satisfies `predicate`.
    pub async fn wait_for(&self, predicate: impl FnMut(&SearchView) -> bool) -> Result<SearchView> {
        let mut rx = self.view.clone();
        let view = rx
            .wait_for(predicate)
            .await
            .map_err(|_| Error::Other("search federator stopped".to_string()))?;
        Ok(view.clone())
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::Other("search federator stopped".to_string()))
    }
}

struct Actor {
    providers: Vec<Arc<dyn Provider>>,
    config: FederatorConfig,
    resolver: Arc<dyn IdentityResolver>,
    state: SearchState,
    filter: EntityFilter,
    effective: Option<String>,
    view_tx: watch::Sender<SearchView>,
    in_flight: FuturesUnordered<BoxFuture<'static, Reply>>,
}

impl Actor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let mut pending: Option<String> = None;
        let debounce = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(debounce);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    None => break,
                    Some(Command::SetQuery(text)) => {
                        pending = Some(text);
                        debounce.as_mut().reset(Instant::now() + self.config.debounce);
                    }
                    Some(Command::SetFilter(filter)) => self.set_filter(filter),
                },
                Some(reply) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    self.on_reply(reply);
                }
                () = &mut debounce, if pending.is_some() => {
                    if let Some(text) = pending.take() {
                        self.settle(text);
                    }
                }
            }
        }

        debug!("search federator stopped");
    }

    fn settle(&mut self, text: String) {
        let query = text.trim().to_string();
        if self.effective.as_deref() == Some(query.as_str()) {
            return;
        }
        self.effective = Some(query);
        self.issue();
    }

    fn set_filter(&mut self, filter: EntityFilter) {
        if filter == self.filter {
            return;
        }
        self.filter = filter;
        if self.effective.is_some() {
            self.issue();
        }
    }

    fn issue(&mut self) {
        let query = self.effective.clone().unwrap_or_default();
        let searchable = query.chars().count() >= self.config.min_query_chars;

        let kinds = self.filter.kinds();
        let requests: Vec<(Arc<dyn Provider>, EntityKind)> = if searchable {
            self.providers
                .iter()
                .filter(|p| p.is_available())
                .flat_map(|p| kinds.iter().map(move |kind| (Arc::clone(p), *kind)))
                .collect()
        } else {
            Vec::new()
        };

        let keys: Vec<(String, EntityKind)> = requests
            .iter()
            .map(|(p, kind)| (p.id().to_string(), *kind))
            .collect();
        let generation = self.state.begin(&query, self.filter, &keys);
        info!(generation = generation.0, query = %query, requests = keys.len(), "issuing search");

        for (provider, kind) in requests {
            let query = query.clone();
            self.in_flight.push(
                async move {
                    let provider_id = provider.id().to_string();
                    let outcome = AssertUnwindSafe(search_kind(provider.as_ref(), kind, &query))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| Err(Error::provider(&provider_id, "search panicked")));
                    Reply {
                        generation,
                        provider_id,
                        kind,
                        outcome,
                    }
                }
                .boxed(),
            );
        }

        self.publish();
    }

    fn on_reply(&mut self, reply: Reply) {
        if reply.generation != self.state.generation() {
            debug!(
                provider = %reply.provider_id,
                generation = reply.generation.0,
                current = self.state.generation().0,
                "dropping stale reply"
            );
            return;
        }
        if let Err(e) = &reply.outcome {
            let error = match e {
                Error::ProviderUnavailable { .. } => e.to_string(),
                other => Error::provider(&reply.provider_id, other.to_string()).to_string(),
            };
            warn!(kind = ?reply.kind, %error, "provider search failed");
        }
        if self.state.apply(reply) {
            self.publish();
        }
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.state.view(self.resolver.as_ref()));
    }
}
