//! Provider trait and collection for managing content providers.
//!
//! This module defines the [`Provider`] trait that every content backend
//! implements (a local catalog, or a remote streaming catalog), and the
//! [`Providers`] collection that holds them in registration order.
//!
//! The reactive, debounced search lives in [`search`](crate::search); this
//! module also offers one-shot fan-out helpers for batch callers.
//!
//! # Examples
//!
//! ```rust
//! use ensemble::prelude::*;
//! use ensemble::error::Result;
//!
//! # async fn example() -> Result<()> {
//! let mut providers = Providers::new();
//! // providers.add(LocalCatalog::new("local"));
//!
//! let grouped = providers.search_all_grouped("abbey road", EntityKind::Track).await;
//! for (provider_id, result) in grouped {
//!     match result {
//!         Ok(batch) => println!("{}: {} results", provider_id, batch.len()),
//!         Err(e) => println!("{}: {}", provider_id, e),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use futures::future;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    error::{Error, Result},
    linkage::{IdentityResolver, unify},
    types::{AlbumMatch, ArtistMatch, EntityFilter, EntityKind, TrackMatch, UnifiedResultSet},
};

/// Trait that all content providers must implement.
///
/// Each provider exposes the same three searches. Any of them may fail
/// independently; callers treat a failure as an empty result for that
/// provider.
///
/// # Implementation Guidelines
///
/// - Return matches in the provider's own relevance order; it is preserved
/// - Fill in `links` only from explicit records (never by fuzzy matching)
/// - Keep the original payload in `raw` when later operations need it
///
/// # Examples
///
/// ```rust
/// use ensemble::prelude::*;
/// use ensemble::error::Result;
/// use async_trait::async_trait;
///
/// struct Silent;
///
/// #[async_trait]
/// impl Provider for Silent {
///     fn id(&self) -> &str { "silent" }
///     fn name(&self) -> &str { "Silent" }
///
///     async fn search_tracks(&self, _query: &str) -> Result<Vec<TrackMatch>> { Ok(vec![]) }
///     async fn search_albums(&self, _query: &str) -> Result<Vec<AlbumMatch>> { Ok(vec![]) }
///     async fn search_artists(&self, _query: &str) -> Result<Vec<ArtistMatch>> { Ok(vec![]) }
/// }
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// Returns the unique identifier for this provider.
    ///
    /// This is the prefix of every qualified id the provider produces, so it
    /// should be lowercase and must not contain `:`.
    fn id(&self) -> &str;

    /// Returns the human-readable name of this provider.
    fn name(&self) -> &str;

    /// Whether the provider is configured and reachable.
    ///
    /// Unavailable providers are skipped entirely by the federator: no
    /// request is issued and no loading flag is raised.
    fn is_available(&self) -> bool {
        true
    }

    /// Searches tracks matching `query`.
    async fn search_tracks(&self, query: &str) -> Result<Vec<TrackMatch>>;

    /// Searches albums matching `query`.
    async fn search_albums(&self, query: &str) -> Result<Vec<AlbumMatch>>;

    /// Searches artists matching `query`.
    async fn search_artists(&self, query: &str) -> Result<Vec<ArtistMatch>>;
}

/// The matches one provider returned for one entity kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Batch {
    Tracks(Vec<TrackMatch>),
    Albums(Vec<AlbumMatch>),
    Artists(Vec<ArtistMatch>),
}

impl Batch {
    /// An empty batch of the given kind.
    pub fn empty(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Track => Batch::Tracks(Vec::new()),
            EntityKind::Album => Batch::Albums(Vec::new()),
            EntityKind::Artist => Batch::Artists(Vec::new()),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Batch::Tracks(_) => EntityKind::Track,
            Batch::Albums(_) => EntityKind::Album,
            Batch::Artists(_) => EntityKind::Artist,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Batch::Tracks(v) => v.len(),
            Batch::Albums(v) => v.len(),
            Batch::Artists(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs the search matching `kind` on `provider`.
pub async fn search_kind(provider: &dyn Provider, kind: EntityKind, query: &str) -> Result<Batch> {
    Ok(match kind {
        EntityKind::Track => Batch::Tracks(provider.search_tracks(query).await?),
        EntityKind::Album => Batch::Albums(provider.search_albums(query).await?),
        EntityKind::Artist => Batch::Artists(provider.search_artists(query).await?),
    })
}

/// A collection of providers, indexed by id.
///
/// Providers are held behind `Arc` so in-flight searches can outlive the
/// call that issued them.
///
/// # Examples
///
/// ```rust
/// use ensemble::prelude::*;
///
/// let providers = Providers::new();
/// assert!(providers.is_empty());
/// println!("Available providers: {:?}", providers.list_ids());
/// ```
#[derive(Clone)]
pub struct Providers {
    providers: Vec<Arc<dyn Provider>>,
    by_id: HashMap<String, usize>,
}

impl Providers {
    /// Creates a new empty provider collection.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    /// Adds a provider to the collection.
    ///
    /// A provider with an id that is already registered replaces the earlier
    /// one in place.
    pub fn add(&mut self, provider: impl Provider + 'static) -> &mut Self {
        self.add_shared(Arc::new(provider))
    }

    /// Adds a provider that is shared with other owners.
    pub fn add_shared(&mut self, provider: Arc<dyn Provider>) -> &mut Self {
        let id = provider.id().to_string();
        match self.by_id.get(&id) {
            Some(&index) => self.providers[index] = provider,
            None => {
                self.by_id.insert(id, self.providers.len());
                self.providers.push(provider);
            }
        }
        self
    }

    /// Retrieves a provider by its ID.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Provider>> {
        self.by_id
            .get(id)
            .and_then(|&index| self.providers.get(index))
            .cloned()
    }

    /// Returns the IDs of all registered providers in registration order.
    pub fn list_ids(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.id().to_string()).collect()
    }

    /// Providers ordered by `priority`.
    ///
    /// Providers named in `priority` come first, in that order; the rest
    /// follow in registration order. Unknown ids in `priority` are ignored.
    pub fn prioritized(&self, priority: &[String]) -> Vec<Arc<dyn Provider>> {
        let mut ordered: Vec<Arc<dyn Provider>> = Vec::with_capacity(self.providers.len());
        let mut taken = vec![false; self.providers.len()];

        for id in priority {
            if let Some(&index) = self.by_id.get(id.as_str()) {
                if !taken[index] {
                    taken[index] = true;
                    ordered.push(Arc::clone(&self.providers[index]));
                }
            }
        }
        for (index, provider) in self.providers.iter().enumerate() {
            if !taken[index] {
                ordered.push(Arc::clone(provider));
            }
        }
        ordered
    }

    /// Searches every available provider for one entity kind, concurrently.
    ///
    /// Each provider's outcome is returned separately, in registration order.
    pub async fn search_all_grouped(
        &self,
        query: &str,
        kind: EntityKind,
    ) -> Vec<(String, Result<Batch>)> {
        let futures = self
            .providers
            .iter()
            .filter(|p| p.is_available())
            .map(|provider| async move {
                let provider_id = provider.id().to_string();
                let result = search_kind(provider.as_ref(), kind, query).await;
                (provider_id, result)
            });

        future::join_all(futures).await
    }

    /// Searches every available provider for every kind in `filter` and
    /// merges the results, de-duplicating with `resolver`.
    ///
    /// # Errors
    ///
    /// Returns an error only if every request failed. Individual provider
    /// failures are ignored as long as one request succeeds.
    pub async fn search_all_flat(
        &self,
        query: &str,
        filter: EntityFilter,
        resolver: &dyn IdentityResolver,
    ) -> Result<UnifiedResultSet> {
        let mut tracks = Vec::new();
        let mut albums = Vec::new();
        let mut artists = Vec::new();
        let mut errors = Vec::new();
        let mut succeeded = 0usize;

        let grouped = future::join_all(
            filter
                .kinds()
                .into_iter()
                .map(|kind| self.search_all_grouped(query, kind)),
        )
        .await;

        for (provider_id, result) in grouped.into_iter().flatten() {
            match result {
                Ok(Batch::Tracks(v)) => tracks.push((provider_id, v)),
                Ok(Batch::Albums(v)) => albums.push((provider_id, v)),
                Ok(Batch::Artists(v)) => artists.push((provider_id, v)),
                Err(e) => {
                    errors.push(format!("{}: {}", provider_id, e));
                    continue;
                }
            }
            succeeded += 1;
        }

        if succeeded == 0 && !errors.is_empty() {
            return Err(Error::Other(format!(
                "All providers failed: {}",
                errors.join(", ")
            )));
        }

        Ok(UnifiedResultSet {
            tracks: unify(tracks.iter().map(|(p, v)| (p.as_str(), v.as_slice())), resolver),
            albums: unify(albums.iter().map(|(p, v)| (p.as_str(), v.as_slice())), resolver),
            artists: unify(artists.iter().map(|(p, v)| (p.as_str(), v.as_slice())), resolver),
        })
    }

    /// Returns the number of providers in the collection.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns `true` if the collection contains no providers.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for Providers {
    fn default() -> Self {
        Self::new()
    }
}
