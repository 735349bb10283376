//! Per-generation bookkeeping for the federator.
//!
//! [`SearchState`] holds exactly one generation's worth of provider replies.
//! Starting a generation discards everything from the previous one; replies
//! tagged with any other generation are rejected. The unified view is rebuilt
//! from scratch on every accepted reply.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::linkage::{IdentityResolver, unify};
use crate::provider::Batch;
use crate::types::{
    AlbumMatch, ArtistMatch, EntityFilter, EntityKind, ProviderMatch, TrackMatch, UnifiedResultSet,
};

/// Token identifying one effective query. Strictly increasing.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

/// One provider's answer for one entity kind, tagged with the generation it
/// was requested under.
#[derive(Debug)]
pub(crate) struct Reply {
    pub generation: Generation,
    pub provider_id: String,
    pub kind: EntityKind,
    pub outcome: Result<Batch>,
}

/// Snapshot published to subscribers after every change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchView {
    pub generation: Generation,
    /// The effective (debounced, trimmed) query this view belongs to
    pub query: String,
    pub filter: EntityFilter,
    pub results: UnifiedResultSet,
    /// Whether each provider still has a request outstanding for this generation
    pub loading: BTreeMap<String, bool>,
}

impl SearchView {
    /// True while any provider is still loading.
    pub fn is_loading(&self) -> bool {
        self.loading.values().any(|loading| *loading)
    }

    pub fn is_provider_loading(&self, provider_id: &str) -> bool {
        self.loading.get(provider_id).copied().unwrap_or(false)
    }
}

#[derive(Default)]
pub(crate) struct SearchState {
    generation: Generation,
    query: String,
    filter: EntityFilter,
    /// every known provider id, highest priority first
    order: Vec<String>,
    pending: HashSet<(String, EntityKind)>,
    tracks: HashMap<String, Vec<TrackMatch>>,
    albums: HashMap<String, Vec<AlbumMatch>>,
    artists: HashMap<String, Vec<ArtistMatch>>,
}

impl SearchState {
    pub fn new(order: Vec<String>) -> Self {
        Self {
            order,
            ..Default::default()
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Starts a new generation expecting one reply per entry of `requests`.
    pub fn begin(
        &mut self,
        query: &str,
        filter: EntityFilter,
        requests: &[(String, EntityKind)],
    ) -> Generation {
        self.generation = self.generation.next();
        self.query = query.to_string();
        self.filter = filter;
        self.pending = requests.iter().cloned().collect();
        self.tracks.clear();
        self.albums.clear();
        self.artists.clear();
        self.generation
    }

    /// Records a reply. Returns `false` when it was stale or unexpected and
    /// nothing changed.
    ///
    /// A failed reply still clears the provider's loading flag and
    /// contributes an empty list.
    pub fn apply(&mut self, reply: Reply) -> bool {
        if reply.generation != self.generation {
            return false;
        }
        if !self
            .pending
            .remove(&(reply.provider_id.clone(), reply.kind))
        {
            return false;
        }

        let batch = reply.outcome.unwrap_or_else(|_| Batch::empty(reply.kind));
        match batch {
            Batch::Tracks(v) => {
                self.tracks.insert(reply.provider_id, v);
            }
            Batch::Albums(v) => {
                self.albums.insert(reply.provider_id, v);
            }
            Batch::Artists(v) => {
                self.artists.insert(reply.provider_id, v);
            }
        }
        true
    }

    pub fn is_provider_loading(&self, provider_id: &str) -> bool {
        self.pending.iter().any(|(id, _)| id == provider_id)
    }

    pub fn view(&self, resolver: &dyn IdentityResolver) -> SearchView {
        SearchView {
            generation: self.generation,
            query: self.query.clone(),
            filter: self.filter,
            results: UnifiedResultSet {
                tracks: unify(ordered(&self.order, &self.tracks), resolver),
                albums: unify(ordered(&self.order, &self.albums), resolver),
                artists: unify(ordered(&self.order, &self.artists), resolver),
            },
            loading: self
                .order
                .iter()
                .map(|id| (id.clone(), self.is_provider_loading(id)))
                .collect(),
        }
    }
}

fn ordered<'a, T: ProviderMatch>(
    order: &'a [String],
    results: &'a HashMap<String, Vec<T>>,
) -> impl Iterator<Item = (&'a str, &'a [T])> {
    order
        .iter()
        .filter_map(move |id| results.get(id).map(|v| (id.as_str(), v.as_slice())))
}
