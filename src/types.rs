//! Core data types for provider matches, unified results and track identity.
//!
//! This module defines the fundamental data structures used throughout Ensemble:
//!
//! - [`TrackMatch`], [`AlbumMatch`], [`ArtistMatch`] - Normalized provider search hits
//! - [`UnifiedMatch`] - A match qualified with its provider id, as surfaced to consumers
//! - [`UnifiedResultSet`] - Tracks, albums and artists merged across providers
//! - [`EntityKind`] / [`EntityFilter`] - Which entity types a search should request
//! - [`TrackDescriptor`] - Anything a download can be requested for
//!
//! # Examples
//!
//! ```rust
//! use ensemble::types::*;
//! use ensemble::identity::QualifiedId;
//!
//! let track = TrackMatch::new("8842", "Come Together", "The Beatles")
//!     .with_album("Abbey Road")
//!     .with_link(QualifiedId::new("tidal", "5551234"));
//!
//! assert_eq!(track.links.len(), 1);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identity::QualifiedId;

/// The three entity types every provider can be searched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Track,
    Album,
    Artist,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Track, EntityKind::Album, EntityKind::Artist];
}

/// Set of entity types requested by a search.
///
/// ```rust
/// use ensemble::types::{EntityFilter, EntityKind};
///
/// let filter = EntityFilter::only(EntityKind::Album);
/// assert!(filter.contains(EntityKind::Album));
/// assert!(!filter.contains(EntityKind::Track));
/// assert_eq!(EntityFilter::default(), EntityFilter::all());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityFilter {
    pub tracks: bool,
    pub albums: bool,
    pub artists: bool,
}

impl EntityFilter {
    pub fn all() -> Self {
        Self {
            tracks: true,
            albums: true,
            artists: true,
        }
    }

    pub fn only(kind: EntityKind) -> Self {
        Self::from_kinds([kind])
    }

    pub fn from_kinds(kinds: impl IntoIterator<Item = EntityKind>) -> Self {
        let mut filter = Self {
            tracks: false,
            albums: false,
            artists: false,
        };
        for kind in kinds {
            match kind {
                EntityKind::Track => filter.tracks = true,
                EntityKind::Album => filter.albums = true,
                EntityKind::Artist => filter.artists = true,
            }
        }
        filter
    }

    pub fn contains(&self, kind: EntityKind) -> bool {
        match kind {
            EntityKind::Track => self.tracks,
            EntityKind::Album => self.albums,
            EntityKind::Artist => self.artists,
        }
    }

    /// Requested kinds in fixed track, album, artist order.
    pub fn kinds(&self) -> Vec<EntityKind> {
        EntityKind::ALL
            .into_iter()
            .filter(|kind| self.contains(*kind))
            .collect()
    }
}

impl Default for EntityFilter {
    fn default() -> Self {
        Self::all()
    }
}

/// Common accessors over the three match shapes.
///
/// Used by the merge step, which qualifies and de-duplicates matches without
/// caring which entity type they are.
pub trait ProviderMatch: Clone + Send + Sync + 'static {
    /// The provider's own identifier for this entity.
    fn external_id(&self) -> &str;

    /// Explicit foreign identities recorded for this entity, e.g. the remote
    /// track a local catalog entry was imported from.
    fn links(&self) -> &[QualifiedId];

    /// Original provider payload.
    fn raw(&self) -> &Value;
}

/// A track returned by a provider search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackMatch {
    pub external_id: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_secs: Option<u32>,
    /// Foreign identities this track is known to be equivalent to
    #[serde(default)]
    pub links: Vec<QualifiedId>,
    /// Original provider payload, kept for playback and other provider-specific needs
    #[serde(default)]
    pub raw: Value,
}

impl TrackMatch {
    pub fn new(
        external_id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            title: title.into(),
            artist: artist.into(),
            album: None,
            duration_secs: None,
            links: Vec::new(),
            raw: Value::Null,
        }
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_duration(mut self, secs: u32) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    pub fn with_link(mut self, link: QualifiedId) -> Self {
        self.links.push(link);
        self
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = raw;
        self
    }
}

/// An album returned by a provider search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumMatch {
    pub external_id: String,
    pub title: String,
    pub artist: Option<String>,
    pub year: Option<u16>,
    #[serde(default)]
    pub links: Vec<QualifiedId>,
    #[serde(default)]
    pub raw: Value,
}

impl AlbumMatch {
    pub fn new(external_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            title: title.into(),
            artist: None,
            year: None,
            links: Vec::new(),
            raw: Value::Null,
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_year(mut self, year: u16) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_link(mut self, link: QualifiedId) -> Self {
        self.links.push(link);
        self
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = raw;
        self
    }
}

/// An artist returned by a provider search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistMatch {
    pub external_id: String,
    pub name: String,
    #[serde(default)]
    pub links: Vec<QualifiedId>,
    #[serde(default)]
    pub raw: Value,
}

impl ArtistMatch {
    pub fn new(external_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            name: name.into(),
            links: Vec::new(),
            raw: Value::Null,
        }
    }

    pub fn with_link(mut self, link: QualifiedId) -> Self {
        self.links.push(link);
        self
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = raw;
        self
    }
}

macro_rules! impl_provider_match {
    ($($ty:ty),*) => {
        $(
            impl ProviderMatch for $ty {
                fn external_id(&self) -> &str {
                    &self.external_id
                }

                fn links(&self) -> &[QualifiedId] {
                    &self.links
                }

                fn raw(&self) -> &Value {
                    &self.raw
                }
            }
        )*
    };
}

impl_provider_match!(TrackMatch, AlbumMatch, ArtistMatch);

/// A provider match qualified with its owning provider.
///
/// `aliases` lists the other qualified ids this entry stands for after
/// cross-provider de-duplication. A local catalog track imported from a
/// remote service carries the remote id here, so download and like actions
/// can keep using the local entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedMatch<T> {
    pub id: QualifiedId,
    pub item: T,
    #[serde(default)]
    pub aliases: Vec<QualifiedId>,
}

impl<T: ProviderMatch> UnifiedMatch<T> {
    pub fn provider_id(&self) -> &str {
        self.id.provider()
    }

    pub fn external_id(&self) -> &str {
        self.id.external_id()
    }

    pub fn raw(&self) -> &Value {
        self.item.raw()
    }

    /// Whether this entry answers to `id`, either directly or through an alias.
    pub fn is_known_as(&self, id: &QualifiedId) -> bool {
        &self.id == id || self.aliases.contains(id)
    }
}

/// Tracks, albums and artists merged across all providers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedResultSet {
    pub tracks: Vec<UnifiedMatch<TrackMatch>>,
    pub albums: Vec<UnifiedMatch<AlbumMatch>>,
    pub artists: Vec<UnifiedMatch<ArtistMatch>>,
}

impl UnifiedResultSet {
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty() && self.albums.is_empty() && self.artists.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tracks.len() + self.albums.len() + self.artists.len()
    }
}

/// A track-like value a download can be requested for.
///
/// Callers fill in whatever identity they have; see
/// [`TrackDescriptor::task_key`] for how the key is derived.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub provider_id: Option<String>,
    pub external_id: Option<String>,
    /// Provider-prefixed path such as `"tidal:12345"`
    pub path: Option<String>,
    /// Bare identifier from older catalogs
    pub id: Option<String>,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
}

impl TrackDescriptor {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_provider(
        mut self,
        provider_id: impl Into<String>,
        external_id: impl Into<String>,
    ) -> Self {
        self.provider_id = Some(provider_id.into());
        self.external_id = Some(external_id.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }
}

impl From<&UnifiedMatch<TrackMatch>> for TrackDescriptor {
    /// The local entity wins: a de-duplicated entry downloads under its own
    /// qualified id, never under one of its aliases.
    fn from(m: &UnifiedMatch<TrackMatch>) -> Self {
        Self {
            provider_id: Some(m.provider_id().to_string()),
            external_id: Some(m.external_id().to_string()),
            path: None,
            id: None,
            title: m.item.title.clone(),
            artist: Some(m.item.artist.clone()),
            album: m.item.album.clone(),
        }
    }
}
