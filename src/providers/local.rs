//! In-memory catalog provider.
//!
//! Holds tracks, albums and artists the application already knows about
//! (typically the user's own library) and answers searches with a
//! case-insensitive substring match. Results keep insertion order.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{
    error::Result,
    provider::Provider,
    types::{AlbumMatch, ArtistMatch, TrackMatch},
};

/// A provider backed by in-memory lists.
///
/// ```rust
/// use ensemble::prelude::*;
///
/// # async fn example() -> ensemble::Result<()> {
/// let local = LocalCatalog::new("local");
/// local.add_track(TrackMatch::new("t1", "Come Together", "The Beatles").with_album("Abbey Road"));
///
/// let hits = local.search_tracks("abbey").await?;
/// assert_eq!(hits.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct LocalCatalog {
    id: String,
    name: String,
    available: AtomicBool,
    tracks: RwLock<Vec<TrackMatch>>,
    albums: RwLock<Vec<AlbumMatch>>,
    artists: RwLock<Vec<ArtistMatch>>,
}

impl LocalCatalog {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into().to_lowercase();
        Self {
            name: id.clone(),
            id,
            available: AtomicBool::new(true),
            tracks: RwLock::new(Vec::new()),
            albums: RwLock::new(Vec::new()),
            artists: RwLock::new(Vec::new()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn add_track(&self, track: TrackMatch) {
        self.tracks.write().push(track);
    }

    pub fn add_album(&self, album: AlbumMatch) {
        self.albums.write().push(album);
    }

    pub fn add_artist(&self, artist: ArtistMatch) {
        self.artists.write().push(artist);
    }

    /// Removes every entry with `external_id`, whatever its kind.
    pub fn remove(&self, external_id: &str) -> bool {
        let mut removed = false;
        let mut keep = |id: &str| {
            let matches = id == external_id;
            removed |= matches;
            !matches
        };
        self.tracks.write().retain(|t| keep(&t.external_id));
        self.albums.write().retain(|a| keep(&a.external_id));
        self.artists.write().retain(|a| keep(&a.external_id));
        removed
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.tracks.read().len() + self.albums.read().len() + self.artists.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn matches<'a>(needle: &str, mut fields: impl Iterator<Item = &'a str>) -> bool {
    fields.any(|field| field.to_lowercase().contains(needle))
}

#[async_trait]
impl Provider for LocalCatalog {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    async fn search_tracks(&self, query: &str) -> Result<Vec<TrackMatch>> {
        let needle = query.trim().to_lowercase();
        Ok(self
            .tracks
            .read()
            .iter()
            .filter(|t| {
                let fields = [Some(t.title.as_str()), Some(t.artist.as_str()), t.album.as_deref()];
                matches(&needle, fields.into_iter().flatten())
            })
            .cloned()
            .collect())
    }

    async fn search_albums(&self, query: &str) -> Result<Vec<AlbumMatch>> {
        let needle = query.trim().to_lowercase();
        Ok(self
            .albums
            .read()
            .iter()
            .filter(|a| {
                let fields = [Some(a.title.as_str()), a.artist.as_deref()];
                matches(&needle, fields.into_iter().flatten())
            })
            .cloned()
            .collect())
    }

    async fn search_artists(&self, query: &str) -> Result<Vec<ArtistMatch>> {
        let needle = query.trim().to_lowercase();
        Ok(self
            .artists
            .read()
            .iter()
            .filter(|a| matches(&needle, std::iter::once(a.name.as_str())))
            .cloned()
            .collect())
    }
}
