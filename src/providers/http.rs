//! Configurable JSON search API provider.
//!
//! Many streaming catalogs expose a plain `GET ...?q=<query>` endpoint that
//! returns a JSON list. [`HttpCatalog`] is configured with one
//! [`EndpointConfig`] per entity kind describing the URL template and where
//! each field lives in the response, so no code is needed per catalog.
//!
//! # Examples
//!
//! ```rust
//! use ensemble::providers::{EndpointConfig, HttpCatalog, HttpCatalogConfigBuilder, LinkField};
//!
//! let config = HttpCatalogConfigBuilder::default()
//!     .id("tidal")
//!     .name("TIDAL")
//!     .base_url("https://api.example.com/v1")
//!     .tracks(EndpointConfig {
//!         links: vec![LinkField::new("isrc_owner.id", "qobuz")],
//!         ..EndpointConfig::new("/search/tracks?q={query}", "items")
//!             .with_artist("artist.name")
//!             .with_album("album.title")
//!     })
//!     .build()
//!     .unwrap();
//!
//! let tidal = HttpCatalog::new(config);
//! ```

use async_trait::async_trait;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::{
    error::Result,
    identity::QualifiedId,
    net::{HttpClient, json},
    provider::Provider,
    types::{AlbumMatch, ArtistMatch, TrackMatch},
};

/// A foreign identity carried in each result item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkField {
    /// Dot path of the foreign external id within one item
    pub path: String,
    /// Provider the foreign id belongs to
    pub provider: String,
}

impl LinkField {
    pub fn new(path: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            provider: provider.into(),
        }
    }
}

/// Where to search one entity kind and how to read the response.
///
/// `url` is appended to the catalog's base URL unless it is already
/// absolute. Every `{query}` in it is replaced by the URL-encoded query.
/// Items missing an id or a title are skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub url: String,
    /// Dot path of the result array
    pub items: String,
    #[serde(default = "default_id_field")]
    pub id: String,
    /// Title for tracks and albums, name for artists
    #[serde(default = "default_title_field")]
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub links: Vec<LinkField>,
}

fn default_id_field() -> String {
    "id".to_string()
}

fn default_title_field() -> String {
    "title".to_string()
}

impl EndpointConfig {
    pub fn new(url: impl Into<String>, items: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            items: items.into(),
            id: default_id_field(),
            title: default_title_field(),
            artist: None,
            album: None,
            year: None,
            duration: None,
            links: Vec::new(),
        }
    }

    pub fn with_id(mut self, path: impl Into<String>) -> Self {
        self.id = path.into();
        self
    }

    pub fn with_title(mut self, path: impl Into<String>) -> Self {
        self.title = path.into();
        self
    }

    pub fn with_artist(mut self, path: impl Into<String>) -> Self {
        self.artist = Some(path.into());
        self
    }

    pub fn with_album(mut self, path: impl Into<String>) -> Self {
        self.album = Some(path.into());
        self
    }

    pub fn with_year(mut self, path: impl Into<String>) -> Self {
        self.year = Some(path.into());
        self
    }

    pub fn with_duration(mut self, path: impl Into<String>) -> Self {
        self.duration = Some(path.into());
        self
    }

    pub fn with_link(mut self, link: LinkField) -> Self {
        self.links.push(link);
        self
    }

    fn field(&self, item: &Value, path: &Option<String>) -> Option<String> {
        path.as_deref().and_then(|p| json::extract_string(item, p))
    }

    fn number<T: std::str::FromStr>(&self, item: &Value, path: &Option<String>) -> Option<T> {
        self.field(item, path).and_then(|v| v.parse().ok())
    }

    fn links(&self, item: &Value) -> Vec<QualifiedId> {
        self.links
            .iter()
            .filter_map(|link| {
                json::extract_string(item, &link.path).map(|id| QualifiedId::new(&link.provider, id))
            })
            .collect()
    }

    /// Id and title of an item, or `None` if either is missing.
    fn identity(&self, item: &Value) -> Option<(String, String)> {
        Some((
            json::extract_string(item, &self.id)?,
            json::extract_string(item, &self.title)?,
        ))
    }
}

/// Static description of an HTTP catalog.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
pub struct HttpCatalogConfig {
    pub id: String,
    pub name: String,
    pub base_url: String,

    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub tracks: Option<EndpointConfig>,

    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub albums: Option<EndpointConfig>,

    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub artists: Option<EndpointConfig>,

    #[builder(default)]
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Minimum spacing between requests, in milliseconds
    #[builder(default = "250")]
    #[serde(default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,

    #[builder(default = "2")]
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_rate_limit_ms() -> u64 {
    250
}

fn default_max_retries() -> u32 {
    2
}

/// A provider that searches a JSON HTTP API.
pub struct HttpCatalog {
    config: HttpCatalogConfig,
    client: HttpClient,
}

impl HttpCatalog {
    pub fn new(mut config: HttpCatalogConfig) -> Self {
        config.id = config.id.to_lowercase();

        let mut client = HttpClient::new(config.id.clone())
            .with_rate_limit(Duration::from_millis(config.rate_limit_ms))
            .with_max_retries(config.max_retries);
        for (name, value) in &config.headers {
            client = client.with_header(name, value);
        }

        Self { config, client }
    }

    pub fn config(&self) -> &HttpCatalogConfig {
        &self.config
    }

    /// Builds the request URL for `endpoint` and `query`.
    pub fn endpoint_url(&self, endpoint: &EndpointConfig, query: &str) -> String {
        let path = endpoint
            .url
            .replace("{query}", &urlencoding::encode(query.trim()));
        if path.starts_with("http://") || path.starts_with("https://") {
            path
        } else {
            format!(
                "{}/{}",
                self.config.base_url.trim_end_matches('/'),
                path.trim_start_matches('/')
            )
        }
    }

    async fn fetch(&self, endpoint: &EndpointConfig, query: &str) -> Result<Vec<Value>> {
        let url = self.endpoint_url(endpoint, query);
        debug!(provider = %self.config.id, %url, "catalog search");
        let body: Value = self.client.get_json(&url).await?;
        Ok(json::extract_array(&body, &endpoint.items))
    }
}

/// Maps raw response items into tracks.
pub fn parse_tracks(endpoint: &EndpointConfig, items: Vec<Value>) -> Vec<TrackMatch> {
    items
        .into_iter()
        .filter_map(|item| {
            let (id, title) = endpoint.identity(&item)?;
            let mut track = TrackMatch::new(
                id,
                title,
                endpoint.field(&item, &endpoint.artist).unwrap_or_default(),
            );
            track.album = endpoint.field(&item, &endpoint.album);
            track.duration_secs = endpoint.number(&item, &endpoint.duration);
            track.links = endpoint.links(&item);
            Some(track.with_raw(item))
        })
        .collect()
}

/// Maps raw response items into albums.
pub fn parse_albums(endpoint: &EndpointConfig, items: Vec<Value>) -> Vec<AlbumMatch> {
    items
        .into_iter()
        .filter_map(|item| {
            let (id, title) = endpoint.identity(&item)?;
            let mut album = AlbumMatch::new(id, title);
            album.artist = endpoint.field(&item, &endpoint.artist);
            album.year = endpoint.number(&item, &endpoint.year);
            album.links = endpoint.links(&item);
            Some(album.with_raw(item))
        })
        .collect()
}

/// Maps raw response items into artists.
pub fn parse_artists(endpoint: &EndpointConfig, items: Vec<Value>) -> Vec<ArtistMatch> {
    items
        .into_iter()
        .filter_map(|item| {
            let (id, name) = endpoint.identity(&item)?;
            let mut artist = ArtistMatch::new(id, name);
            artist.links = endpoint.links(&item);
            Some(artist.with_raw(item))
        })
        .collect()
}

#[async_trait]
impl Provider for HttpCatalog {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn is_available(&self) -> bool {
        !self.config.base_url.trim().is_empty()
    }

    async fn search_tracks(&self, query: &str) -> Result<Vec<TrackMatch>> {
        match &self.config.tracks {
            Some(endpoint) => Ok(parse_tracks(endpoint, self.fetch(endpoint, query).await?)),
            None => Ok(Vec::new()),
        }
    }

    async fn search_albums(&self, query: &str) -> Result<Vec<AlbumMatch>> {
        match &self.config.albums {
            Some(endpoint) => Ok(parse_albums(endpoint, self.fetch(endpoint, query).await?)),
            None => Ok(Vec::new()),
        }
    }

    async fn search_artists(&self, query: &str) -> Result<Vec<ArtistMatch>> {
        match &self.config.artists {
            Some(endpoint) => Ok(parse_artists(endpoint, self.fetch(endpoint, query).await?)),
            None => Ok(Vec::new()),
        }
    }
}
