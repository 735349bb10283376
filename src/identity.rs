//! Qualified identifiers and task key derivation.
//!
//! Every track, album and artist surfaced by Ensemble is addressed by a
//! [`QualifiedId`]: the owning provider plus the provider's own external id,
//! rendered as `"provider:externalId"`. Downloads use the same value as their
//! task key ([`TaskKey`]).
//!
//! All parsing and construction of the string form lives here so call sites
//! never split or format keys by hand.
//!
//! # Examples
//!
//! ```rust
//! use ensemble::identity::QualifiedId;
//!
//! let id: QualifiedId = "tidal:5551234".parse().unwrap();
//! assert_eq!(id.provider(), "tidal");
//! assert_eq!(id.external_id(), "5551234");
//! assert_eq!(id.to_string(), "tidal:5551234");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::types::TrackDescriptor;

/// Separator between the provider id and the external id.
pub const SEPARATOR: char = ':';

/// A provider-qualified identifier, `"provider:externalId"`.
///
/// Provider ids are normalized to lowercase; external ids are kept verbatim
/// apart from surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QualifiedId {
    provider: String,
    external_id: String,
}

/// The canonical key of one download task.
pub type TaskKey = QualifiedId;

impl QualifiedId {
    /// Builds an id from its two parts.
    pub fn new(provider: impl AsRef<str>, external_id: impl AsRef<str>) -> Self {
        Self {
            provider: provider.as_ref().trim().to_lowercase(),
            external_id: external_id.as_ref().trim().to_string(),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    /// Parses the `"provider:externalId"` form.
    ///
    /// Only the first separator splits; anything after it belongs to the
    /// external id. Returns `None` when either side is empty.
    pub fn parse(raw: &str) -> Option<Self> {
        let (provider, external_id) = raw.trim().split_once(SEPARATOR)?;
        if provider.trim().is_empty() || external_id.trim().is_empty() {
            return None;
        }
        Some(Self::new(provider, external_id))
    }

    /// Best-effort resolution of a key reported by an external system.
    ///
    /// Accepts the qualified form, or a bare numeric id that is attributed to
    /// `legacy_provider`.
    ///
    /// ```rust
    /// use ensemble::identity::QualifiedId;
    ///
    /// let key = QualifiedId::resolve(" 42 ", "tidal").unwrap();
    /// assert_eq!(key.to_string(), "tidal:42");
    /// assert!(QualifiedId::resolve("not-a-key", "tidal").is_none());
    /// ```
    pub fn resolve(raw: &str, legacy_provider: &str) -> Option<Self> {
        Self::parse(raw).or_else(|| {
            let trimmed = raw.trim();
            is_numeric(trimmed).then(|| Self::new(legacy_provider, trimmed))
        })
    }
}

impl fmt::Display for QualifiedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.provider, SEPARATOR, self.external_id)
    }
}

impl FromStr for QualifiedId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| Error::parse(format!("Invalid qualified id: {:?}", s)))
    }
}

impl TryFrom<String> for QualifiedId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<QualifiedId> for String {
    fn from(id: QualifiedId) -> Self {
        id.to_string()
    }
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

impl TrackDescriptor {
    /// Derives the download task key for this track.
    ///
    /// In order of preference:
    /// 1. explicit `provider_id` plus `external_id` (or `id`)
    /// 2. a provider-prefixed `path` such as `"tidal:12345"`
    /// 3. a bare numeric `external_id`, `id` or `path`, attributed to
    ///    `legacy_provider`
    ///
    /// # Errors
    ///
    /// [`Error::MissingIdentity`] when none of the above applies.
    ///
    /// ```rust
    /// use ensemble::TrackDescriptor;
    ///
    /// let track = TrackDescriptor::titled("Come Together").with_path("tidal:5551234");
    /// assert_eq!(track.task_key("legacy").unwrap().to_string(), "tidal:5551234");
    ///
    /// let legacy = TrackDescriptor::titled("Something").with_id("77");
    /// assert_eq!(legacy.task_key("legacy").unwrap().to_string(), "legacy:77");
    /// ```
    pub fn task_key(&self, legacy_provider: &str) -> Result<TaskKey> {
        let non_empty = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let provider = non_empty(&self.provider_id);
        let external = non_empty(&self.external_id).or_else(|| non_empty(&self.id));

        if let (Some(provider), Some(external)) = (&provider, &external) {
            return Ok(QualifiedId::new(provider, external));
        }

        if let Some(key) = self.path.as_deref().and_then(QualifiedId::parse) {
            return Ok(key);
        }

        let bare = external.or_else(|| non_empty(&self.path));
        match bare {
            Some(id) if is_numeric(&id) => Ok(QualifiedId::new(legacy_provider, id)),
            _ => Err(Error::missing_identity(format!(
                "cannot derive provider/external id for {:?}",
                self.title
            ))),
        }
    }
}
