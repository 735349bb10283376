//! Cross-provider identity resolution and result merging.
//!
//! Two matches from different providers are the same logical entity only when
//! one of them explicitly records the other's identity: a local catalog entry
//! remembering which remote track it was imported from, for example. Titles
//! and artist names are never compared.
//!
//! How that record is read is pluggable through [`IdentityResolver`]:
//!
//! - [`ForeignIdLinkage`] - reads the normalized `links` field (default)
//! - [`RawFieldLinkage`] - reads a foreign id out of the raw provider payload
//!
//! [`unify`] applies a resolver while concatenating per-provider batches in
//! priority order.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::identity::QualifiedId;
use crate::net::json;
use crate::types::{ProviderMatch, UnifiedMatch};

/// Strategy deciding which foreign identities a match stands for.
pub trait IdentityResolver: Send + Sync {
    /// Foreign identities `item`, owned by `provider_id`, is linked to.
    fn linked_identities(&self, provider_id: &str, item: &dyn LinkSource) -> Vec<QualifiedId>;
}

/// Object-safe view of a match used by resolvers.
pub trait LinkSource {
    fn links(&self) -> &[QualifiedId];
    fn raw(&self) -> &Value;
}

impl<T: ProviderMatch> LinkSource for T {
    fn links(&self) -> &[QualifiedId] {
        ProviderMatch::links(self)
    }

    fn raw(&self) -> &Value {
        ProviderMatch::raw(self)
    }
}

/// Resolver using the explicit `links` recorded on each match.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForeignIdLinkage;

impl IdentityResolver for ForeignIdLinkage {
    fn linked_identities(&self, _provider_id: &str, item: &dyn LinkSource) -> Vec<QualifiedId> {
        item.links().to_vec()
    }
}

/// Resolver reading a foreign id from the raw payload of one provider.
///
/// ```rust
/// use ensemble::linkage::{IdentityResolver, RawFieldLinkage};
/// use ensemble::types::TrackMatch;
/// use serde_json::json;
///
/// let resolver = RawFieldLinkage::new("local", "import.tidalId", "tidal");
/// let track = TrackMatch::new("7", "Something", "The Beatles")
///     .with_raw(json!({ "import": { "tidalId": 5551234 } }));
///
/// let ids = resolver.linked_identities("local", &track);
/// assert_eq!(ids[0].to_string(), "tidal:5551234");
/// ```
#[derive(Debug, Clone)]
pub struct RawFieldLinkage {
    provider_id: String,
    path: String,
    foreign_provider: String,
}

impl RawFieldLinkage {
    /// Matches owned by `provider_id` link to `foreign_provider` through the
    /// value found at the dot-separated `path` of their raw payload.
    pub fn new(
        provider_id: impl Into<String>,
        path: impl Into<String>,
        foreign_provider: impl Into<String>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            path: path.into(),
            foreign_provider: foreign_provider.into(),
        }
    }
}

impl IdentityResolver for RawFieldLinkage {
    fn linked_identities(&self, provider_id: &str, item: &dyn LinkSource) -> Vec<QualifiedId> {
        if provider_id != self.provider_id {
            return Vec::new();
        }
        let id = match json::extract_path(item.raw(), &self.path) {
            Some(Value::String(s)) if !s.trim().is_empty() => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => return Vec::new(),
        };
        vec![QualifiedId::new(&self.foreign_provider, id)]
    }
}

/// Concatenates per-provider batches into one de-duplicated list.
///
/// `batches` must already be in provider priority order; within a batch the
/// provider's own order is kept. An entry is dropped when its qualified id was
/// already emitted (directly or as an alias), or when another entry in the
/// set claims it through the resolver. The claiming entry keeps the claimed
/// ids as `aliases`.
pub fn unify<'a, T: ProviderMatch>(
    batches: impl IntoIterator<Item = (&'a str, &'a [T])>,
    resolver: &dyn IdentityResolver,
) -> Vec<UnifiedMatch<T>> {
    let candidates: Vec<UnifiedMatch<T>> = batches
        .into_iter()
        .flat_map(|(provider_id, items)| {
            items.iter().map(move |item| {
                let id = QualifiedId::new(provider_id, item.external_id());
                let mut aliases = resolver.linked_identities(provider_id, item);
                aliases.retain(|alias| alias != &id);
                aliases.dedup();
                UnifiedMatch {
                    id,
                    item: item.clone(),
                    aliases,
                }
            })
        })
        .collect();

    // first claimer in priority order wins
    let mut claimed_by: HashMap<&QualifiedId, &QualifiedId> = HashMap::new();
    for candidate in &candidates {
        for alias in &candidate.aliases {
            claimed_by.entry(alias).or_insert(&candidate.id);
        }
    }

    let mut seen: HashSet<QualifiedId> = HashSet::new();
    let mut keep = vec![false; candidates.len()];
    for (index, candidate) in candidates.iter().enumerate() {
        if seen.contains(&candidate.id) {
            continue;
        }
        if let Some(claimer) = claimed_by.get(&candidate.id) {
            // two entries claiming each other: the first one seen survives
            if !candidate.aliases.contains(*claimer) {
                continue;
            }
        }
        seen.insert(candidate.id.clone());
        seen.extend(candidate.aliases.iter().cloned());
        keep[index] = true;
    }

    candidates
        .into_iter()
        .zip(keep)
        .filter_map(|(candidate, keep)| keep.then_some(candidate))
        .collect()
}
