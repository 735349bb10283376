//! # Ensemble - Federated music search and download tracking
//!
//! Ensemble puts several music catalogs (a local library, remote streaming
//! services) behind one search box and keeps track of the downloads started
//! from it.
//!
//! ## Features
//!
//! - **Federated Search**: one query fans out to every provider for tracks, albums and artists
//! - **Debouncing**: keystrokes are coalesced into a single effective query
//! - **Staleness Guard**: replies to superseded queries can never overwrite newer results
//! - **Failure Isolation**: a failing or panicking provider contributes nothing, the rest still render
//! - **De-duplication**: explicit cross-provider links collapse duplicates, local entries win
//! - **Download Lifecycle**: pending, downloading, complete and error states driven by engine events
//! - **Completion Registry**: "already downloaded" survives task resets and can be persisted
//!
//! ## Quick Start
//!
//! ### Searching
//!
//! ```rust,no_run
//! use ensemble::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> ensemble::Result<()> {
//!     let local = LocalCatalog::new("local");
//!     local.add_track(TrackMatch::new("t1", "Come Together", "The Beatles").with_album("Abbey Road"));
//!
//!     let mut providers = Providers::new();
//!     providers.add(local);
//!
//!     let search = SearchFederator::new(providers).spawn();
//!     search.set_query("abbey road")?;
//!
//!     let view = search
//!         .wait_for(|v| v.query == "abbey road" && !v.is_loading())
//!         .await?;
//!     println!("{} tracks", view.results.tracks.len());
//!     Ok(())
//! }
//! ```
//!
//! ### Tracking Downloads
//!
//! ```rust,no_run
//! use ensemble::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(engine: Arc<dyn TransferEngine>, view: SearchView) -> ensemble::Result<()> {
//! let downloads = DownloadCoordinator::new(engine);
//!
//! let track = TrackDescriptor::from(&view.results.tracks[0]);
//! let key = downloads.request_download(&track).await?;
//!
//! if let Some(task) = downloads.task(&key) {
//!     println!("{} is {:?}", key, task.status);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`provider`]: the provider trait and collection
//! - [`providers`]: built-in providers (feature gated)
//! - [`search`]: the debounced, generation-guarded search federator
//! - [`linkage`]: cross-provider identity resolution
//! - [`download`]: the download lifecycle coordinator and completion registry
//! - [`identity`]: qualified ids and task key derivation
//! - [`types`]: match types, filters and track descriptors
//! - [`net`]: HTTP client, rate limiting and JSON extraction
//! - [`error`]: error handling

pub mod download;
pub mod error;
pub mod identity;
pub mod linkage;
pub mod net;
pub mod provider;
pub mod providers;
pub mod search;
pub mod types;

/// Prelude module for convenient imports.
///
/// ```rust
/// use ensemble::prelude::*;
///
/// // Now you have access to:
/// // - Providers, Provider trait, the built-in providers
/// // - SearchFederator, FederatorHandle, SearchView
/// // - DownloadCoordinator, TransferEngine and its events
/// // - Match types, EntityFilter, TrackDescriptor, QualifiedId
/// ```
pub mod prelude {
    pub use crate::{
        download::{
            CompletionRegistry, CoordinatorConfig, DownloadCoordinator, DownloadStatus,
            DownloadTask, TaskMap, TransferEngine, TransferEvent, TransferEventBus,
            TransferMetadata, TransferSubscription,
        },
        identity::{QualifiedId, TaskKey},
        linkage::{ForeignIdLinkage, IdentityResolver, RawFieldLinkage},
        provider::{Batch, Provider, Providers},
        search::{FederatorConfig, FederatorHandle, SearchFederator, SearchView},
        types::{
            AlbumMatch, ArtistMatch, EntityFilter, EntityKind, TrackDescriptor, TrackMatch,
            UnifiedMatch, UnifiedResultSet,
        },
    };

    #[cfg(feature = "provider-http")]
    pub use crate::providers::HttpCatalog;
    #[cfg(feature = "provider-local")]
    pub use crate::providers::LocalCatalog;
}

// Re-export main types at crate root for direct access
pub use download::{DownloadCoordinator, TransferEngine};
pub use error::{Error, Result};
pub use identity::{QualifiedId, TaskKey};
pub use provider::{Provider, Providers};
pub use search::{FederatorHandle, SearchFederator};
pub use types::{TrackDescriptor, TrackMatch, UnifiedResultSet};
