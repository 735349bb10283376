//! Provider implementations with conditional compilation support.
//!
//! Each provider is behind its own feature flag:
//! - `provider-local` - [`LocalCatalog`], an in-memory catalog of owned media
//! - `provider-http` - [`HttpCatalog`], a configurable JSON search API client
//! - `all-providers` - both (default)
//!
//! Build with only the local catalog:
//! ```bash
//! cargo build --no-default-features --features provider-local
//! ```

#[cfg(feature = "provider-local")]
pub mod local;

#[cfg(feature = "provider-http")]
pub mod http;

#[cfg(feature = "provider-local")]
pub use local::LocalCatalog;

#[cfg(feature = "provider-http")]
pub use http::{EndpointConfig, HttpCatalog, HttpCatalogConfig, HttpCatalogConfigBuilder, LinkField};
