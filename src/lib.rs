//! Music catalog sources with mirror resolution.
//!
//! This library ingests track, album, playlist and artist metadata from
//! several catalog APIs, normalizes it into a single track representation
//! and, for catalogs that only expose metadata, resolves a playable stream
//! from an ordered list of mirror providers.
//!
//! # Modules
//!
//! - `catalog` - Per-provider catalog clients (Spotify, Apple Music, Deezer, FloweryTTS), the paging walker and the dispatcher
//! - `config` - Configuration management and environment variables
//! - `error` - The typed error taxonomy
//! - `http` - The injected HTTP transport
//! - `management` - Credential leases, resolved track handles and their persistence
//! - `mirror` - Mirror providers, candidate scoring and the resolver
//! - `types` - Data structures and type definitions
//! - `utils` - Text normalization and other helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use mirrorsrc::{
//!     catalog::CatalogDispatcher, config, config::SourcesConfig, http::ReqwestTransport,
//!     management::ResolvedTrackHandle, mirror::MirrorResolver,
//! };
//!
//! #[tokio::main]
//! async fn main() -> mirrorsrc::Res<()> {
//!     config::load_env()?;
//!     let config = SourcesConfig::from_env()?;
//!     let http = Arc::new(ReqwestTransport::new(config.http_timeout)?);
//!     let dispatcher = Arc::new(CatalogDispatcher::from_config(&config, http)?);
//!     let resolver = MirrorResolver::from_config(&config, dispatcher.clone());
//!
//!     let result = dispatcher.resolve("search:daft punk one more time").await?;
//!     for track in result.into_tracks() {
//!         let handle = ResolvedTrackHandle::new(track);
//!         let stream = handle.resolve(&resolver).await?;
//!         println!("{} -> {}", handle.descriptor(), stream);
//!     }
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod http;
pub mod management;
pub mod mirror;
pub mod types;
pub mod utils;

/// Result alias used throughout the crate.
///
/// Every fallible operation reports a [`error::SourceError`], which the
/// calling layer can classify with
/// [`SourceError::classification`](error::SourceError::classification).
pub type Res<T> = std::result::Result<T, error::SourceError>;
