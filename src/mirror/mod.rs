//! # Mirror resolution
//!
//! Metadata-only catalogs (Spotify, Apple Music) describe tracks they can't
//! stream. The [`MirrorResolver`] finds a playable stand-in by asking an
//! ordered list of [`MirrorProvider`]s for candidates and scoring them
//! against the original descriptor:
//!
//! ```text
//! provider 1 ──► candidates ──► select_best ──► StreamRef
//!      │ skipped / error / nothing passed
//!      ▼
//! provider 2 ──► ...
//!      ▼
//! MirrorResolutionFailed, or the last transport error when every
//! provider failed outright
//! ```

pub mod scoring;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::{
    Res,
    catalog::CatalogDispatcher,
    config::SourcesConfig,
    error::SourceError,
    types::{LoadResult, StreamRef, TrackDescriptor},
};

pub const ISRC_PLACEHOLDER: &str = "%ISRC%";
pub const QUERY_PLACEHOLDER: &str = "%QUERY%";

/// A source of playable candidates for a metadata-only descriptor.
#[async_trait]
pub trait MirrorProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Whether lookups go by ISRC rather than free text.
    fn supports_isrc(&self) -> bool;

    /// Playable candidates in the provider's own result order.
    ///
    /// `Ok(None)` means the provider can't build a lookup for this
    /// descriptor (e.g. an ISRC lookup for a track without one) and is
    /// skipped.
    async fn candidates(&self, descriptor: &TrackDescriptor) -> Res<Option<Vec<TrackDescriptor>>>;

    /// Re-fetches a previously resolved stream. `Ok(None)` when the provider
    /// doesn't serve `hint.source` or the content is gone.
    async fn revalidate(&self, _hint: &StreamRef) -> Res<Option<TrackDescriptor>> {
        Ok(None)
    }
}

/// Mirror backed by the catalog dispatcher: renders an identifier template
/// such as `dzisrc:%ISRC%` or `dzsearch:%QUERY%` and loads it.
pub struct CatalogMirror {
    template: String,
    dispatcher: Arc<CatalogDispatcher>,
}

impl CatalogMirror {
    pub fn new(template: &str, dispatcher: Arc<CatalogDispatcher>) -> Self {
        Self {
            template: template.to_string(),
            dispatcher,
        }
    }

    /// The identifier to load for `descriptor`, `None` when the template
    /// needs an ISRC the descriptor lacks.
    pub fn render(&self, descriptor: &TrackDescriptor) -> Option<String> {
        let mut identifier = self.template.clone();
        if identifier.contains(ISRC_PLACEHOLDER) {
            let isrc = descriptor.isrc.as_deref().filter(|isrc| !isrc.is_empty())?;
            identifier = identifier.replace(ISRC_PLACEHOLDER, isrc);
        }
        if identifier.contains(QUERY_PLACEHOLDER) {
            let query = format!("{} {}", descriptor.title, descriptor.author);
            identifier = identifier.replace(QUERY_PLACEHOLDER, query.trim());
        }
        Some(identifier)
    }
}

#[async_trait]
impl MirrorProvider for CatalogMirror {
    fn name(&self) -> &str {
        &self.template
    }

    fn supports_isrc(&self) -> bool {
        self.template.contains(ISRC_PLACEHOLDER)
    }

    async fn candidates(&self, descriptor: &TrackDescriptor) -> Res<Option<Vec<TrackDescriptor>>> {
        let Some(identifier) = self.render(descriptor) else {
            return Ok(None);
        };

        let result = self.dispatcher.resolve(&identifier).await?;
        if result == LoadResult::NotAReference {
            warn!(template = %self.template, identifier = %identifier, "mirror template matches no catalog");
            return Ok(None);
        }

        let candidates = result
            .into_tracks()
            .into_iter()
            .filter(|track| track.is_playable)
            .collect();
        Ok(Some(candidates))
    }

    async fn revalidate(&self, hint: &StreamRef) -> Res<Option<TrackDescriptor>> {
        if self.dispatcher.client(&hint.source).is_none() {
            return Ok(None);
        }
        let track = self
            .dispatcher
            .load_track(&hint.source, &hint.identifier)
            .await?;
        Ok(track.filter(|track| track.is_playable))
    }
}

/// Finds a playable stream for a metadata-only descriptor.
pub struct MirrorResolver {
    providers: Vec<Arc<dyn MirrorProvider>>,
    tolerance_ms: u64,
}

impl MirrorResolver {
    pub fn new(providers: Vec<Arc<dyn MirrorProvider>>, tolerance_ms: u64) -> Self {
        Self {
            providers,
            tolerance_ms,
        }
    }

    /// One [`CatalogMirror`] per configured template, in configured order.
    pub fn from_config(config: &SourcesConfig, dispatcher: Arc<CatalogDispatcher>) -> Self {
        let providers = config
            .mirror_providers
            .iter()
            .map(|template| {
                let mirror = CatalogMirror::new(template, dispatcher.clone());
                Arc::new(mirror) as Arc<dyn MirrorProvider>
            })
            .collect();
        Self::new(providers, config.duration_tolerance_ms)
    }

    pub fn tolerance_ms(&self) -> u64 {
        self.tolerance_ms
    }

    pub fn providers(&self) -> &[Arc<dyn MirrorProvider>] {
        &self.providers
    }

    /// Queries the providers in order and returns the first accepted match.
    ///
    /// A provider whose candidates all fail the scoring gate, or whose
    /// request fails, hands over to the next one.
    ///
    /// # Errors
    ///
    /// - The last provider error when every provider that was asked failed.
    /// - [`SourceError::MirrorResolutionFailed`] otherwise.
    pub async fn resolve(&self, descriptor: &TrackDescriptor) -> Res<StreamRef> {
        if let Some(stream) = descriptor.stream_ref() {
            return Ok(stream);
        }

        let has_isrc = descriptor.isrc.as_deref().is_some_and(|isrc| !isrc.is_empty());
        let mut answered = false;
        let mut last_error: Option<SourceError> = None;

        for provider in &self.providers {
            if provider.supports_isrc() && !has_isrc {
                debug!(provider = provider.name(), track = %descriptor, "mirror skipped, no isrc");
                continue;
            }
            let candidates = match provider.candidates(descriptor).await {
                Ok(Some(candidates)) => candidates,
                Ok(None) => {
                    debug!(provider = provider.name(), track = %descriptor, "mirror skipped");
                    continue;
                }
                Err(err) => {
                    warn!(
                        provider = provider.name(),
                        track = %descriptor,
                        error = %err,
                        "mirror lookup failed"
                    );
                    last_error = Some(err);
                    continue;
                }
            };
            answered = true;

            match scoring::select_best(descriptor, &candidates, self.tolerance_ms) {
                Some(best) => {
                    info!(
                        provider = provider.name(),
                        track = %descriptor,
                        mirror = %best,
                        "mirror resolved"
                    );
                    return Ok(StreamRef {
                        source: best.source.clone(),
                        identifier: best.identifier.clone(),
                        uri: best.uri.clone(),
                    });
                }
                None => debug!(
                    provider = provider.name(),
                    candidates = candidates.len(),
                    "no mirror candidate passed"
                ),
            }
        }

        match last_error {
            Some(err) if !answered => Err(err),
            _ => Err(SourceError::MirrorResolutionFailed {
                title: descriptor.title.clone(),
                artist: descriptor.author.clone(),
            }),
        }
    }

    /// Checks a persisted mirror hint before reuse.
    ///
    /// The hinted stream is re-fetched and the duration gate reapplied.
    /// `None` means the hint can't be trusted and full resolution is needed;
    /// lookup errors are logged and treated the same way.
    pub async fn revalidate(
        &self,
        hint: &StreamRef,
        descriptor: &TrackDescriptor,
    ) -> Option<StreamRef> {
        for provider in &self.providers {
            match provider.revalidate(hint).await {
                Ok(Some(current)) => {
                    if !scoring::passes_duration_gate(descriptor, &current, self.tolerance_ms) {
                        debug!(hint = %hint, "mirror hint no longer matches");
                        return None;
                    }
                    debug!(hint = %hint, "mirror hint revalidated");
                    return Some(StreamRef {
                        source: current.source,
                        identifier: current.identifier,
                        uri: current.uri,
                    });
                }
                Ok(None) => continue,
                Err(err) => {
                    warn!(hint = %hint, error = %err, "mirror hint revalidation failed");
                    return None;
                }
            }
        }
        None
    }
}
