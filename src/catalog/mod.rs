//! # Catalog clients
//!
//! One small adapter per metadata provider, all behind [`CatalogClient`]:
//!
//! ```text
//! identifier ──► parse_reference (grammar only, no network)
//!                    │ None ─► LoadResult::NotAReference
//!                    ▼
//!                  load ──► single fetch | PagedCollectionFetcher walk
//!                    ▼
//!          Track | Collection | NotFound
//! ```
//!
//! The adapters share the credential lease, the injected HTTP transport and
//! the paging walker; what differs per provider is the request builder, the
//! response parser and the identifier grammar.

pub mod applemusic;
pub mod deezer;
pub mod dispatcher;
pub mod flowerytts;
pub mod paging;
pub mod spotify;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;

use crate::{
    Res,
    types::{LoadResult, Reference, TrackDescriptor},
};

pub use applemusic::AppleMusicClient;
pub use deezer::DeezerClient;
pub use dispatcher::CatalogDispatcher;
pub use flowerytts::FloweryTtsClient;
pub use paging::{Page, PageRequest, PagedCollectionFetcher};
pub use spotify::SpotifyClient;

/// Provider-specific capability set: identifier grammar, request building and
/// response parsing.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Tag stored in every descriptor this client produces.
    fn source_name(&self) -> &'static str;

    /// Recognizes an identifier without touching the network.
    fn parse_reference(&self, identifier: &str) -> Option<Reference>;

    /// Fetches what a parsed reference points at.
    async fn load(&self, reference: &Reference) -> Res<LoadResult>;

    /// Fetches a single track by its catalog identifier.
    async fn load_track(&self, id: &str) -> Res<Option<TrackDescriptor>> {
        let reference = Reference::Track {
            id: id.to_string(),
            country: None,
        };
        match self.load(&reference).await? {
            LoadResult::Track(track) => Ok(Some(track)),
            _ => Ok(None),
        }
    }

    /// Parses and loads an identifier; an unknown shape is `NotAReference`.
    async fn resolve_reference(&self, identifier: &str) -> Res<LoadResult> {
        match self.parse_reference(identifier.trim()) {
            Some(reference) => self.load(&reference).await,
            None => Ok(LoadResult::NotAReference),
        }
    }
}

/// Parses `identifier` as a web URL on `host` (with or without `www.` and
/// scheme).
pub(crate) fn parse_web_url(identifier: &str, host: &str) -> Option<Url> {
    let candidate = if identifier.contains("://") {
        identifier.to_string()
    } else {
        format!("https://{identifier}")
    };
    let url = Url::parse(&candidate).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let url_host = url.host_str()?;
    (url_host.strip_prefix("www.").unwrap_or(url_host) == host).then_some(url)
}

/// Non-empty path segments of a URL.
pub(crate) fn path_segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

pub(crate) fn is_identifier(value: &str, extra: &[char]) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || extra.contains(&c))
}

pub(crate) fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

pub(crate) fn string_at(value: &Value, pointer: &str) -> Option<String> {
    str_at(value, pointer).map(str::to_string)
}

/// Whether a page advertises a following page through a non-null `next`.
pub(crate) fn has_next_marker(page: &Value) -> bool {
    page.get("next").is_some_and(|next| !next.is_null())
}
