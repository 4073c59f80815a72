//! Error taxonomy shared by every catalog client, the paging walker, the
//! credential leases and the mirror resolver.
//!
//! "Not a reference for this provider" and "legitimately empty" outcomes are
//! absent here: they are ordinary values of
//! [`LoadResult`](crate::types::LoadResult), never faults.

use thiserror::Error;

/// Failure surfaced by any operation of the crate.
///
/// The type is `Clone` so that a single failed resolution can be handed to
/// every caller that was waiting on it.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Network failure, timeout or a non-2xx status other than 404.
    #[error("transport error{}: {message}", status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// The provider answered with a document of unexpected shape.
    #[error("unexpected response: {0}")]
    Parse(String),

    /// A non-refreshable credential is past its expiry.
    #[error("{provider} credential is expired and cannot be refreshed")]
    TokenExpired { provider: String },

    /// A page request failed while walking a collection.
    #[error("failed to fetch page at offset {offset}: {source}")]
    Fetch {
        offset: usize,
        #[source]
        source: Box<SourceError>,
    },

    /// Every mirror candidate was rejected by the scoring gate.
    #[error("no mirror matched \"{title}\" by \"{artist}\"")]
    MirrorResolutionFailed { title: String, artist: String },

    /// Missing or malformed configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A persisted reference names a source that is not registered.
    #[error("unknown source: {0}")]
    UnknownSource(String),

    /// Reading or writing the local reference store failed.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Coarse classification the calling layer turns into a user-visible message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// "track/playlist not found"
    NotFound,
    /// "temporarily unavailable"
    TemporarilyUnavailable,
    /// "misconfigured"
    Misconfigured,
}

impl SourceError {
    pub fn transport(message: impl Into<String>) -> Self {
        SourceError::Transport {
            status: None,
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        SourceError::Parse(message.into())
    }

    pub fn classification(&self) -> FailureClass {
        match self {
            SourceError::Transport { .. } | SourceError::Parse(_) => {
                FailureClass::TemporarilyUnavailable
            }
            SourceError::Fetch { source, .. } => source.classification(),
            SourceError::MirrorResolutionFailed { .. } => FailureClass::NotFound,
            SourceError::TokenExpired { .. }
            | SourceError::Config(_)
            | SourceError::UnknownSource(_)
            | SourceError::Storage(_) => FailureClass::Misconfigured,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return SourceError::Parse(err.to_string());
        }
        SourceError::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        SourceError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(err.to_string())
    }
}
