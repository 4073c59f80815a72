use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical description of a single catalog entry.
///
/// Built once by a catalog client while parsing a response and never mutated
/// afterwards; share it by cloning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    /// Source tag of the catalog that produced the entry (e.g. `spotify`).
    pub source: String,
    pub title: String,
    /// Display name of the primary artist.
    pub author: String,
    /// Duration in milliseconds, 0 when unknown.
    pub duration_ms: u64,
    /// Opaque catalog identifier.
    pub identifier: String,
    /// Whether the catalog itself can supply a stream for this entry.
    pub is_playable: bool,
    pub uri: Option<String>,
    pub artwork_url: Option<String>,
    pub isrc: Option<String>,
}

impl TrackDescriptor {
    /// Stream reference for a directly playable descriptor.
    pub fn stream_ref(&self) -> Option<StreamRef> {
        self.is_playable.then(|| StreamRef {
            source: self.source.clone(),
            identifier: self.identifier.clone(),
            uri: self.uri.clone(),
        })
    }
}

impl fmt::Display for TrackDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} ({})", self.title, self.author, self.source)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollectionKind {
    Album,
    Playlist,
    ArtistTopTracks,
    SearchResult,
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionKind::Album => write!(f, "album"),
            CollectionKind::Playlist => write!(f, "playlist"),
            CollectionKind::ArtistTopTracks => write!(f, "artist-top-tracks"),
            CollectionKind::SearchResult => write!(f, "search-result"),
        }
    }
}

/// Ordered group of tracks in catalog order. Duplicates are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionDescriptor {
    pub source: String,
    pub title: String,
    pub kind: CollectionKind,
    pub tracks: Vec<TrackDescriptor>,
    /// Author, artist or curator display name.
    pub author: Option<String>,
    pub artwork_url: Option<String>,
    pub uri: Option<String>,
}

/// Provider-native identifier of a playable stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamRef {
    pub source: String,
    pub identifier: String,
    pub uri: Option<String>,
}

impl fmt::Display for StreamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.identifier)
    }
}

/// Outcome of resolving one identifier against a catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadResult {
    Track(TrackDescriptor),
    Collection(CollectionDescriptor),
    /// The identifier was understood but the catalog has nothing for it.
    NotFound,
    /// The identifier matched no grammar of the provider; try the next one.
    NotAReference,
}

impl LoadResult {
    /// Tracks carried by the result, in catalog order.
    pub fn into_tracks(self) -> Vec<TrackDescriptor> {
        match self {
            LoadResult::Track(track) => vec![track],
            LoadResult::Collection(collection) => collection.tracks,
            LoadResult::NotFound | LoadResult::NotAReference => Vec::new(),
        }
    }
}

/// Seeds of a recommendation query. Empty lists are left out of the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSet {
    pub artists: String,
    pub tracks: String,
    pub genres: String,
}

/// Text-to-speech request with every voice setting resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: String,
    pub translate: bool,
    /// Silence appended after the speech, in milliseconds.
    pub silence_ms: u32,
    pub speed: f32,
}

/// A parsed identifier, produced by a catalog's grammar before any network call.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    Search(String),
    Isrc(String),
    Recommendations(SeedSet),
    Track {
        id: String,
        country: Option<String>,
    },
    Album {
        id: String,
        /// Single item addressed inside the album.
        item: Option<String>,
        country: Option<String>,
    },
    Playlist {
        id: String,
        country: Option<String>,
    },
    Artist {
        id: String,
        country: Option<String>,
    },
    Speech(SpeechRequest),
}
