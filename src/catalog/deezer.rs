use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{
    CatalogClient, Page, PageRequest, PagedCollectionFetcher, has_next_marker, is_identifier,
    parse_web_url, path_segments, str_at, string_at,
};
use crate::{
    Res,
    error::SourceError,
    http::{HttpRequest, HttpTransport},
    types::{CollectionDescriptor, CollectionKind, LoadResult, Reference, TrackDescriptor},
};

pub const SOURCE_NAME: &str = "deezer";
pub const SEARCH_PREFIX: &str = "dzsearch:";
pub const ISRC_PREFIX: &str = "dzisrc:";
pub const API_BASE: &str = "https://api.deezer.com/2.0";
pub const MAX_PAGE_ITEMS: usize = 100;
const TOP_TRACKS_LIMIT: usize = 50;
/// Error code Deezer uses for a resource that does not exist.
const NO_DATA_ERROR_CODE: u64 = 800;

/// Deezer's public catalog. Needs no credential and its tracks are directly
/// playable, which is what makes it usable as a mirror.
pub struct DeezerClient {
    http: Arc<dyn HttpTransport>,
    page_limit: i64,
}

impl DeezerClient {
    pub fn new(http: Arc<dyn HttpTransport>) -> Self {
        Self { http, page_limit: 0 }
    }

    /// Page-count ceiling for albums and playlists; 0 or negative means
    /// unbounded.
    pub fn with_page_limit(mut self, page_limit: i64) -> Self {
        self.page_limit = page_limit;
        self
    }

    /// `None` for a 404 or for Deezer's "no data" error document. Every
    /// other error document (quota exceeded, service busy) is a transport
    /// failure.
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Res<Option<Value>> {
        let mut request = HttpRequest::get(format!("{API_BASE}{path}"));
        for (key, value) in query {
            request = request.query(key, value);
        }
        let Some(body) = self.http.execute(request).await? else {
            return Ok(None);
        };
        let Some(error) = body.get("error") else {
            return Ok(Some(body));
        };

        let code = error.get("code").and_then(Value::as_u64);
        debug!(path, code = ?code, error = %error, "deezer reported an error document");
        if code == Some(NO_DATA_ERROR_CODE) {
            return Ok(None);
        }
        Err(SourceError::Transport {
            status: None,
            message: format!(
                "deezer error {}: {}",
                code.map(|c| c.to_string()).unwrap_or_else(|| "?".to_string()),
                str_at(error, "/message").unwrap_or("unknown error")
            ),
        })
    }

    async fn search(&self, query: &str) -> Res<LoadResult> {
        if query.is_empty() {
            return Ok(LoadResult::NotFound);
        }
        let Some(json) = self.get_json("/search", &[("q", query.to_string())]).await? else {
            return Ok(LoadResult::NotFound);
        };

        let tracks = Self::parse_tracks(json.get("data"), None);
        if tracks.is_empty() {
            return Ok(LoadResult::NotFound);
        }
        Ok(LoadResult::Collection(CollectionDescriptor {
            source: SOURCE_NAME.to_string(),
            title: format!("Deezer Search: {query}"),
            kind: CollectionKind::SearchResult,
            tracks,
            author: None,
            artwork_url: None,
            uri: None,
        }))
    }

    async fn track(&self, path: &str) -> Res<LoadResult> {
        let Some(json) = self.get_json(path, &[]).await? else {
            return Ok(LoadResult::NotFound);
        };
        Self::parse_track(&json, None)
            .map(LoadResult::Track)
            .ok_or_else(|| SourceError::parse(format!("deezer track {path} has no id")))
    }

    async fn collection(&self, kind: CollectionKind, id: &str) -> Res<LoadResult> {
        let (resource, author_pointer) = match kind {
            CollectionKind::Playlist => ("playlist", "/creator/name"),
            _ => ("album", "/artist/name"),
        };
        let Some(json) = self.get_json(&format!("/{resource}/{id}"), &[]).await? else {
            return Ok(LoadResult::NotFound);
        };

        let artwork_url = string_at(&json, "/cover_xl").or_else(|| string_at(&json, "/picture_xl"));
        let fallback = match kind {
            CollectionKind::Album => artwork_url.clone(),
            _ => None,
        };
        let path = format!("/{resource}/{id}/tracks");
        let fetcher = PagedCollectionFetcher::new(MAX_PAGE_ITEMS, self.page_limit);
        let tracks = fetcher
            .fetch(move |page| self.track_page(path.clone(), page, fallback.clone()))
            .await?;

        Ok(LoadResult::Collection(CollectionDescriptor {
            source: SOURCE_NAME.to_string(),
            title: string_at(&json, "/title").unwrap_or_default(),
            kind,
            tracks,
            author: string_at(&json, author_pointer),
            artwork_url,
            uri: string_at(&json, "/link"),
        }))
    }

    async fn artist(&self, id: &str) -> Res<LoadResult> {
        let Some(json) = self.get_json(&format!("/artist/{id}"), &[]).await? else {
            return Ok(LoadResult::NotFound);
        };
        let top = self
            .get_json(
                &format!("/artist/{id}/top"),
                &[("limit", TOP_TRACKS_LIMIT.to_string())],
            )
            .await?
            .unwrap_or(Value::Null);

        let tracks = Self::parse_tracks(top.get("data"), None);
        if tracks.is_empty() {
            return Ok(LoadResult::NotFound);
        }
        let author = string_at(&json, "/name").unwrap_or_else(|| tracks[0].author.clone());

        Ok(LoadResult::Collection(CollectionDescriptor {
            source: SOURCE_NAME.to_string(),
            title: format!("{author}'s Top Tracks"),
            kind: CollectionKind::ArtistTopTracks,
            tracks,
            author: Some(author),
            artwork_url: string_at(&json, "/picture_xl"),
            uri: string_at(&json, "/link"),
        }))
    }

    async fn track_page(
        &self,
        path: String,
        page: PageRequest,
        fallback_artwork: Option<String>,
    ) -> Res<Page> {
        let params = [
            ("limit", page.limit.to_string()),
            ("index", page.offset.to_string()),
        ];
        let json = self
            .get_json(&path, &params)
            .await?
            .ok_or_else(|| SourceError::parse(format!("deezer page {path} disappeared")))?;
        let data = json
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| SourceError::parse(format!("deezer page {path} has no data")))?;

        let items = data
            .iter()
            .filter_map(|value| {
                let parsed = Self::parse_track(value, fallback_artwork.as_deref());
                if parsed.is_none() {
                    debug!(path = %path, "skipping malformed deezer item");
                }
                parsed
            })
            .collect();

        Ok(Page {
            items,
            fetched: data.len(),
            has_next: has_next_marker(&json),
        })
    }

    fn parse_tracks(values: Option<&Value>, fallback_artwork: Option<&str>) -> Vec<TrackDescriptor> {
        values
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(|value| Self::parse_track(value, fallback_artwork))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn parse_track(value: &Value, fallback_artwork: Option<&str>) -> Option<TrackDescriptor> {
        let id = match value.get("id")? {
            Value::Number(n) => n.to_string(),
            Value::String(s) if !s.is_empty() => s.clone(),
            _ => return None,
        };
        Some(TrackDescriptor {
            source: SOURCE_NAME.to_string(),
            title: string_at(value, "/title").unwrap_or_default(),
            author: string_at(value, "/artist/name")
                .unwrap_or_else(|| "Unknown Artist".to_string()),
            duration_ms: value
                .get("duration")
                .and_then(Value::as_u64)
                .map(|secs| secs * 1000)
                .unwrap_or(0),
            is_playable: value.get("readable").and_then(Value::as_bool) != Some(false),
            uri: string_at(value, "/link"),
            artwork_url: str_at(value, "/album/cover_xl")
                .or(fallback_artwork)
                .map(str::to_string),
            isrc: string_at(value, "/isrc"),
            identifier: id,
        })
    }
}

#[async_trait]
impl CatalogClient for DeezerClient {
    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn parse_reference(&self, identifier: &str) -> Option<Reference> {
        if let Some(query) = identifier.strip_prefix(SEARCH_PREFIX) {
            return Some(Reference::Search(query.trim().to_string()));
        }
        if let Some(isrc) = identifier.strip_prefix(ISRC_PREFIX) {
            return Some(Reference::Isrc(isrc.trim().to_string()));
        }

        let url = parse_web_url(identifier, "deezer.com")?;
        let segments = path_segments(&url);
        // [<lang>/]<type>/<id>
        let (kind, id) = match segments.as_slice() {
            [kind, id] => (*kind, *id),
            [_lang, kind, id] => (*kind, *id),
            _ => return None,
        };
        if !is_identifier(id, &[]) {
            return None;
        }
        let id = id.to_string();

        match kind {
            "track" => Some(Reference::Track { id, country: None }),
            "album" => Some(Reference::Album {
                id,
                item: None,
                country: None,
            }),
            "playlist" => Some(Reference::Playlist { id, country: None }),
            "artist" => Some(Reference::Artist { id, country: None }),
            _ => None,
        }
    }

    async fn load(&self, reference: &Reference) -> Res<LoadResult> {
        match reference {
            Reference::Search(query) => self.search(query).await,
            Reference::Isrc(isrc) if isrc.is_empty() => Ok(LoadResult::NotFound),
            Reference::Isrc(isrc) => self.track(&format!("/track/isrc:{isrc}")).await,
            Reference::Track { id, .. } => self.track(&format!("/track/{id}")).await,
            Reference::Album { id, .. } => self.collection(CollectionKind::Album, id).await,
            Reference::Playlist { id, .. } => {
                self.collection(CollectionKind::Playlist, id).await
            }
            Reference::Artist { id, .. } => self.artist(id).await,
            Reference::Recommendations(_) | Reference::Speech(_) => Ok(LoadResult::NotAReference),
        }
    }
}
