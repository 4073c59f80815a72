use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::{
    CatalogClient, Page, PageRequest, PagedCollectionFetcher, has_next_marker, is_identifier,
    parse_web_url, path_segments, str_at, string_at,
};
use crate::{
    Res,
    config::{DEFAULT_SPOTIFY_COUNTRY_CODE, SpotifyConfig},
    error::SourceError,
    http::{HttpRequest, HttpTransport},
    management::CredentialLease,
    types::{CollectionDescriptor, CollectionKind, LoadResult, Reference, SeedSet, TrackDescriptor},
    utils,
};

pub const SOURCE_NAME: &str = "spotify";
pub const SEARCH_PREFIX: &str = "spsearch:";
pub const RECOMMENDATIONS_PREFIX: &str = "sprec:";
pub const API_BASE: &str = "https://api.spotify.com/v1";
pub const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const PLAYLIST_MAX_PAGE_ITEMS: usize = 100;
pub const ALBUM_MAX_PAGE_ITEMS: usize = 50;
const SEARCH_LIMIT: usize = 20;

/// Spotify Web API catalog. Metadata only: every descriptor it produces
/// needs mirror resolution before playback.
pub struct SpotifyClient {
    http: Arc<dyn HttpTransport>,
    lease: Arc<CredentialLease>,
    country_code: String,
    playlist_page_limit: i64,
    album_page_limit: i64,
}

impl SpotifyClient {
    pub fn new(config: &SpotifyConfig, http: Arc<dyn HttpTransport>) -> Self {
        let lease = CredentialLease::client_credentials(
            SOURCE_NAME,
            &config.client_id,
            &config.client_secret,
            TOKEN_URL,
            Arc::clone(&http),
        );
        Self::with_lease(Arc::new(lease), http, &config.country_code)
            .with_page_limits(config.playlist_page_limit, config.album_page_limit)
    }

    pub fn with_lease(
        lease: Arc<CredentialLease>,
        http: Arc<dyn HttpTransport>,
        country_code: &str,
    ) -> Self {
        let country_code = match country_code.trim() {
            "" => DEFAULT_SPOTIFY_COUNTRY_CODE.to_string(),
            code => code.to_string(),
        };
        Self {
            http,
            lease,
            country_code,
            playlist_page_limit: 0,
            album_page_limit: 0,
        }
    }

    /// Page-count ceilings; 0 or negative means unbounded.
    pub fn with_page_limits(mut self, playlist_page_limit: i64, album_page_limit: i64) -> Self {
        self.playlist_page_limit = playlist_page_limit;
        self.album_page_limit = album_page_limit;
        self
    }

    pub fn lease(&self) -> &Arc<CredentialLease> {
        &self.lease
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Res<Option<Value>> {
        let token = self.lease.ensure_valid().await?;
        let mut request = HttpRequest::get(format!("{API_BASE}{path}"))
            .bearer_auth(&token)
            .query("market", &self.country_code);
        for (key, value) in query {
            request = request.query(key, value);
        }
        let response = self.http.execute(request).await;
        if let Err(SourceError::Transport {
            status: Some(401), ..
        }) = &response
        {
            warn!(path, "spotify rejected the access token");
            self.lease.invalidate(&token).await;
        }
        response
    }

    async fn search(&self, query: &str) -> Res<LoadResult> {
        if query.is_empty() {
            return Ok(LoadResult::NotFound);
        }
        let params = [
            ("q", query.to_string()),
            ("type", "track".to_string()),
            ("limit", SEARCH_LIMIT.to_string()),
        ];
        let Some(json) = self.get_json("/search", &params).await? else {
            return Ok(LoadResult::NotFound);
        };

        let tracks = Self::parse_tracks(json.pointer("/tracks/items"), None);
        if tracks.is_empty() {
            return Ok(LoadResult::NotFound);
        }
        Ok(LoadResult::Collection(CollectionDescriptor {
            source: SOURCE_NAME.to_string(),
            title: format!("Search results for: {query}"),
            kind: CollectionKind::SearchResult,
            tracks,
            author: None,
            artwork_url: None,
            uri: None,
        }))
    }

    async fn recommendations(&self, seeds: &SeedSet) -> Res<LoadResult> {
        let params: Vec<(&str, String)> = [
            ("seed_artists", &seeds.artists),
            ("seed_tracks", &seeds.tracks),
            ("seed_genres", &seeds.genres),
        ]
        .into_iter()
        .filter(|(_, seed)| !seed.is_empty())
        .map(|(key, seed)| (key, seed.clone()))
        .collect();
        if params.is_empty() {
            return Ok(LoadResult::NotFound);
        }

        let Some(json) = self.get_json("/recommendations", &params).await? else {
            return Ok(LoadResult::NotFound);
        };
        let tracks = Self::parse_tracks(json.get("tracks"), None);
        if tracks.is_empty() {
            return Ok(LoadResult::NotFound);
        }

        let label = params
            .iter()
            .map(|(_, seed)| seed.as_str())
            .collect::<Vec<_>>()
            .join("|");
        Ok(LoadResult::Collection(CollectionDescriptor {
            source: SOURCE_NAME.to_string(),
            title: format!("Recommendations for: {label}"),
            kind: CollectionKind::SearchResult,
            tracks,
            author: None,
            artwork_url: None,
            uri: None,
        }))
    }

    async fn track(&self, id: &str) -> Res<LoadResult> {
        let Some(json) = self.get_json(&format!("/tracks/{id}"), &[]).await? else {
            return Ok(LoadResult::NotFound);
        };
        Self::parse_track(&json, None)
            .map(LoadResult::Track)
            .ok_or_else(|| SourceError::parse(format!("spotify track {id} has no id")))
    }

    async fn album(&self, id: &str) -> Res<LoadResult> {
        let Some(album) = self.get_json(&format!("/albums/{id}"), &[]).await? else {
            return Ok(LoadResult::NotFound);
        };
        let artwork_url = string_at(&album, "/images/0/url");

        let fetcher = PagedCollectionFetcher::new(ALBUM_MAX_PAGE_ITEMS, self.album_page_limit);
        let path = format!("/albums/{id}/tracks");
        let fallback = artwork_url.clone();
        let tracks = fetcher
            .fetch(move |page| self.track_page(path.clone(), page, fallback.clone()))
            .await?;

        Ok(LoadResult::Collection(CollectionDescriptor {
            source: SOURCE_NAME.to_string(),
            title: string_at(&album, "/name").unwrap_or_default(),
            kind: CollectionKind::Album,
            tracks,
            author: string_at(&album, "/artists/0/name"),
            artwork_url,
            uri: string_at(&album, "/external_urls/spotify"),
        }))
    }

    async fn playlist(&self, id: &str) -> Res<LoadResult> {
        let Some(playlist) = self.get_json(&format!("/playlists/{id}"), &[]).await? else {
            return Ok(LoadResult::NotFound);
        };

        let fetcher =
            PagedCollectionFetcher::new(PLAYLIST_MAX_PAGE_ITEMS, self.playlist_page_limit);
        let path = format!("/playlists/{id}/tracks");
        let tracks = fetcher
            .fetch(move |page| self.track_page(path.clone(), page, None))
            .await?;

        Ok(LoadResult::Collection(CollectionDescriptor {
            source: SOURCE_NAME.to_string(),
            title: string_at(&playlist, "/name").unwrap_or_default(),
            kind: CollectionKind::Playlist,
            tracks,
            author: string_at(&playlist, "/owner/display_name")
                .or_else(|| string_at(&playlist, "/owner/id")),
            artwork_url: string_at(&playlist, "/images/0/url"),
            uri: string_at(&playlist, "/external_urls/spotify"),
        }))
    }

    async fn artist(&self, id: &str) -> Res<LoadResult> {
        let Some(json) = self.get_json(&format!("/artists/{id}/top-tracks"), &[]).await? else {
            return Ok(LoadResult::NotFound);
        };
        let tracks = Self::parse_tracks(json.get("tracks"), None);
        let Some(first) = tracks.first() else {
            return Ok(LoadResult::NotFound);
        };

        let author = first.author.clone();
        Ok(LoadResult::Collection(CollectionDescriptor {
            source: SOURCE_NAME.to_string(),
            title: format!("{author}'s Top Tracks"),
            kind: CollectionKind::ArtistTopTracks,
            artwork_url: first.artwork_url.clone(),
            author: Some(author),
            uri: Some(format!("https://open.spotify.com/artist/{id}")),
            tracks,
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
            ("offset", page.offset.to_string()),
        ];
        let json = self
            .get_json(&path, &params)
            .await?
            .ok_or_else(|| SourceError::parse(format!("spotify page {path} disappeared")))?;
        let items = json
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| SourceError::parse(format!("spotify page {path} has no items")))?;

        let tracks = items
            .iter()
            .filter_map(|item| {
                // playlist entries wrap the track, album entries are the track
                let track = match item.get("track") {
                    Some(track) => track,
                    None => item,
                };
                let parsed = Self::parse_track(track, fallback_artwork.as_deref());
                if parsed.is_none() {
                    debug!(path = %path, "skipping unplayable or malformed spotify item");
                }
                parsed
            })
            .collect();

        Ok(Page {
            items: tracks,
            fetched: items.len(),
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

    /// Track object to descriptor. Entries without an id (local files,
    /// removed tracks) are rejected.
    pub fn parse_track(value: &Value, fallback_artwork: Option<&str>) -> Option<TrackDescriptor> {
        let id = str_at(value, "/id")?.to_string();
        Some(TrackDescriptor {
            source: SOURCE_NAME.to_string(),
            title: string_at(value, "/name").unwrap_or_default(),
            author: string_at(value, "/artists/0/name")
                .unwrap_or_else(|| "Unknown Artist".to_string()),
            duration_ms: value
                .get("duration_ms")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            is_playable: false,
            uri: string_at(value, "/external_urls/spotify")
                .or_else(|| Some(format!("https://open.spotify.com/track/{id}"))),
            artwork_url: string_at(value, "/album/images/0/url")
                .or_else(|| fallback_artwork.map(str::to_string)),
            isrc: string_at(value, "/external_ids/isrc"),
            identifier: id,
        })
    }

    fn reference_for(kind: &str, id: &str) -> Option<Reference> {
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
}

#[async_trait]
impl CatalogClient for SpotifyClient {
    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn parse_reference(&self, identifier: &str) -> Option<Reference> {
        if let Some(query) = identifier.strip_prefix(SEARCH_PREFIX) {
            return Some(Reference::Search(query.trim().to_string()));
        }
        if let Some(query) = identifier.strip_prefix(RECOMMENDATIONS_PREFIX) {
            return Some(Reference::Recommendations(utils::parse_seeds(query.trim())));
        }
        if let Some(uri) = identifier.strip_prefix("spotify:") {
            let (kind, id) = uri.split_once(':')?;
            return Self::reference_for(kind, id);
        }

        let url = parse_web_url(identifier, "open.spotify.com")?;
        let mut segments = path_segments(&url).into_iter().peekable();
        if segments.peek().is_some_and(|s| s.starts_with("intl-")) {
            segments.next();
        }
        if segments.peek() == Some(&"user") {
            segments.next();
            segments.next();
        }
        let kind = segments.next()?;
        let id = segments.next()?;
        Self::reference_for(kind, id)
    }

    async fn load(&self, reference: &Reference) -> Res<LoadResult> {
        match reference {
            Reference::Search(query) => self.search(query).await,
            Reference::Recommendations(seeds) => self.recommendations(seeds).await,
            Reference::Track { id, .. } => self.track(id).await,
            Reference::Album { id, item, .. } => match item {
                Some(item) => self.track(item).await,
                None => self.album(id).await,
            },
            Reference::Playlist { id, .. } => self.playlist(id).await,
            Reference::Artist { id, .. } => self.artist(id).await,
            Reference::Isrc(_) | Reference::Speech(_) => Ok(LoadResult::NotAReference),
        }
    }
}
