//! Configuration management for the catalog sources.
//!
//! Values come from process environment variables, optionally seeded from a
//! `.env` file in the local data directory. Precedence:
//! 1. Environment variables (highest priority)
//! 2. `.env` file in the local data directory
//! 3. Built-in defaults
//!
//! A provider whose credentials are absent is simply not configured; a
//! provider with half of its credentials, or any unparsable number, is a
//! [`SourceError::Config`].

use std::{env, path::PathBuf, str::FromStr, time::Duration};

use tracing::debug;

use crate::{Res, error::SourceError};

/// Mirror templates tried when `MIRRORSRC_MIRROR_PROVIDERS` is not set.
pub const DEFAULT_MIRROR_PROVIDERS: &[&str] = &["dzisrc:%ISRC%", "dzsearch:%QUERY%"];
pub const DEFAULT_DURATION_TOLERANCE_MS: u64 = 7_000;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SPOTIFY_COUNTRY_CODE: &str = "US";
pub const DEFAULT_APPLEMUSIC_COUNTRY_CODE: &str = "us";
pub const DEFAULT_FLOWERYTTS_SPEED: f32 = 1.0;

/// Loads environment variables from a `.env` file in the local data directory.
///
/// The file is looked up under `mirrorsrc/.env` in the platform-specific
/// local data directory:
/// - Linux: `~/.local/share/mirrorsrc/.env`
/// - macOS: `~/Library/Application Support/mirrorsrc/.env`
/// - Windows: `%LOCALAPPDATA%/mirrorsrc/.env`
///
/// A missing file is not an error; variables already present in the process
/// environment are never overwritten.
///
/// # Errors
///
/// Returns [`SourceError::Config`] if the file exists but cannot be parsed.
pub fn load_env() -> Res<()> {
    let path = env_path();
    if !path.is_file() {
        debug!(path = %path.display(), "no .env file, using process environment only");
        return Ok(());
    }

    dotenv::from_path(&path)
        .map_err(|e| SourceError::Config(format!("failed to load {}: {}", path.display(), e)))
}

/// Path of the `.env` file read by [`load_env`].
pub fn env_path() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("mirrorsrc/.env");
    path
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub country_code: String,
    /// Page-count ceiling for playlists; 0 or negative means unbounded.
    pub playlist_page_limit: i64,
    /// Page-count ceiling for albums; 0 or negative means unbounded.
    pub album_page_limit: i64,
}

/// How the Apple Music media API token is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppleMusicCredential {
    /// A token signed elsewhere, used until it expires.
    MediaApiToken(String),
    /// A MusicKit private key (PKCS#8 PEM) the token is minted from.
    MusicKitKey {
        private_key: String,
        key_id: String,
        team_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppleMusicConfig {
    pub credential: AppleMusicCredential,
    pub country_code: String,
    pub playlist_page_limit: i64,
    pub album_page_limit: i64,
}

/// Default voice settings of the text-to-speech source.
#[derive(Debug, Clone, PartialEq)]
pub struct FloweryTtsConfig {
    pub voice: String,
    pub translate: bool,
    pub silence_ms: u32,
    pub speed: f32,
}

/// Everything the core consumes from its host.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcesConfig {
    pub spotify: Option<SpotifyConfig>,
    pub apple_music: Option<AppleMusicConfig>,
    pub deezer_enabled: bool,
    /// Page-count ceiling for Deezer albums and playlists.
    pub deezer_page_limit: i64,
    /// Registered only when a default voice is configured.
    pub flowery_tts: Option<FloweryTtsConfig>,
    /// Mirror templates in priority order.
    pub mirror_providers: Vec<String>,
    pub duration_tolerance_ms: u64,
    /// Source answering the generic `search:` prefix.
    pub default_search_source: Option<String>,
    pub http_timeout: Duration,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            spotify: None,
            apple_music: None,
            deezer_enabled: true,
            deezer_page_limit: 0,
            flowery_tts: None,
            mirror_providers: DEFAULT_MIRROR_PROVIDERS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            duration_tolerance_ms: DEFAULT_DURATION_TOLERANCE_MS,
            default_search_source: None,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl SourcesConfig {
    /// Reads the configuration from the process environment.
    ///
    /// Call [`load_env`] first to pick up the `.env` file.
    pub fn from_env() -> Res<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Res<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let number = |key: &str| -> Res<Option<i64>> { parse_number(key, get(key)) };

        let spotify = match (
            get("MIRRORSRC_SPOTIFY_CLIENT_ID"),
            get("MIRRORSRC_SPOTIFY_CLIENT_SECRET"),
        ) {
            (Some(client_id), Some(client_secret)) => Some(SpotifyConfig {
                client_id,
                client_secret,
                country_code: get("MIRRORSRC_SPOTIFY_COUNTRY_CODE")
                    .unwrap_or_else(|| DEFAULT_SPOTIFY_COUNTRY_CODE.to_string()),
                playlist_page_limit: number("MIRRORSRC_SPOTIFY_PLAYLIST_PAGE_LIMIT")?
                    .unwrap_or(0),
                album_page_limit: number("MIRRORSRC_SPOTIFY_ALBUM_PAGE_LIMIT")?.unwrap_or(0),
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(SourceError::Config(
                    "MIRRORSRC_SPOTIFY_CLIENT_SECRET must be set when a client id is given"
                        .to_string(),
                ));
            }
            (None, Some(_)) => {
                return Err(SourceError::Config(
                    "MIRRORSRC_SPOTIFY_CLIENT_ID must be set when a client secret is given"
                        .to_string(),
                ));
            }
        };

        let apple_credential = match (
            get("MIRRORSRC_APPLEMUSIC_MEDIA_API_TOKEN"),
            get("MIRRORSRC_APPLEMUSIC_MUSICKIT_KEY"),
            get("MIRRORSRC_APPLEMUSIC_KEY_ID"),
            get("MIRRORSRC_APPLEMUSIC_TEAM_ID"),
        ) {
            (Some(token), ..) => Some(AppleMusicCredential::MediaApiToken(token)),
            (None, Some(private_key), Some(key_id), Some(team_id)) => {
                Some(AppleMusicCredential::MusicKitKey {
                    private_key,
                    key_id,
                    team_id,
                })
            }
            (None, None, None, None) => None,
            (None, ..) => {
                return Err(SourceError::Config(
                    "MIRRORSRC_APPLEMUSIC_MUSICKIT_KEY, MIRRORSRC_APPLEMUSIC_KEY_ID and \
                     MIRRORSRC_APPLEMUSIC_TEAM_ID must be set together"
                        .to_string(),
                ));
            }
        };
        let apple_music = match apple_credential {
            Some(credential) => Some(AppleMusicConfig {
                credential,
                country_code: get("MIRRORSRC_APPLEMUSIC_COUNTRY_CODE")
                    .unwrap_or_else(|| DEFAULT_APPLEMUSIC_COUNTRY_CODE.to_string()),
                playlist_page_limit: number("MIRRORSRC_APPLEMUSIC_PLAYLIST_PAGE_LIMIT")?
                    .unwrap_or(0),
                album_page_limit: number("MIRRORSRC_APPLEMUSIC_ALBUM_PAGE_LIMIT")?.unwrap_or(0),
            }),
            None => None,
        };

        let deezer_enabled = match get("MIRRORSRC_DEEZER_ENABLED") {
            Some(value) => parse_bool("MIRRORSRC_DEEZER_ENABLED", &value)?,
            None => true,
        };
        let deezer_page_limit = number("MIRRORSRC_DEEZER_PAGE_LIMIT")?.unwrap_or(0);

        let flowery_tts = match get("MIRRORSRC_FLOWERYTTS_VOICE") {
            Some(voice) => {
                let speed = parse_number(
                    "MIRRORSRC_FLOWERYTTS_SPEED",
                    get("MIRRORSRC_FLOWERYTTS_SPEED"),
                )?
                .unwrap_or(DEFAULT_FLOWERYTTS_SPEED);
                if !(speed.is_finite() && speed > 0.0) {
                    return Err(SourceError::Config(format!(
                        "MIRRORSRC_FLOWERYTTS_SPEED must be positive, got {speed}"
                    )));
                }
                Some(FloweryTtsConfig {
                    voice,
                    translate: match get("MIRRORSRC_FLOWERYTTS_TRANSLATE") {
                        Some(value) => parse_bool("MIRRORSRC_FLOWERYTTS_TRANSLATE", &value)?,
                        None => false,
                    },
                    silence_ms: parse_number(
                        "MIRRORSRC_FLOWERYTTS_SILENCE",
                        get("MIRRORSRC_FLOWERYTTS_SILENCE"),
                    )?
                    .unwrap_or(0),
                    speed,
                })
            }
            None => None,
        };

        let mut mirror_providers = parse_list(get("MIRRORSRC_MIRROR_PROVIDERS"));
        if mirror_providers.is_empty() {
            mirror_providers = DEFAULT_MIRROR_PROVIDERS
                .iter()
                .map(|p| p.to_string())
                .collect();
        }

        let duration_tolerance_ms = parse_number(
            "MIRRORSRC_MIRROR_DURATION_TOLERANCE_MS",
            get("MIRRORSRC_MIRROR_DURATION_TOLERANCE_MS"),
        )?
        .unwrap_or(DEFAULT_DURATION_TOLERANCE_MS);

        let http_timeout = Duration::from_secs(
            parse_number(
                "MIRRORSRC_HTTP_TIMEOUT_SECS",
                get("MIRRORSRC_HTTP_TIMEOUT_SECS"),
            )?
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
        );

        Ok(Self {
            spotify,
            apple_music,
            deezer_enabled,
            deezer_page_limit,
            flowery_tts,
            mirror_providers,
            duration_tolerance_ms,
            default_search_source: get("MIRRORSRC_DEFAULT_SEARCH_SOURCE")
                .map(|s| s.to_lowercase()),
            http_timeout,
        })
    }
}

fn parse_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_number<T>(key: &str, value: Option<String>) -> Res<Option<T>>
where
    T: FromStr,
{
    match value {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| SourceError::Config(format!("{key} must be a number, got \"{raw}\""))),
        None => Ok(None),
    }
}

pub(crate) fn parse_bool(key: &str, value: &str) -> Res<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SourceError::Config(format!(
            "{key} must be a boolean, got \"{value}\""
        ))),
    }
}
