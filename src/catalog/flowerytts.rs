use async_trait::async_trait;
use reqwest::Url;
use tracing::debug;

use super::CatalogClient;
use crate::{
    Res,
    config::{self, FloweryTtsConfig},
    error::SourceError,
    types::{LoadResult, Reference, SpeechRequest, TrackDescriptor},
};

pub const SOURCE_NAME: &str = "flowerytts";
pub const TTS_PREFIX: &str = "tts://";
pub const API_BASE: &str = "https://api.flowery.pw/v1/tts";
const AUTHOR: &str = "FloweryTTS";

/// Text-to-speech source: `tts://<text>?voice=&translate=&silence=&speed=`.
///
/// Nothing is fetched while loading. The descriptor's identifier is the
/// synthesis URL itself, so it is directly playable.
pub struct FloweryTtsClient {
    defaults: FloweryTtsConfig,
}

impl FloweryTtsClient {
    pub fn new(defaults: &FloweryTtsConfig) -> Self {
        Self {
            defaults: defaults.clone(),
        }
    }

    pub fn defaults(&self) -> &FloweryTtsConfig {
        &self.defaults
    }

    /// Resolves the per-request overrides against the configured defaults.
    /// Unknown parameters are ignored; unparsable values keep the default.
    fn speech_request(&self, text: String, overrides: &Url) -> SpeechRequest {
        let mut request = SpeechRequest {
            text,
            voice: self.defaults.voice.clone(),
            translate: self.defaults.translate,
            silence_ms: self.defaults.silence_ms,
            speed: self.defaults.speed,
        };

        for (key, value) in overrides.query_pairs() {
            let applied = match key.as_ref() {
                "voice" if !value.trim().is_empty() => {
                    request.voice = value.trim().to_string();
                    true
                }
                "translate" => config::parse_bool("translate", &value)
                    .map(|translate| request.translate = translate)
                    .is_ok(),
                "silence" => value
                    .parse()
                    .map(|silence| request.silence_ms = silence)
                    .is_ok(),
                "speed" => value
                    .parse::<f32>()
                    .ok()
                    .filter(|speed| speed.is_finite() && *speed > 0.0)
                    .map(|speed| request.speed = speed)
                    .is_some(),
                _ => continue,
            };
            if !applied {
                debug!(parameter = %key, value = %value, "ignoring invalid tts parameter");
            }
        }
        request
    }

    /// The synthesis URL for a request.
    pub fn request_url(request: &SpeechRequest) -> Res<Url> {
        Url::parse_with_params(
            API_BASE,
            &[
                ("text", request.text.clone()),
                ("voice", request.voice.clone()),
                ("translate", request.translate.to_string()),
                ("silence", request.silence_ms.to_string()),
                ("speed", request.speed.to_string()),
            ],
        )
        .map_err(|e| SourceError::parse(format!("invalid tts url: {e}")))
    }
}

#[async_trait]
impl CatalogClient for FloweryTtsClient {
    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn parse_reference(&self, identifier: &str) -> Option<Reference> {
        let rest = identifier.strip_prefix(TTS_PREFIX)?;
        let (raw_text, query) = rest.split_once('?').unwrap_or((rest, ""));

        // Both halves go through the URL parser so percent escapes decode
        // the same way; a literal '+' in the text stays a plus.
        let parsed = Url::parse(&format!(
            "tts://speech/?text={}&{query}",
            raw_text.replace('+', "%2B")
        ))
        .ok()?;
        let text = parsed
            .query_pairs()
            .find(|(key, _)| key == "text")
            .map(|(_, text)| text.trim().to_string())
            .filter(|text| !text.is_empty())?;

        Some(Reference::Speech(self.speech_request(text, &parsed)))
    }

    async fn load(&self, reference: &Reference) -> Res<LoadResult> {
        let Reference::Speech(request) = reference else {
            return Ok(LoadResult::NotAReference);
        };
        let url = Self::request_url(request)?.to_string();

        Ok(LoadResult::Track(TrackDescriptor {
            source: SOURCE_NAME.to_string(),
            title: request.text.clone(),
            author: AUTHOR.to_string(),
            duration_ms: 0,
            identifier: url.clone(),
            is_playable: true,
            uri: Some(url),
            artwork_url: None,
            isrc: None,
        }))
    }
}
