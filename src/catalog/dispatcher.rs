use std::sync::Arc;

use tracing::{debug, info};

use super::{AppleMusicClient, CatalogClient, DeezerClient, FloweryTtsClient, SpotifyClient};
use crate::{
    Res,
    config::SourcesConfig,
    error::SourceError,
    http::HttpTransport,
    types::{LoadResult, Reference, TrackDescriptor},
};

/// Provider-neutral search prefix, routed to the default search source.
pub const SEARCH_PREFIX: &str = "search:";

/// Tries registered catalog clients in registration order until one
/// recognizes an identifier.
#[derive(Default)]
pub struct CatalogDispatcher {
    clients: Vec<Arc<dyn CatalogClient>>,
    default_search_source: Option<String>,
}

impl CatalogDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every provider the configuration has credentials for:
    /// Spotify, then Apple Music, then Deezer, then FloweryTTS.
    pub fn from_config(config: &SourcesConfig, http: Arc<dyn HttpTransport>) -> Res<Self> {
        let mut dispatcher = Self::new();
        if let Some(spotify) = &config.spotify {
            dispatcher.register(Arc::new(SpotifyClient::new(spotify, http.clone())));
        }
        if let Some(apple_music) = &config.apple_music {
            dispatcher.register(Arc::new(AppleMusicClient::new(apple_music, http.clone())?));
        }
        if config.deezer_enabled {
            let deezer = DeezerClient::new(http).with_page_limit(config.deezer_page_limit);
            dispatcher.register(Arc::new(deezer));
        }
        if let Some(flowery_tts) = &config.flowery_tts {
            dispatcher.register(Arc::new(FloweryTtsClient::new(flowery_tts)));
        }

        if let Some(source) = &config.default_search_source {
            if dispatcher.client(source).is_none() {
                return Err(SourceError::Config(format!(
                    "default search source {source} is not registered"
                )));
            }
            dispatcher.default_search_source = Some(source.clone());
        }

        info!(
            sources = ?dispatcher.source_names(),
            "catalog dispatcher ready"
        );
        Ok(dispatcher)
    }

    pub fn with_default_search_source(mut self, source: &str) -> Self {
        self.default_search_source = Some(source.to_string());
        self
    }

    pub fn register(&mut self, client: Arc<dyn CatalogClient>) {
        self.clients.push(client);
    }

    pub fn client(&self, source: &str) -> Option<Arc<dyn CatalogClient>> {
        self.clients
            .iter()
            .find(|client| client.source_name() == source)
            .cloned()
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.clients.iter().map(|c| c.source_name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    fn search_client(&self) -> Option<Arc<dyn CatalogClient>> {
        match &self.default_search_source {
            Some(source) => self.client(source),
            None => self.clients.first().cloned(),
        }
    }

    /// Resolves an identifier against the first client whose grammar
    /// recognizes it.
    ///
    /// No network call happens before a grammar matched. `NotAReference`
    /// means no registered client understood the identifier.
    pub async fn resolve(&self, identifier: &str) -> Res<LoadResult> {
        let identifier = identifier.trim();

        if let Some(query) = identifier.strip_prefix(SEARCH_PREFIX) {
            let Some(client) = self.search_client() else {
                return Ok(LoadResult::NotAReference);
            };
            debug!(source = client.source_name(), query, "routing generic search");
            return client.load(&Reference::Search(query.trim().to_string())).await;
        }

        for client in &self.clients {
            if let Some(reference) = client.parse_reference(identifier) {
                debug!(source = client.source_name(), identifier, "identifier recognized");
                let result = client.load(&reference).await?;
                if result != LoadResult::NotAReference {
                    return Ok(result);
                }
            }
        }
        Ok(LoadResult::NotAReference)
    }

    /// Loads one track by source tag and native id.
    pub async fn load_track(&self, source: &str, id: &str) -> Res<Option<TrackDescriptor>> {
        let client = self
            .client(source)
            .ok_or_else(|| SourceError::UnknownSource(source.to_string()))?;
        client.load_track(id).await
    }
}
