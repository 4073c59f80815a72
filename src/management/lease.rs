use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    Res,
    error::SourceError,
    http::{HttpRequest, HttpTransport},
    utils,
};

/// Lifetime assumed when a token endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct LeaseToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

enum LeaseStrategy {
    /// Client id/secret exchanged for a bearer token at the token endpoint.
    ClientCredentials {
        client_id: String,
        client_secret: String,
        token_url: String,
        http: Arc<dyn HttpTransport>,
    },
    /// Token issued out of band; its own `exp` claim is authoritative.
    Signed,
}

/// Bearer credential of one catalog provider plus its expiry.
///
/// Shared by every request to the provider. The token is only ever handed
/// out while `now < expires_at`; refreshes are serialized so concurrent
/// callers of an expired lease wait on a single token request instead of
/// issuing their own. A refresh that is cancelled mid-flight leaves the
/// previous state untouched.
pub struct CredentialLease {
    provider: String,
    strategy: LeaseStrategy,
    current: Mutex<Option<LeaseToken>>,
    refreshes: AtomicU64,
}

impl CredentialLease {
    /// Lease backed by a client-credential exchange. The first token is
    /// requested lazily on first use.
    pub fn client_credentials(
        provider: &str,
        client_id: &str,
        client_secret: &str,
        token_url: &str,
        http: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            provider: provider.to_string(),
            strategy: LeaseStrategy::ClientCredentials {
                client_id: client_id.to_string(),
                client_secret: client_secret.to_string(),
                token_url: token_url.to_string(),
                http,
            },
            current: Mutex::new(None),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Lease over a pre-signed JWT whose expiry is read from its `exp` claim.
    ///
    /// An already expired token is accepted here; it fails on first use.
    pub fn signed(provider: &str, token: &str) -> Res<Self> {
        let claims = utils::decode_jwt_claims(token)?;
        let exp = claims
            .get("exp")
            .and_then(|exp| exp.as_i64())
            .ok_or_else(|| SourceError::parse(format!("{provider} token has no exp claim")))?;
        let expires_at = DateTime::from_timestamp(exp, 0)
            .ok_or_else(|| SourceError::parse(format!("{provider} token exp is out of range")))?;

        if expires_at <= Utc::now() {
            warn!(provider, %expires_at, "signed token is already expired");
        }

        Ok(Self {
            provider: provider.to_string(),
            strategy: LeaseStrategy::Signed,
            current: Mutex::new(Some(LeaseToken {
                access_token: token.to_string(),
                expires_at,
            })),
            refreshes: AtomicU64::new(0),
        })
    }

    /// Seeds the lease with a known token, e.g. one restored from a cache.
    pub fn with_token(self, access_token: &str, expires_at: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(Some(LeaseToken {
                access_token: access_token.to_string(),
                expires_at,
            })),
            ..self
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn is_refreshable(&self) -> bool {
        matches!(self.strategy, LeaseStrategy::ClientCredentials { .. })
    }

    /// Number of token requests issued so far.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Whether a token is held and not yet expired.
    pub async fn valid(&self) -> bool {
        let current = self.current.lock().await;
        current
            .as_ref()
            .is_some_and(|token| Utc::now() < token.expires_at)
    }

    pub async fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.current.lock().await.as_ref().map(|t| t.expires_at)
    }

    /// Returns a token that is valid right now, refreshing first if needed.
    ///
    /// # Errors
    ///
    /// - [`SourceError::TokenExpired`] for an expired signed token; no
    ///   network request is made.
    /// - Transport or parse errors of the token request.
    pub async fn ensure_valid(&self) -> Res<String> {
        let mut current = self.current.lock().await;
        if let Some(token) = current.as_ref() {
            if Utc::now() < token.expires_at {
                return Ok(token.access_token.clone());
            }
            debug!(provider = %self.provider, "credential expired");
        }

        let fresh = self.request_token().await?;
        let access_token = fresh.access_token.clone();
        *current = Some(fresh);
        Ok(access_token)
    }

    /// Forces a new token regardless of the current expiry.
    pub async fn refresh(&self) -> Res<String> {
        let mut current = self.current.lock().await;
        if let (LeaseStrategy::Signed, Some(token)) = (&self.strategy, current.as_ref()) {
            if Utc::now() < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.request_token().await?;
        let access_token = fresh.access_token.clone();
        *current = Some(fresh);
        Ok(access_token)
    }

    /// Marks `stale_token` as expired, e.g. after the provider rejected it.
    ///
    /// Only the token the caller actually used is invalidated, so several
    /// callers reporting the same rejection still cause a single refresh.
    pub async fn invalidate(&self, stale_token: &str) {
        if !self.is_refreshable() {
            return;
        }
        let mut current = self.current.lock().await;
        if current
            .as_ref()
            .is_some_and(|token| token.access_token == stale_token)
        {
            *current = None;
        }
    }

    async fn request_token(&self) -> Res<LeaseToken> {
        let LeaseStrategy::ClientCredentials {
            client_id,
            client_secret,
            token_url,
            http,
        } = &self.strategy
        else {
            return Err(SourceError::TokenExpired {
                provider: self.provider.clone(),
            });
        };

        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let request = HttpRequest::post(token_url.as_str())
            .basic_auth(client_id, client_secret)
            .form("grant_type", "client_credentials");

        let json = http.execute(request).await?.ok_or_else(|| {
            SourceError::parse(format!("{} token endpoint returned nothing", self.provider))
        })?;
        let response: TokenResponse = serde_json::from_value(json)?;
        let lifetime = response.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);

        info!(provider = %self.provider, lifetime, "acquired access token");
        Ok(LeaseToken {
            access_token: response.access_token,
            expires_at: Utc::now() + Duration::seconds(lifetime),
        })
    }
}
