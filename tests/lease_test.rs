mod common;

use std::{sync::Arc, time::Duration};

use chrono::{Duration as ChronoDuration, Utc};
use common::FakeTransport;
use mirrorsrc::{
    error::SourceError,
    http::{HttpMethod, HttpTransport},
    management::CredentialLease,
};

const TOKEN_URL: &str = "https://accounts.example.com/api/token";

fn lease_over(transport: Arc<FakeTransport>) -> CredentialLease {
    let http: Arc<dyn HttpTransport> = transport;
    CredentialLease::client_credentials("spotify", "client-id", "client-secret", TOKEN_URL, http)
}

#[tokio::test]
async fn test_first_use_requests_a_token() {
    let transport = FakeTransport::new(|_| Ok(Some(common::token_response("fresh", 3600)))).shared();
    let lease = lease_over(transport.clone());

    assert!(!lease.valid().await);
    assert_eq!(lease.ensure_valid().await.unwrap(), "fresh");
    assert!(lease.valid().await);

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(request.url, TOKEN_URL);
    // base64("client-id:client-secret")
    assert_eq!(
        request.header_value("authorization"),
        Some("Basic Y2xpZW50LWlkOmNsaWVudC1zZWNyZXQ=")
    );
    assert_eq!(
        request.form,
        vec![("grant_type".to_string(), "client_credentials".to_string())]
    );
}

#[tokio::test]
async fn test_valid_token_is_reused() {
    let transport = FakeTransport::new(|_| Ok(Some(common::token_response("fresh", 3600)))).shared();
    let lease = lease_over(transport.clone());

    lease.ensure_valid().await.unwrap();
    lease.ensure_valid().await.unwrap();
    lease.ensure_valid().await.unwrap();

    assert_eq!(transport.calls(), 1);
    assert_eq!(lease.refresh_count(), 1);
}

#[tokio::test]
async fn test_expired_token_refreshes_exactly_once() {
    let transport = FakeTransport::new(|_| Ok(Some(common::token_response("renewed", 3600)))).shared();
    let lease = lease_over(transport.clone())
        .with_token("stale", Utc::now() - ChronoDuration::seconds(1));

    assert!(!lease.valid().await);
    assert_eq!(lease.ensure_valid().await.unwrap(), "renewed");
    assert_eq!(lease.ensure_valid().await.unwrap(), "renewed");
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_expiry_is_now_plus_lifetime() {
    let transport = FakeTransport::new(|_| Ok(Some(common::token_response("fresh", 120)))).shared();
    let lease = lease_over(transport);

    let before = Utc::now();
    lease.ensure_valid().await.unwrap();
    let expires_at = lease.expires_at().await.unwrap();

    assert!(expires_at >= before + ChronoDuration::seconds(120));
    assert!(expires_at <= Utc::now() + ChronoDuration::seconds(120));
}

#[tokio::test]
async fn test_missing_lifetime_defaults_to_an_hour() {
    let transport = FakeTransport::new(|_| Ok(Some(serde_json::json!({ "access_token": "fresh" }))))
        .shared();
    let lease = lease_over(transport);

    lease.ensure_valid().await.unwrap();
    let remaining = lease.expires_at().await.unwrap() - Utc::now();
    assert!(remaining > ChronoDuration::minutes(59));
}

#[tokio::test]
async fn test_concurrent_callers_share_one_refresh() {
    let transport = FakeTransport::new(|_| Ok(Some(common::token_response("shared", 3600))))
        .with_delay(Duration::from_millis(50))
        .shared();
    let lease = Arc::new(lease_over(transport.clone()));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let lease = lease.clone();
        tasks.push(tokio::spawn(async move { lease.ensure_valid().await }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), "shared");
    }

    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_failed_refresh_installs_nothing() {
    let transport = FakeTransport::new(|_| {
        Err(SourceError::Transport {
            status: Some(503),
            message: "unavailable".to_string(),
        })
    })
    .shared();
    let lease = lease_over(transport.clone());

    let err = lease.ensure_valid().await.unwrap_err();
    assert!(matches!(err, SourceError::Transport { status: Some(503), .. }));
    assert!(!lease.valid().await);
    assert_eq!(lease.expires_at().await, None);

    // No automatic retry; the next call tries again
    assert!(lease.ensure_valid().await.is_err());
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_cancelled_refresh_leaves_the_lease_untouched() {
    let transport = FakeTransport::new(|_| Ok(Some(common::token_response("slow", 3600))))
        .with_delay(Duration::from_millis(200))
        .shared();
    let lease = lease_over(transport.clone())
        .with_token("stale", Utc::now() - ChronoDuration::seconds(1));

    let outcome = tokio::time::timeout(Duration::from_millis(20), lease.ensure_valid()).await;
    assert!(outcome.is_err());
    assert!(!lease.valid().await);

    // The lease is still usable afterwards
    assert_eq!(lease.ensure_valid().await.unwrap(), "slow");
}

#[tokio::test]
async fn test_malformed_token_response_is_a_parse_error() {
    let transport = FakeTransport::new(|_| Ok(Some(serde_json::json!({ "error": "invalid_client" }))))
        .shared();
    let lease = lease_over(transport);

    assert!(matches!(
        lease.ensure_valid().await,
        Err(SourceError::Parse(_))
    ));
}

#[tokio::test]
async fn test_invalidate_only_drops_the_stale_token() {
    let tokens = std::sync::Mutex::new(vec!["second", "first"]);
    let transport = FakeTransport::new(move |_| {
        let token = tokens.lock().unwrap().pop().unwrap();
        Ok(Some(common::token_response(token, 3600)))
    })
    .shared();
    let lease = lease_over(transport.clone());

    assert_eq!(lease.ensure_valid().await.unwrap(), "first");

    // A rejection of some other token has no effect
    lease.invalidate("unrelated").await;
    assert_eq!(lease.ensure_valid().await.unwrap(), "first");

    lease.invalidate("first").await;
    assert_eq!(lease.ensure_valid().await.unwrap(), "second");
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_signed_token_reads_its_expiry() {
    let exp = (Utc::now() + ChronoDuration::days(30)).timestamp();
    let token = common::signed_token(exp, None);
    let lease = CredentialLease::signed("applemusic", &token).unwrap();

    assert!(!lease.is_refreshable());
    assert_eq!(lease.expires_at().await.unwrap().timestamp(), exp);
    assert_eq!(lease.ensure_valid().await.unwrap(), token);
    // Forcing a refresh of a valid signed token hands the same token back
    assert_eq!(lease.refresh().await.unwrap(), token);
    assert_eq!(lease.refresh_count(), 0);
}

#[tokio::test]
async fn test_expired_signed_token_fails_fast() {
    let exp = (Utc::now() - ChronoDuration::minutes(5)).timestamp();
    let lease = CredentialLease::signed("applemusic", &common::signed_token(exp, None)).unwrap();

    assert!(!lease.valid().await);
    match lease.ensure_valid().await {
        Err(SourceError::TokenExpired { provider }) => assert_eq!(provider, "applemusic"),
        other => panic!("expected TokenExpired, got {other:?}"),
    }
    assert!(matches!(
        lease.refresh().await,
        Err(SourceError::TokenExpired { .. })
    ));
    assert_eq!(lease.refresh_count(), 0);
}

#[test]
fn test_signed_token_without_exp_is_rejected() {
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

    let claims = URL_SAFE_NO_PAD.encode(r#"{"iss":"TEAMID"}"#);
    let token = format!("header.{claims}.signature");

    assert!(matches!(
        CredentialLease::signed("applemusic", &token),
        Err(SourceError::Parse(_))
    ));
}
