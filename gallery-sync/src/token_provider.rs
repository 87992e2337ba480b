use gdrive_core::{OAuthError, ServiceAccountClient};
use thiserror::Error;

const REFRESH_FRACTION: f64 = 0.92;
const DEFAULT_TTL_SECS: u64 = 3600;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("service account credentials are not configured")]
    MissingCredentials,
    #[error("token exchange failed: {0}")]
    Exchange(#[from] OAuthError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub access_token: String,
    pub issued_at: i64,
    pub ttl_secs: u64,
}

impl CachedToken {
    /// Reusable until 92% of the lifetime has elapsed, so a request started
    /// with this token does not outlive it.
    pub fn is_fresh_at(&self, now: i64) -> bool {
        (now as f64) < self.issued_at as f64 + REFRESH_FRACTION * self.ttl_secs as f64
    }
}

/// Process-lifetime bearer token cache backed by the service-account grant.
pub struct TokenProvider {
    client: Option<ServiceAccountClient>,
    cached: Option<CachedToken>,
}

impl TokenProvider {
    pub fn new(client: Option<ServiceAccountClient>) -> Self {
        Self {
            client,
            cached: None,
        }
    }

    pub fn with_cached(mut self, token: CachedToken) -> Self {
        self.cached = Some(token);
        self
    }

    pub fn cached(&self) -> Option<&CachedToken> {
        self.cached.as_ref()
    }

    pub async fn valid_access_token(&mut self) -> Result<String, TokenError> {
        self.valid_access_token_at(now_unix()).await
    }

    pub async fn valid_access_token_at(&mut self, now: i64) -> Result<String, TokenError> {
        if let Some(cached) = self.cached.as_ref().filter(|c| c.is_fresh_at(now)) {
            return Ok(cached.access_token.clone());
        }
        let client = self
            .client
            .as_ref()
            .ok_or(TokenError::MissingCredentials)?;
        let token = client.exchange(now).await?;
        tracing::debug!(
            account = client.client_email(),
            expires_in = token.expires_in,
            "obtained access token"
        );
        let cached = CachedToken {
            access_token: token.access_token,
            issued_at: now,
            ttl_secs: token.expires_in.unwrap_or(DEFAULT_TTL_SECS),
        };
        let access_token = cached.access_token.clone();
        self.cached = Some(cached);
        Ok(access_token)
    }
}

fn now_unix() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdrive_core::ServiceAccountKey;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PEM: &str = include_str!("../tests/fixtures/service_account_key.pem");

    fn oauth_client(server: &MockServer) -> ServiceAccountClient {
        let key = ServiceAccountKey::from_env_parts("gallery@example.iam", PEM).unwrap();
        ServiceAccountClient::with_token_url(&format!("{}/token", server.uri()), key).unwrap()
    }

    fn cached(issued_at: i64) -> CachedToken {
        CachedToken {
            access_token: "token-1".into(),
            issued_at,
            ttl_secs: 3600,
        }
    }

    #[test]
    fn freshness_ends_at_ninety_two_percent_of_ttl() {
        let token = cached(1_000);
        assert!(token.is_fresh_at(1_000 + 3_311));
        assert!(!token.is_fresh_at(1_000 + 3_312));
    }

    #[tokio::test]
    async fn returns_cached_token_while_fresh() {
        let mut provider = TokenProvider::new(None).with_cached(cached(1_000));
        let token = provider.valid_access_token_at(2_000).await.unwrap();
        assert_eq!(token, "token-1");
    }

    #[tokio::test]
    async fn stale_token_without_credentials_is_not_reused() {
        let mut provider = TokenProvider::new(None).with_cached(cached(1_000));
        let err = provider
            .valid_access_token_at(1_000 + 3_312)
            .await
            .expect_err("expected missing credentials");
        assert!(matches!(err, TokenError::MissingCredentials));
    }

    #[tokio::test]
    async fn refreshes_stale_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("assertion="))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "token-2",
                "token_type": "Bearer",
                "expires_in": 1800
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut provider =
            TokenProvider::new(Some(oauth_client(&server))).with_cached(cached(1_000));
        let token = provider.valid_access_token_at(5_000).await.unwrap();

        assert_eq!(token, "token-2");
        assert_eq!(
            provider.cached(),
            Some(&CachedToken {
                access_token: "token-2".into(),
                issued_at: 5_000,
                ttl_secs: 1800,
            })
        );
    }

    #[tokio::test]
    async fn exchanges_once_and_reuses_within_lifetime() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "token-3",
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut provider = TokenProvider::new(Some(oauth_client(&server)));
        assert_eq!(provider.valid_access_token_at(100).await.unwrap(), "token-3");
        assert_eq!(provider.valid_access_token_at(200).await.unwrap(), "token-3");
        assert_eq!(provider.cached().map(|c| c.ttl_secs), Some(3600));
    }

    #[tokio::test]
    async fn reports_rejected_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .mount(&server)
            .await;

        let mut provider = TokenProvider::new(Some(oauth_client(&server)));
        let err = provider
            .valid_access_token_at(100)
            .await
            .expect_err("expected exchange failure");
        assert!(matches!(err, TokenError::Exchange(OAuthError::Api { .. })));
    }
}
