//! OAuth2 client-credentials authentication against the Microsoft identity platform.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use reqwest::Client;
use tokio::sync::RwLock;
use tracing::debug;

use crate::client::read_json;
use crate::config::ClientConfig;
use crate::error::{Result, SharePointError};
use crate::models::TokenResponse;

/// Scope granting the application's configured Graph permissions.
pub const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Tokens are refreshed this long before they actually expire.
const EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Cached access token with expiration.
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: SystemTime,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        self.expires_at > SystemTime::now() + EXPIRY_BUFFER
    }
}

/// Acquires and caches app-only bearer tokens for one tenant/client pair.
#[derive(Clone)]
pub struct Authenticator {
    config: Arc<ClientConfig>,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl Authenticator {
    pub fn new(config: Arc<ClientConfig>, client: Client) -> Self {
        Self {
            config,
            client,
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
                return Ok(token.access_token.clone());
            }
        }

        // A failed refresh must not leave a stale token behind.
        let new_token = match self.request_token().await {
            Ok(token) => token,
            Err(err) => {
                *self.cached_token.write().await = None;
                return Err(err);
            }
        };

        {
            let mut cached = self.cached_token.write().await;
            *cached = Some(new_token.clone());
        }

        Ok(new_token.access_token)
    }

    /// Drop the cached token so the next call fetches a new one.
    pub async fn invalidate(&self) {
        *self.cached_token.write().await = None;
    }

    /// Exchange the client id and secret for an access token.
    async fn request_token(&self) -> Result<CachedToken> {
        let endpoint = self.config.token_endpoint();
        debug!(endpoint = %endpoint, client_id = %self.config.client_id(), "requesting access token");

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id()),
            ("client_secret", self.config.client_secret()),
            ("scope", GRAPH_SCOPE),
        ];

        let response = self.client.post(&endpoint).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SharePointError::Authentication { status, body });
        }

        let token_response: TokenResponse = read_json(response).await?;
        let expires_at = SystemTime::now() + Duration::from_secs(token_response.expires_in);

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_freshness() {
        let fresh = CachedToken {
            access_token: "a".to_string(),
            expires_at: SystemTime::now() + Duration::from_secs(3600),
        };
        assert!(fresh.is_fresh());

        let about_to_expire = CachedToken {
            access_token: "b".to_string(),
            expires_at: SystemTime::now() + Duration::from_secs(30),
        };
        assert!(!about_to_expire.is_fresh());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_cache_empty() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/tenant-1/oauth2/v2.0/token")
            .with_status(401)
            .with_body(r#"{"error":"invalid_client","error_description":"bad secret"}"#)
            .expect(2)
            .create_async()
            .await;

        let config = ClientConfig::new(
            "https://contoso.sharepoint.com/sites/Team",
            "tenant-1",
            "client-1",
            "wrong",
        )
        .unwrap()
        .with_authority_host(server.url());
        let auth = Authenticator::new(Arc::new(config), Client::new());

        for _ in 0..2 {
            match auth.get_access_token().await {
                Err(SharePointError::Authentication { status, body }) => {
                    assert_eq!(status, 401);
                    assert!(body.contains("invalid_client"));
                }
                other => panic!("unexpected result: {:?}", other.map(|_| ())),
            }
        }
        assert!(auth.cached_token.read().await.is_none());
        mock.assert_async().await;
    }
}
