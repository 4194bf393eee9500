use crate::spapi::SpApiError;
use crate::spapi::config::SpApiConfig;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::debug;

/// Tokens are refreshed this long before Amazon says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Login-with-Amazon access tokens for one client instance.
pub struct LwaTokenSource {
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    cached: Mutex<Option<CachedToken>>,
}

impl LwaTokenSource {
    pub fn new(config: &SpApiConfig, http: Client) -> Self {
        Self {
            http,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            refresh_token: config.refresh_token.clone(),
            cached: Mutex::new(None),
        }
    }

    pub async fn access_token(&self) -> Result<String, SpApiError> {
        let mut guard = self.cached.lock().await;
        if let Some(token) = guard.as_ref()
            && Instant::now() < token.refresh_at
        {
            return Ok(token.value.clone());
        }
        let fresh = self.exchange_refresh_token().await?;
        let value = fresh.access_token.clone();
        let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(EXPIRY_MARGIN);
        *guard = Some(CachedToken {
            value: fresh.access_token,
            refresh_at: Instant::now() + lifetime,
        });
        Ok(value)
    }

    async fn exchange_refresh_token(&self) -> Result<TokenResponse, SpApiError> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(SpApiError::MissingCredentials("LWA_CLIENT_ID/LWA_CLIENT_SECRET"));
        }
        if self.refresh_token.is_empty() {
            return Err(SpApiError::MissingCredentials("REFRESH_TOKEN"));
        }
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", self.refresh_token.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|err| SpApiError::Auth(err.to_string()))?;

        if !response.status().is_success() {
            return Err(SpApiError::Auth(format!("HTTP {}", response.status())));
        }

        let payload: TokenResponse = response
            .json()
            .await
            .map_err(|err| SpApiError::Auth(err.to_string()))?;
        debug!(
            target = "fba.spapi",
            expires_in = payload.expires_in,
            "lwa_access_token_refreshed"
        );
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::build_client;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string_contains, method, path},
    };

    fn config(token_url: String) -> SpApiConfig {
        SpApiConfig {
            endpoint: "http://unused".into(),
            token_url,
            client_id: "client".into(),
            client_secret: "secret".into(),
            refresh_token: "Atzr|refresh".into(),
            marketplace_id: "A21TJRUUN4KGV".into(),
            max_throttle_retries: 0,
        }
    }

    #[tokio::test]
    async fn token_is_exchanged_once_and_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/o2/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "Atza|abc", "expires_in": 3600})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let source =
            LwaTokenSource::new(&config(format!("{}/auth/o2/token", server.uri())), build_client());
        assert_eq!(source.access_token().await.unwrap(), "Atza|abc");
        assert_eq!(source.access_token().await.unwrap(), "Atza|abc");
    }

    #[tokio::test]
    async fn missing_credentials_fail_without_calling_out() {
        let mut cfg = config("http://127.0.0.1:9/never".into());
        cfg.refresh_token.clear();
        let source = LwaTokenSource::new(&cfg, build_client());
        let err = source.access_token().await.expect_err("no refresh token");
        assert!(matches!(err, SpApiError::MissingCredentials("REFRESH_TOKEN")));
    }

    #[tokio::test]
    async fn rejected_exchange_is_an_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;
        let source = LwaTokenSource::new(&config(server.uri()), build_client());
        let err = source.access_token().await.expect_err("bad grant");
        assert!(matches!(err, SpApiError::Auth(ref msg) if msg.contains("400")));
    }
}
