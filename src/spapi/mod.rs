//! Selling Partner API access: LWA tokens, the reports job protocol and the
//! FBA inventory snapshot.

pub mod auth;
pub mod config;
pub mod inventory;
pub mod reports;

pub use config::SpApiConfig;
pub use inventory::InventoryRow;
pub use reports::ReportJobClient;

use auth::LwaTokenSource;
use reqwest::{Client, RequestBuilder, Response, StatusCode, header::RETRY_AFTER};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{Duration, sleep};
use tracing::warn;

const ACCESS_TOKEN_HEADER: &str = "x-amz-access-token";
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Debug, Error)]
pub enum SpApiError {
    #[error("missing selling partner credentials in env: {0}")]
    MissingCredentials(&'static str),
    #[error("lwa token exchange failed: {0}")]
    Auth(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response: {0}")]
    Deserialize(String),
}

/// Authorized SP-API caller. Each instance owns its token cache; build one per
/// pipeline run.
#[derive(Clone)]
pub struct SpApiClient {
    http: Client,
    config: Arc<SpApiConfig>,
    tokens: Arc<LwaTokenSource>,
}

impl SpApiClient {
    pub fn new(config: SpApiConfig, http: Client) -> Self {
        let tokens = Arc::new(LwaTokenSource::new(&config, http.clone()));
        Self {
            http,
            config: Arc::new(config),
            tokens,
        }
    }

    pub fn marketplace_id(&self) -> &str {
        &self.config.marketplace_id
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint, path)
    }

    /// Sends an authorized request, retrying only on HTTP 429.
    async fn send_json<T, F>(&self, operation: &'static str, build: F) -> Result<T, SpApiError>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut throttled = 0u32;
        loop {
            let token = self.tokens.access_token().await?;
            let response = build(&self.http)
                .header(ACCESS_TOKEN_HEADER, token)
                .send()
                .await
                .map_err(|err| SpApiError::Request(err.to_string()))?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS
                && throttled < self.config.max_throttle_retries
            {
                let wait = retry_after(&response).unwrap_or_else(|| throttle_backoff(throttled));
                throttled += 1;
                warn!(
                    target = "fba.spapi",
                    operation,
                    attempt = throttled,
                    wait_ms = wait.as_millis() as u64,
                    "sp_api_throttled"
                );
                sleep(wait).await;
                continue;
            }

            if !status.is_success() {
                let mut body = response.text().await.unwrap_or_default();
                truncate_on_char_boundary(&mut body, ERROR_BODY_LIMIT);
                return Err(SpApiError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            return response
                .json::<T>()
                .await
                .map_err(|err| SpApiError::Deserialize(err.to_string()));
        }
    }
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn throttle_backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(6))
}

fn truncate_on_char_boundary(text: &mut String, limit: usize) {
    if text.len() <= limit {
        return;
    }
    let mut cut = limit;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::http::build_client;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    pub const TEST_TOKEN: &str = "Atza|test-token";

    /// Mounts an LWA endpoint on `server` and returns a client pointed at it.
    pub async fn client_for(server: &MockServer) -> SpApiClient {
        Mock::given(method("POST"))
            .and(path("/auth/o2/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": TEST_TOKEN, "expires_in": 3600})),
            )
            .mount(server)
            .await;
        let config = SpApiConfig {
            endpoint: server.uri(),
            token_url: format!("{}/auth/o2/token", server.uri()),
            client_id: "client".into(),
            client_secret: "secret".into(),
            refresh_token: "Atzr|refresh".into(),
            marketplace_id: "A21TJRUUN4KGV".into(),
            max_throttle_retries: 2,
        };
        SpApiClient::new(config, build_client())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(throttle_backoff(0), Duration::from_secs(1));
        assert_eq!(throttle_backoff(1), Duration::from_secs(2));
        assert_eq!(throttle_backoff(3), Duration::from_secs(8));
        assert_eq!(throttle_backoff(40), Duration::from_secs(64));
    }

    #[test]
    fn error_bodies_are_truncated_on_char_boundaries() {
        let mut body = "é".repeat(10);
        truncate_on_char_boundary(&mut body, 5);
        assert_eq!(body, "éé");
    }
}
