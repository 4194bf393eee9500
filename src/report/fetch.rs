use crate::http::build_download_client;
use crate::pipeline::LedgerError;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

/// Downloads a finished report document from its pre-signed URL.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, LedgerError>;
}

/// Plain unauthenticated GET; the URL already carries its signature.
#[derive(Clone)]
pub struct HttpDocumentFetcher {
    http: Client,
}

impl HttpDocumentFetcher {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

impl Default for HttpDocumentFetcher {
    fn default() -> Self {
        Self::new(build_download_client())
    }
}

#[async_trait]
impl DocumentFetcher for HttpDocumentFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, LedgerError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| LedgerError::Download(err.to_string()))?;

        if !response.status().is_success() {
            return Err(LedgerError::Download(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| LedgerError::Download(err.to_string()))?;
        debug!(target = "fba.pipeline", bytes = bytes.len(), "report_document_downloaded");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    #[tokio::test]
    async fn fetch_returns_raw_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/doc"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x1f, 0x8b, 0x08]))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpDocumentFetcher::default();
        let bytes = fetcher
            .fetch(&format!("{}/doc", server.uri()))
            .await
            .expect("download");
        assert_eq!(bytes, vec![0x1f, 0x8b, 0x08]);
    }

    #[tokio::test]
    async fn non_success_status_is_a_download_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/expired"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = HttpDocumentFetcher::default()
            .fetch(&format!("{}/expired", server.uri()))
            .await
            .expect_err("forbidden");
        assert!(matches!(err, LedgerError::Download(ref msg) if msg.contains("403")));
        assert_eq!(err.stage(), "download");
    }
}
