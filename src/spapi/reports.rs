use crate::models::{ReportDocument, ReportJob, ReportRequest, iso_millis};
use crate::spapi::{SpApiClient, SpApiError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use urlencoding::encode;

const REPORTS_API: &str = "/reports/2021-06-30";

/// The three report-job calls the ledger pipeline drives. Each call is a single
/// attempt from the caller's point of view.
#[async_trait]
pub trait ReportJobClient: Send + Sync {
    async fn create_report(&self, request: &ReportRequest) -> Result<String, SpApiError>;

    async fn get_report(&self, report_id: &str) -> Result<ReportJob, SpApiError>;

    async fn get_report_document(
        &self,
        report_document_id: &str,
    ) -> Result<ReportDocument, SpApiError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateReportBody<'a> {
    report_type: &'a str,
    marketplace_ids: [&'a str; 1],
    data_start_time: String,
    data_end_time: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateReportResponse {
    report_id: String,
}

#[async_trait]
impl ReportJobClient for SpApiClient {
    async fn create_report(&self, request: &ReportRequest) -> Result<String, SpApiError> {
        let body = CreateReportBody {
            report_type: &request.report_type,
            marketplace_ids: [&request.marketplace_id],
            data_start_time: iso_millis(&request.data_start_time),
            data_end_time: iso_millis(&request.data_end_time),
        };
        let url = self.url(&format!("{REPORTS_API}/reports"));
        let created: CreateReportResponse = self
            .send_json("createReport", |http| http.post(&url).json(&body))
            .await?;
        debug!(target = "fba.spapi", report_id = %created.report_id, "report_created");
        Ok(created.report_id)
    }

    async fn get_report(&self, report_id: &str) -> Result<ReportJob, SpApiError> {
        let url = self.url(&format!("{REPORTS_API}/reports/{}", encode(report_id)));
        self.send_json("getReport", |http| http.get(&url)).await
    }

    async fn get_report_document(
        &self,
        report_document_id: &str,
    ) -> Result<ReportDocument, SpApiError> {
        let url = self.url(&format!(
            "{REPORTS_API}/documents/{}",
            encode(report_document_id)
        ));
        self.send_json("getReportDocument", |http| http.get(&url))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompressionAlgorithm, ProcessingStatus};
    use crate::spapi::test_support::{TEST_TOKEN, client_for};
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, header, method, path},
    };

    #[tokio::test]
    async fn create_report_posts_ledger_request() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        Mock::given(method("POST"))
            .and(path("/reports/2021-06-30/reports"))
            .and(header("x-amz-access-token", TEST_TOKEN))
            .and(body_json(json!({
                "reportType": "GET_LEDGER_DETAIL_VIEW_DATA",
                "marketplaceIds": ["A21TJRUUN4KGV"],
                "dataStartTime": "2025-11-01T00:00:00.000Z",
                "dataEndTime": "2025-11-30T00:00:00.000Z",
            })))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({"reportId": "50001"})))
            .expect(1)
            .mount(&server)
            .await;

        let request = ReportRequest::ledger(
            "A21TJRUUN4KGV",
            Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 11, 30, 0, 0, 0).unwrap(),
        );
        let report_id = client.create_report(&request).await.expect("create");
        assert_eq!(report_id, "50001");
    }

    #[tokio::test]
    async fn get_report_reads_status_and_document_id() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        Mock::given(method("GET"))
            .and(path("/reports/2021-06-30/reports/50001"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "reportId": "50001",
                "reportType": "GET_LEDGER_DETAIL_VIEW_DATA",
                "processingStatus": "DONE",
                "reportDocumentId": "amzn1.spdoc.1.4.eu.abc",
            })))
            .mount(&server)
            .await;

        let job = client.get_report("50001").await.expect("status");
        assert_eq!(job.processing_status, ProcessingStatus::Done);
        assert_eq!(job.report_document_id.as_deref(), Some("amzn1.spdoc.1.4.eu.abc"));
    }

    #[tokio::test]
    async fn get_report_document_reads_compression() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        Mock::given(method("GET"))
            .and(path("/reports/2021-06-30/documents/DOC-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "reportDocumentId": "DOC-1",
                "url": "https://tortuga-prod-eu.s3.amazonaws.com/doc",
                "compressionAlgorithm": "GZIP",
            })))
            .mount(&server)
            .await;

        let doc = client.get_report_document("DOC-1").await.expect("document");
        assert_eq!(doc.compression(), CompressionAlgorithm::Gzip);
        assert!(doc.url.starts_with("https://"));
    }

    #[tokio::test]
    async fn throttled_calls_are_retried_inside_the_client() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        Mock::given(method("GET"))
            .and(path("/reports/2021-06-30/reports/R9"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/reports/2021-06-30/reports/R9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "reportId": "R9",
                "processingStatus": "IN_QUEUE",
            })))
            .mount(&server)
            .await;

        let job = client.get_report("R9").await.expect("retried");
        assert_eq!(job.processing_status, ProcessingStatus::InQueue);
    }

    #[tokio::test]
    async fn api_errors_carry_status_and_body() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        Mock::given(method("GET"))
            .and(path("/reports/2021-06-30/reports/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("{\"errors\":[]}"))
            .mount(&server)
            .await;

        let err = client.get_report("missing").await.expect_err("404");
        match err {
            SpApiError::Status { status, body } => {
                assert_eq!(status, 404);
                assert!(body.contains("errors"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
