mod http;
mod ledger;
mod metrics;
mod models;
mod pipeline;
mod report;
mod spapi;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use eyre::WrapErr;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use models::{ApiError, LedgerResponse, ReportRequest};
use pipeline::{LedgerError, LedgerErrorKind, LedgerPipeline, PollPolicy};
use report::HttpDocumentFetcher;
use serde::{Deserialize, Serialize};
use serde_json::json;
use spapi::{InventoryRow, SpApiClient, SpApiConfig, SpApiError};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

const BANNER: &str = "FBA Ledger API OK. Use endpoint: GET /ledger?start=YYYY-MM-DD&end=YYYY-MM-DD or /inventory for current stock";

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(target = "fba.api", "server crashed: {err:?}");
    }
}

async fn run() -> eyre::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .wrap_err("installing prometheus recorder")?;
    let openapi: serde_json::Value = serde_yaml::from_str(include_str!("../docs/openapi.yaml"))
        .wrap_err("parsing docs/openapi.yaml")?;

    let state = AppState {
        sp_config: Arc::new(SpApiConfig::from_env()),
        http: http::build_client(),
        downloads: HttpDocumentFetcher::default(),
        poll: PollPolicy::from_env(),
        openapi: Arc::new(openapi),
        prometheus_handle,
    };
    info!(
        target = "fba.api",
        marketplace = %state.sp_config.marketplace_id,
        endpoint = %state.sp_config.endpoint,
        poll_interval_secs = state.poll.interval.as_secs(),
        poll_max_attempts = state.poll.max_attempts,
        "configuration loaded"
    );

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(3000);
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(target = "fba.api", "FBA Ledger API listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("binding {addr}"))?;
    axum::serve(listener, router(state).into_make_service())
        .await
        .wrap_err("serving http")?;
    Ok(())
}

#[derive(Clone)]
struct AppState {
    sp_config: Arc<SpApiConfig>,
    http: reqwest::Client,
    downloads: HttpDocumentFetcher,
    poll: PollPolicy,
    openapi: Arc<serde_json::Value>,
    prometheus_handle: PrometheusHandle,
}

impl AppState {
    /// Fresh SP-API client per request, so no token cache outlives a run.
    fn sp_client(&self) -> SpApiClient {
        SpApiClient::new((*self.sp_config).clone(), self.http.clone())
    }

    fn ledger_pipeline(&self) -> LedgerPipeline {
        LedgerPipeline::new(
            Arc::new(self.sp_client()),
            Arc::new(self.downloads.clone()),
            self.poll,
        )
    }
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .allow_origin(Any);

    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/openapi.json", get(openapi_json))
        .route("/ledger", get(get_ledger))
        .route("/inventory", get(get_inventory))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn banner() -> &'static str {
    BANNER
}

/// Liveness probe.
///
/// - Method: `GET`
/// - Path: `/health`
async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "fba-ledger-api",
    }))
}

async fn openapi_json(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json((*state.openapi).clone())
}

async fn metrics_endpoint(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Ok(secret) = std::env::var("METRICS_KEY") {
        let presented = headers
            .get("X-Metrics-Key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if presented != secret {
            return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
        }
    }
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        state.prometheus_handle.render(),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct LedgerQuery {
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
}

/// Ledger report for a date range, summarised per FNSKU/ASIN/SKU/facility.
///
/// - Method: `GET`
/// - Path: `/ledger?start=YYYY-MM-DD&end=YYYY-MM-DD`
/// - Defaults: start of the current month (UTC) to now
/// - Response: `LedgerResponse` (`summary` plus every raw row in `data`)
///
/// Blocks until the remote report finishes or polling gives up.
async fn get_ledger(
    State(state): State<AppState>,
    Query(query): Query<LedgerQuery>,
) -> Result<Json<LedgerResponse>, AppError> {
    metrics::inc_requests("/ledger");
    let now = Utc::now();
    let start = match non_empty(query.start) {
        Some(raw) => parse_date_param("start", &raw)?,
        None => first_of_month(now),
    };
    let end = match non_empty(query.end) {
        Some(raw) => parse_date_param("end", &raw)?,
        None => now,
    };

    let request = ReportRequest::ledger(state.sp_config.marketplace_id.clone(), start, end);
    let report = state
        .ledger_pipeline()
        .run(request)
        .await
        .map_err(|err| AppError::ledger("/ledger", err))?;
    info!(
        target = "fba.api",
        report_id = %report.report_id,
        rows = report.records.len(),
        "rows in ledger report"
    );
    Ok(Json(report.into()))
}

#[derive(Debug, Serialize)]
struct InventoryResponse {
    count: usize,
    data: Vec<InventoryRow>,
}

/// Current FBA stock per SKU, straight from the inventory summaries API.
async fn get_inventory(State(state): State<AppState>) -> Result<Json<InventoryResponse>, AppError> {
    metrics::inc_requests("/inventory");
    let data = state.sp_client().inventory_summaries().await.map_err(|err| {
        metrics::inc_failures("/inventory", "inventory");
        AppError::SpApi(err)
    })?;
    Ok(Json(InventoryResponse {
        count: data.len(),
        data,
    }))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Accepts `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp.
fn parse_date_param(name: &str, raw: &str) -> Result<DateTime<Utc>, AppError> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| {
            AppError::Ledger(LedgerError::InvalidInput(format!(
                "`{name}` must be YYYY-MM-DD or RFC 3339, got `{raw}`"
            )))
        })
}

fn first_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}

#[derive(Debug)]
enum AppError {
    Ledger(LedgerError),
    SpApi(SpApiError),
}

impl AppError {
    fn ledger(route: &'static str, err: LedgerError) -> Self {
        metrics::inc_failures(route, err.stage());
        Self::Ledger(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, payload) = match self {
            AppError::Ledger(err) => {
                let status = match err.kind() {
                    LedgerErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                    LedgerErrorKind::Upstream => StatusCode::BAD_GATEWAY,
                    LedgerErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                    LedgerErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                };
                error!(target = "fba.api", stage = err.stage(), error = %err, "ledger error");
                (
                    status,
                    ApiError {
                        error: err.to_string(),
                        detail: Some(err.stage().to_string()),
                    },
                )
            }
            AppError::SpApi(err) => {
                error!(target = "fba.api", error = %err, "inventory error");
                (
                    StatusCode::BAD_GATEWAY,
                    ApiError {
                        error: err.to_string(),
                        detail: Some("inventory".to_string()),
                    },
                )
            }
        };
        (status, Json(payload)).into_response()
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = fmt().with_env_filter(filter).try_init();
}
