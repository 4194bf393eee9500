use crate::ledger::summarize;
use crate::models::{
    LedgerResponse, ProcessingStatus, RawRecord, ReportJob, ReportRequest, SummaryEntry,
    iso_millis,
};
use crate::report::{DocumentFetcher, decode_text, decompress, parse_delimited};
use crate::spapi::{ReportJobClient, SpApiError};
use rand::Rng;
use std::{env, future::Future, sync::Arc};
use thiserror::Error;
use tokio::time::{Duration, Instant, sleep};
use tracing::{info, warn};
use uuid::Uuid;

/// Ledger reports are tab separated.
pub const LEDGER_DELIMITER: u8 = b'\t';

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{operation} failed: {message}")]
    RemoteCall {
        operation: &'static str,
        message: String,
    },
    #[error("report {report_id} not ready after {attempts} status checks (last status {last_status})")]
    RemoteJobTimeout {
        report_id: String,
        last_status: ProcessingStatus,
        attempts: u32,
    },
    #[error("report {report_id} failed with status {status}")]
    RemoteJobFailed {
        report_id: String,
        status: ProcessingStatus,
    },
    #[error("report download failed: {0}")]
    Download(String),
    #[error("report decompression failed: {0}")]
    Decompression(String),
    #[error("malformed report: {reason}")]
    MalformedReport { reason: String, preview: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerErrorKind {
    InvalidInput,
    Upstream,
    Timeout,
    Internal,
}

impl LedgerError {
    fn remote(operation: &'static str, err: SpApiError) -> Self {
        Self::RemoteCall {
            operation,
            message: err.to_string(),
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            LedgerError::InvalidInput(_) => "request",
            LedgerError::RemoteCall { operation, .. } => *operation,
            LedgerError::RemoteJobTimeout { .. } | LedgerError::RemoteJobFailed { .. } => {
                "poll_report"
            }
            LedgerError::Download(_) => "download",
            LedgerError::Decompression(_) => "decompress",
            LedgerError::MalformedReport { .. } => "parse",
        }
    }

    pub fn kind(&self) -> LedgerErrorKind {
        match self {
            LedgerError::InvalidInput(_) => LedgerErrorKind::InvalidInput,
            LedgerError::RemoteCall { .. }
            | LedgerError::RemoteJobFailed { .. }
            | LedgerError::Download(_) => LedgerErrorKind::Upstream,
            LedgerError::RemoteJobTimeout { .. } => LedgerErrorKind::Timeout,
            LedgerError::Decompression(_) | LedgerError::MalformedReport { .. } => {
                LedgerErrorKind::Internal
            }
        }
    }
}

/// How long to keep asking the platform whether a report is ready.
///
/// `max_attempts` caps the number of status fetches; `deadline`, when set, also
/// stops polling once the next wait would cross it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    pub deadline: Option<Duration>,
    pub jitter: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            max_attempts: 40,
            deadline: None,
            jitter: Duration::ZERO,
        }
    }
}

impl PollPolicy {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            interval: env_u64("LEDGER_POLL_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.interval),
            max_attempts: env_u64("LEDGER_POLL_MAX_ATTEMPTS")
                .filter(|v| *v > 0)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.max_attempts),
            deadline: env_u64("LEDGER_POLL_DEADLINE_SECS")
                .filter(|v| *v > 0)
                .map(Duration::from_secs),
            jitter: env_u64("LEDGER_POLL_JITTER_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.jitter),
        }
    }

    fn next_wait(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.interval;
        }
        self.interval
            .saturating_add(Duration::from_millis(rand::rng().random_range(0..=jitter_ms)))
    }
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|v| v.trim().parse::<u64>().ok())
}

/// Result of one successful ledger run.
#[derive(Debug, Clone)]
pub struct LedgerReport {
    pub report_id: String,
    pub request: ReportRequest,
    pub records: Vec<RawRecord>,
    pub summary: Vec<SummaryEntry>,
}

impl From<LedgerReport> for LedgerResponse {
    fn from(report: LedgerReport) -> Self {
        LedgerResponse {
            report_id: report.report_id,
            from: iso_millis(&report.request.data_start_time),
            to: iso_millis(&report.request.data_end_time),
            row_count: report.records.len(),
            summary: report.summary,
            data: report.records,
        }
    }
}

/// Drives a ledger report from request to parsed rows and summary.
///
/// Holds no per-run state: every `run` submits its own remote job.
#[derive(Clone)]
pub struct LedgerPipeline {
    reports: Arc<dyn ReportJobClient>,
    documents: Arc<dyn DocumentFetcher>,
    poll: PollPolicy,
}

impl LedgerPipeline {
    pub fn new(
        reports: Arc<dyn ReportJobClient>,
        documents: Arc<dyn DocumentFetcher>,
        poll: PollPolicy,
    ) -> Self {
        Self {
            reports,
            documents,
            poll,
        }
    }

    pub async fn run(&self, request: ReportRequest) -> Result<LedgerReport, LedgerError> {
        if request.data_start_time > request.data_end_time {
            return Err(LedgerError::InvalidInput(format!(
                "start {} is after end {}",
                iso_millis(&request.data_start_time),
                iso_millis(&request.data_end_time)
            )));
        }
        let run_id = Uuid::new_v4();
        info!(
            target = "fba.pipeline",
            %run_id,
            from = %iso_millis(&request.data_start_time),
            to = %iso_millis(&request.data_end_time),
            "creating ledger report"
        );

        let report_id = timed("create_report", async {
            self.reports
                .create_report(&request)
                .await
                .map_err(|err| LedgerError::remote("create_report", err))
        })
        .await?;
        info!(target = "fba.pipeline", %run_id, %report_id, "report created");

        let job = timed("poll_report", self.await_completion(&report_id)).await?;
        let document_id = job.report_document_id.ok_or_else(|| LedgerError::RemoteCall {
            operation: "poll_report",
            message: format!("report {report_id} is DONE without a reportDocumentId"),
        })?;

        let document = timed("resolve_document", async {
            self.reports
                .get_report_document(&document_id)
                .await
                .map_err(|err| LedgerError::remote("resolve_document", err))
        })
        .await?;

        info!(target = "fba.pipeline", %run_id, %report_id, "downloading report document");
        let payload = timed("download", self.documents.fetch(&document.url)).await?;
        let bytes = decompress(payload, document.compression())?;
        let text = decode_text(&bytes);
        let records = parse_delimited(&text, LEDGER_DELIMITER)?;
        let summary = summarize(&records);
        info!(
            target = "fba.pipeline",
            %run_id,
            %report_id,
            rows = records.len(),
            keys = summary.len(),
            "ledger report parsed"
        );
        let summary = summary.into_entries();

        Ok(LedgerReport {
            report_id,
            request,
            records,
            summary,
        })
    }

    async fn await_completion(&self, report_id: &str) -> Result<ReportJob, LedgerError> {
        let policy = self.poll;
        let max_attempts = policy.max_attempts.max(1);
        let started = Instant::now();
        let mut attempts = 0;
        let mut last_status = ProcessingStatus::InQueue;

        while attempts < max_attempts {
            attempts += 1;
            let job = self
                .reports
                .get_report(report_id)
                .await
                .map_err(|err| LedgerError::remote("poll_report", err))?;
            info!(
                target = "fba.pipeline",
                %report_id,
                attempt = attempts,
                status = %job.processing_status,
                "report status"
            );

            if job.processing_status.is_terminal() {
                if job.processing_status.is_failure() {
                    return Err(LedgerError::RemoteJobFailed {
                        report_id: report_id.to_string(),
                        status: job.processing_status,
                    });
                }
                return Ok(job);
            }
            last_status = job.processing_status;

            if attempts == max_attempts {
                break;
            }
            let wait = policy.next_wait();
            if let Some(deadline) = policy.deadline
                && started.elapsed().saturating_add(wait) > deadline
            {
                break;
            }
            sleep(wait).await;
        }

        warn!(
            target = "fba.pipeline",
            %report_id,
            attempts,
            status = %last_status,
            "report polling gave up"
        );
        Err(LedgerError::RemoteJobTimeout {
            report_id: report_id.to_string(),
            last_status,
            attempts,
        })
    }
}

async fn timed<T, Fut>(name: &'static str, fut: Fut) -> Result<T, LedgerError>
where
    Fut: Future<Output = Result<T, LedgerError>>,
{
    let started = std::time::Instant::now();
    let outcome = fut.await;
    crate::metrics::stage_elapsed(name, started.elapsed().as_millis());
    outcome
}
