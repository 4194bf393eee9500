use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, ser::SerializeMap};
use std::fmt;

pub const LEDGER_REPORT_TYPE: &str = "GET_LEDGER_DETAIL_VIEW_DATA";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRequest {
    pub report_type: String,
    pub marketplace_id: String,
    pub data_start_time: DateTime<Utc>,
    pub data_end_time: DateTime<Utc>,
}

impl ReportRequest {
    pub fn ledger(
        marketplace_id: impl Into<String>,
        data_start_time: DateTime<Utc>,
        data_end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            report_type: LEDGER_REPORT_TYPE.to_string(),
            marketplace_id: marketplace_id.into(),
            data_start_time,
            data_end_time,
        }
    }
}

/// Remote job lifecycle tag. Unknown values are kept verbatim and treated as
/// non-terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProcessingStatus {
    InQueue,
    InProgress,
    Done,
    Cancelled,
    Fatal,
    Other(String),
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ProcessingStatus::InQueue => "IN_QUEUE",
            ProcessingStatus::InProgress => "IN_PROGRESS",
            ProcessingStatus::Done => "DONE",
            ProcessingStatus::Cancelled => "CANCELLED",
            ProcessingStatus::Fatal => "FATAL",
            ProcessingStatus::Other(raw) => raw,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessingStatus::Done | ProcessingStatus::Cancelled | ProcessingStatus::Fatal
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ProcessingStatus::Cancelled | ProcessingStatus::Fatal)
    }
}

impl From<String> for ProcessingStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "IN_QUEUE" => ProcessingStatus::InQueue,
            "IN_PROGRESS" => ProcessingStatus::InProgress,
            "DONE" => ProcessingStatus::Done,
            "CANCELLED" => ProcessingStatus::Cancelled,
            "FATAL" => ProcessingStatus::Fatal,
            _ => ProcessingStatus::Other(value),
        }
    }
}

impl From<ProcessingStatus> for String {
    fn from(value: ProcessingStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportJob {
    pub report_id: String,
    pub processing_status: ProcessingStatus,
    #[serde(default)]
    pub report_document_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompressionAlgorithm {
    #[default]
    None,
    Gzip,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDocument {
    pub url: String,
    #[serde(default)]
    pub compression_algorithm: Option<CompressionAlgorithm>,
}

impl ReportDocument {
    pub fn compression(&self) -> CompressionAlgorithm {
        self.compression_algorithm.unwrap_or_default()
    }
}

/// One report row keyed by the header spelling the report actually used.
/// Serializes as a JSON object in header order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    fields: Vec<(String, String)>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`; a repeated name keeps its first position and
    /// takes the latest value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = RawRecord::new();
        for (key, value) in iter {
            record.insert(key, value);
        }
        record
    }
}

impl Serialize for RawRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ResolvedIdentity {
    pub fnsku: String,
    pub asin: String,
    pub sku: String,
    pub location_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryEntry {
    pub fnsku: String,
    pub asin: String,
    pub sku: String,
    pub fulfillment_center_id: String,
    pub net_movement: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerResponse {
    pub report_id: String,
    pub from: String,
    pub to: String,
    pub row_count: usize,
    pub summary: Vec<SummaryEntry>,
    pub data: Vec<RawRecord>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Millisecond-precision UTC instant, e.g. `2025-11-01T00:00:00.000Z`.
pub fn iso_millis(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}
