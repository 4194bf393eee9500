use crate::models::RawRecord;
use crate::pipeline::LedgerError;
use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{error, warn};

/// How much of a rejected document is echoed back for diagnostics.
pub const PREVIEW_CHARS: usize = 300;

const BOM: char = '\u{feff}';

/// Decodes a report payload as UTF-8, dropping a leading byte-order mark.
/// Invalid sequences are replaced rather than rejected.
pub fn decode_text(bytes: &[u8]) -> String {
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(err) => {
            warn!(
                target = "fba.pipeline",
                valid_up_to = err.valid_up_to(),
                "report_document_not_utf8_decoding_lossily"
            );
            String::from_utf8_lossy(bytes).into_owned()
        }
    };
    match text.strip_prefix(BOM) {
        Some(stripped) => stripped.to_string(),
        None => text,
    }
}

/// Parses delimited report text into records keyed by the header row.
///
/// Quotes never span lines. On a line whose quotes balance, a field opened by
/// `"` may carry the delimiter and `""` inside it. On any other line every quote
/// is literal and only a field wrapped in a pair of `"` is unwrapped. Short rows
/// are padded with empty strings and long rows are cut at the header width.
pub fn parse_delimited(text: &str, delimiter: u8) -> Result<Vec<RawRecord>, LedgerError> {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let quoted = line_reader(delimiter, true);
    let literal = line_reader(delimiter, false);

    let mut header: Option<Vec<String>> = None;
    let mut records = Vec::new();
    for line in text.lines() {
        if line.is_empty() {
            continue;
        }
        let fields = split_line(line, &quoted, &literal)
            .map_err(|err| malformed(text, err.to_string()))?;
        let Some(columns) = header.as_ref() else {
            header = Some(fields);
            continue;
        };
        let mut fields = fields.into_iter();
        let mut record = RawRecord::new();
        for column in columns {
            record.insert(column.as_str(), fields.next().unwrap_or_default());
        }
        records.push(record);
    }

    if header.is_none() {
        return Err(malformed(text, "no header line found"));
    }
    Ok(records)
}

fn line_reader(delimiter: u8, quoting: bool) -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .flexible(true)
        .quoting(quoting)
        .trim(Trim::None);
    builder
}

fn split_line(
    line: &str,
    quoted: &ReaderBuilder,
    literal: &ReaderBuilder,
) -> Result<Vec<String>, csv::Error> {
    let balanced = line.bytes().filter(|b| *b == b'"').count() % 2 == 0;
    let builder = if balanced { quoted } else { literal };
    let mut row = StringRecord::new();
    builder.from_reader(line.as_bytes()).read_record(&mut row)?;
    Ok(if balanced {
        row.iter().map(str::to_string).collect()
    } else {
        row.iter().map(unquote).collect()
    })
}

fn unquote(field: &str) -> String {
    if field.len() >= 2 && field.starts_with('"') && field.ends_with('"') {
        field[1..field.len() - 1].replace("\"\"", "\"")
    } else {
        field.to_string()
    }
}

fn malformed(text: &str, reason: impl Into<String>) -> LedgerError {
    let preview: String = text.chars().take(PREVIEW_CHARS).collect();
    let reason = reason.into();
    error!(
        target = "fba.pipeline",
        reason = %reason,
        preview = %preview,
        "report_parse_failed"
    );
    LedgerError::MalformedReport { reason, preview }
}
