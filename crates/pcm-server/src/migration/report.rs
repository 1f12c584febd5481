//! Error report CSV writer

use super::csv::ParsedRow;
use super::types::DatasetKind;
use std::borrow::Cow;
use uuid::Uuid;

/// Name of the column appended to the original headers
pub const REASON_HEADER: &str = "Error";

/// A failed input row and why it failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRow {
    pub row: ParsedRow,
    pub reason: String,
}

/// Object name of a dataset's error report
pub fn report_name(job_id: Uuid, dataset: DatasetKind) -> String {
    format!("error-reports/{}/{}-errors.csv", job_id, dataset.as_str())
}

/// Render failed rows with their original values followed by the reason
pub fn render(headers: &[String], rows: &[ErrorRow]) -> String {
    let mut out = String::new();

    let header_line: Vec<Cow<'_, str>> = headers
        .iter()
        .map(|h| escape_field(h))
        .chain(std::iter::once(Cow::Borrowed(REASON_HEADER)))
        .collect();
    out.push_str(&header_line.join(","));
    out.push('\n');

    for error in rows {
        let line: Vec<Cow<'_, str>> = error
            .row
            .values()
            .map(|value| escape_field(value.unwrap_or("")))
            .chain(std::iter::once(escape_field(&error.reason)))
            .collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }

    out
}

/// Quote a field when it holds a comma, quote or line break
pub fn escape_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}
