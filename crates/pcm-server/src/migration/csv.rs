//! CSV tokenizer
//!
//! A small hand written scanner: lines are split on `\n`, fields on commas
//! outside double quotes. Quote characters toggle the quoted state and are
//! not part of the value. Doubled quotes (`""`) are not treated as an escaped
//! quote.

use super::types::DatasetKind;
use std::mem;
use thiserror::Error;

const BYTE_ORDER_MARK: char = '\u{FEFF}';

/// Content that is not valid UTF-8 text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid file encoding at byte {offset}; upload a CSV saved as UTF-8")]
pub struct DecodeError {
    pub offset: usize,
}

/// One data line, zipped with the header names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRow {
    line: usize,
    fields: Vec<(String, Option<String>)>,
}

impl ParsedRow {
    pub fn new(line: usize, fields: Vec<(String, Option<String>)>) -> Self {
        Self { line, fields }
    }

    /// 1-based line number in the source file
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn fields(&self) -> &[(String, Option<String>)] {
        &self.fields
    }

    /// Raw cell for an exact header name
    pub fn raw(&self, header: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == header)
            .and_then(|(_, value)| value.as_deref())
    }

    /// Cell value by header name, ignoring ASCII case. Empty cells are absent.
    pub fn get(&self, header: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(header))
            .and_then(|(_, value)| value.as_deref())
            .filter(|value| !value.is_empty())
    }

    pub fn values(&self) -> impl Iterator<Item = Option<&str>> {
        self.fields.iter().map(|(_, value)| value.as_deref())
    }
}

/// Headers plus rows of one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<ParsedRow>,
}

/// A parsed upload tagged with the dataset it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    pub kind: DatasetKind,
    pub headers: Vec<String>,
    pub rows: Vec<ParsedRow>,
}

impl Dataset {
    pub fn from_bytes(kind: DatasetKind, bytes: &[u8]) -> Result<Self, DecodeError> {
        let table = parse_bytes(bytes)?;
        Ok(Self::from_table(kind, table))
    }

    pub fn from_table(kind: DatasetKind, table: CsvTable) -> Self {
        Self {
            kind,
            headers: table.headers,
            rows: table.rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Decode raw bytes as UTF-8 and tokenize them
pub fn parse_bytes(bytes: &[u8]) -> Result<CsvTable, DecodeError> {
    let text = std::str::from_utf8(bytes).map_err(|e| DecodeError {
        offset: e.valid_up_to(),
    })?;
    Ok(parse_table(text))
}

/// Tokenize text into data rows
pub fn parse(text: &str) -> Vec<ParsedRow> {
    parse_table(text).rows
}

/// Tokenize text, keeping the header names
pub fn parse_table(text: &str) -> CsvTable {
    let text = text.strip_prefix(BYTE_ORDER_MARK).unwrap_or(text);
    let mut lines = split_lines(text).filter(|(_, line)| !line.trim().is_empty());

    let headers: Vec<String> = match lines.next() {
        Some((_, header)) => {
            let header = header.replace(BYTE_ORDER_MARK, "");
            split_fields(&header)
                .into_iter()
                .map(|name| name.trim().to_string())
                .collect()
        }
        None => return CsvTable::default(),
    };

    let rows = lines
        .map(|(number, line)| {
            let mut values = split_fields(line).into_iter();
            let fields = headers
                .iter()
                .map(|name| (name.clone(), values.next().map(|v| v.trim().to_string())))
                .collect();
            ParsedRow::new(number, fields)
        })
        .collect();

    CsvTable { headers, rows }
}

/// Logical lines with their 1-based numbers; `\r\n` counts as one break
fn split_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.split('\n')
        .enumerate()
        .map(|(index, line)| (index + 1, line.strip_suffix('\r').unwrap_or(line)))
}

/// Split one line on commas that are outside double quotes
pub fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);

    fields
}
