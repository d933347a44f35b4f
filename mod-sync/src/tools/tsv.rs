//! Parser for localization tables exported as TSV
//!
//! Layout: a header row naming the columns, an optional `#`-prefixed metadata row,
//! then one row per entry. Text is kept exactly as exported.

use csv::{ByteRecord, ReaderBuilder};
use std::path::Path;

use super::{LocEntry, TabularParser};
use crate::error::{ApiError, ApiResult};

const KEY_COLUMN: &str = "key";
const TEXT_COLUMN: &str = "text";

#[derive(Debug, Default, Clone, Copy)]
pub struct TsvLocParser;

impl TsvLocParser {
    pub fn new() -> Self {
        Self
    }

    /// Column positions of key and text, falling back to the first two columns
    fn column_indices(headers: &ByteRecord) -> (usize, usize) {
        let find = |name: &str| {
            headers.iter().position(|field| {
                String::from_utf8_lossy(field)
                    .trim()
                    .trim_start_matches('\u{feff}')
                    .eq_ignore_ascii_case(name)
            })
        };
        match (find(KEY_COLUMN), find(TEXT_COLUMN)) {
            (Some(key), Some(text)) => (key, text),
            _ => (0, 1),
        }
    }

    pub fn parse_bytes(&self, data: &[u8]) -> ApiResult<Vec<LocEntry>> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .quoting(false)
            .from_reader(data);

        let headers = reader
            .byte_headers()
            .map_err(|e| ApiError::tool_failure(format!("Unreadable TSV header: {}", e)))?
            .clone();
        let (key_index, text_index) = Self::column_indices(&headers);

        let mut entries = Vec::new();
        for record in reader.byte_records() {
            let record = record
                .map_err(|e| ApiError::tool_failure(format!("Malformed TSV row: {}", e)))?;

            let Some(raw_key) = record.get(key_index) else {
                continue;
            };
            let key = String::from_utf8_lossy(raw_key)
                .trim_end_matches('\r')
                .to_string();
            if key.is_empty() || key.starts_with('#') {
                continue;
            }

            let value = record
                .get(text_index)
                .map(|raw| {
                    String::from_utf8_lossy(raw)
                        .trim_end_matches('\r')
                        .to_string()
                })
                .unwrap_or_default();
            entries.push(LocEntry { key, value });
        }
        Ok(entries)
    }
}

impl TabularParser for TsvLocParser {
    fn parse(&self, file_path: &Path) -> ApiResult<Vec<LocEntry>> {
        let data = std::fs::read(file_path).map_err(|e| {
            ApiError::tool_failure(format!(
                "Failed to read {}: {}",
                file_path.display(),
                e
            ))
        })?;
        self.parse_bytes(&data)
    }
}
