use csv::{ReaderBuilder, StringRecord, Trim};
use shared::models::Bar;
use shared::utils::bar_time;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::EngineError;

pub struct BarCsvParser;

impl BarCsvParser {
    // Header: time,open,high,low,close,volume ("date" is accepted for "time", volume is optional)
    // Example row: 20251006 09:30:00,256.10,256.80,255.90,256.40,182340
    // Rows are returned in file order; nothing is re-sorted.
    pub fn load_bars_from_csv(file_path: &Path, delimiter: u8) -> Result<Vec<Bar>, EngineError> {
        let file = File::open(file_path).map_err(|e| {
            tracing::warn!(
                path = %file_path.display(),
                error_detail = %e,
                "Failed to open CSV file"
            );
            e
        })?;
        let mut rdr = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(BufReader::new(file));

        let headers = rdr.headers()?.clone();
        let mut bars = Vec::new();

        for (idx, result) in rdr.records().enumerate() {
            let line = idx + 2;
            let record = result?;

            let time_str = Self::get_field(&record, &headers, "time")
                .or_else(|| Self::get_field(&record, &headers, "date"))
                .ok_or_else(|| {
                    format_error(format!("Missing 'time' field in CSV record at line {}", line))
                })?;
            let time = bar_time::parse(time_str).map_err(|e| {
                format_error(format!("Error parsing 'time' at line {}: {}", line, e))
            })?;

            let open = Self::price_field(&record, &headers, "open", line)?;
            let high = Self::price_field(&record, &headers, "high", line)?;
            let low = Self::price_field(&record, &headers, "low", line)?;
            let close = Self::price_field(&record, &headers, "close", line)?;

            let volume = match Self::get_field(&record, &headers, "volume") {
                Some(s) if !s.is_empty() => s.parse::<f64>().map_err(|e| {
                    format_error(format!("Error parsing 'volume' at line {}: {}", line, e))
                })?,
                _ => 0.0,
            };

            bars.push(Bar { time, open, high, low, close, volume });
        }

        tracing::debug!(path = %file_path.display(), count = bars.len(), "Loaded bars from CSV");
        Ok(bars)
    }

    fn price_field(
        record: &StringRecord,
        headers: &StringRecord,
        name: &str,
        line: usize,
    ) -> Result<f64, EngineError> {
        let raw = Self::get_field(record, headers, name).ok_or_else(|| {
            format_error(format!("Missing '{}' field in CSV record at line {}", name, line))
        })?;
        let value = raw.parse::<f64>().map_err(|e| {
            format_error(format!("Error parsing '{}' at line {}: '{}': {}", name, line, raw, e))
        })?;
        if !value.is_finite() {
            return Err(format_error(format!(
                "Error parsing '{}' at line {}: non-finite value '{}'",
                name, line, raw
            )));
        }
        Ok(value)
    }

    // Looks a field up by header name, case-insensitively, so column order does not matter.
    fn get_field<'a>(
        record: &'a StringRecord,
        headers: &StringRecord,
        name: &str,
    ) -> Option<&'a str> {
        headers
            .iter()
            .position(|header| header.eq_ignore_ascii_case(name))
            .and_then(|pos| record.get(pos))
    }
}

fn format_error(message: String) -> EngineError {
    EngineError::CsvDataFormatError(message)
}
