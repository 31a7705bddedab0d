// Text and JSON renderings of a Fibonacci result, and persistence of the JSON form
use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::models::{FibonacciAnalysis, FibonacciResult, Signal, Trend};
use shared::utils::bar_time;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::error::EngineError;

const REPORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisReport<'a> {
    symbol: &'a str,
    timestamp: String,
    trend: Trend,
    high: f64,
    low: f64,
    high_time: String,
    low_time: String,
    high_index: usize,
    low_index: usize,
    range: f64,
    current_price: f64,
    in_golden_zone: bool,
    golden_zone_low: f64,
    golden_zone_high: f64,
    signal: Signal,
    levels: BTreeMap<&'a str, f64>,
}

#[derive(Debug, Serialize)]
struct ErrorReport {
    error: String,
}

/// JSON document for one result. Failed analyses carry only `error`.
pub fn render_json(
    symbol: &str,
    result: &FibonacciResult,
    timestamp: DateTime<Utc>,
) -> Result<String, EngineError> {
    let json = match result {
        FibonacciResult::Analysis(analysis) => {
            serde_json::to_string_pretty(&analysis_report(symbol, analysis, timestamp))?
        }
        FibonacciResult::Error(err) => {
            serde_json::to_string_pretty(&ErrorReport { error: err.to_string() })?
        }
    };
    Ok(json)
}

fn analysis_report<'a>(
    symbol: &'a str,
    analysis: &'a FibonacciAnalysis,
    timestamp: DateTime<Utc>,
) -> AnalysisReport<'a> {
    AnalysisReport {
        symbol,
        timestamp: timestamp.format(REPORT_TIMESTAMP_FORMAT).to_string(),
        trend: analysis.trend,
        high: analysis.high,
        low: analysis.low,
        high_time: bar_time::format(&analysis.high_time),
        low_time: bar_time::format(&analysis.low_time),
        high_index: analysis.high_index,
        low_index: analysis.low_index,
        range: analysis.range,
        current_price: analysis.current_price,
        in_golden_zone: analysis.in_golden_zone,
        golden_zone_low: analysis.golden_zone_low,
        golden_zone_high: analysis.golden_zone_high,
        signal: analysis.signal(),
        levels: analysis.levels.iter().map(|l| (l.name.as_str(), l.price)).collect(),
    }
}

pub fn render_text(symbol: &str, result: &FibonacciResult, timestamp: DateTime<Utc>) -> String {
    let analysis = match result {
        FibonacciResult::Analysis(analysis) => analysis,
        FibonacciResult::Error(err) => return format!("ERROR: {}\n", err),
    };

    let heavy = "=".repeat(60);
    let light = "-".repeat(60);
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "\n{}", heavy);
    let _ = writeln!(out, "AUTO FIBONACCI INDICATOR REPORT - {}", symbol);
    let _ = writeln!(out, "{}", heavy);
    let _ = writeln!(out, "Timestamp: {}", timestamp.format(REPORT_TIMESTAMP_FORMAT));
    let _ = writeln!(out, "Trend: {}", analysis.trend);
    let high_time = bar_time::format(&analysis.high_time);
    let low_time = bar_time::format(&analysis.low_time);
    let _ = writeln!(out, "High: {:.2} at {}", analysis.high, high_time);
    let _ = writeln!(out, "Low:  {:.2} at {}", analysis.low, low_time);
    let _ = writeln!(out, "Range: {:.2}", analysis.range);
    let _ = writeln!(out, "Current Price: {:.2}", analysis.current_price);

    let _ = writeln!(out, "\n{}", light);
    let _ = writeln!(out, "FIBONACCI LEVELS:");
    let _ = writeln!(out, "{}", light);
    for level in &analysis.levels {
        let _ = writeln!(out, "  {:6.1}% -> {:8.2}", level.ratio * 100.0, level.price);
    }

    let _ = writeln!(out, "\n{}", light);
    let _ = writeln!(out, "GOLDEN ZONE:");
    let _ = writeln!(out, "{}", light);
    let _ = writeln!(out, "  Low:  {:.2}", analysis.golden_zone_low);
    let _ = writeln!(out, "  High: {:.2}", analysis.golden_zone_high);
    let _ = writeln!(out, "  Price in Golden Zone: {}", analysis.in_golden_zone);

    let _ = writeln!(out, "\n{}", light);
    let _ = writeln!(out, "SIGNAL: {}", analysis.signal());
    let _ = writeln!(out, "{}", heavy);
    out
}

/// Writes `autofib_<SYMBOL>_<YYYYmmdd_HHMMSS>.json` under `dir`, creating it if needed.
pub fn save_json(
    dir: &Path,
    symbol: &str,
    json: &str,
    now: DateTime<Utc>,
) -> Result<PathBuf, EngineError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("autofib_{}_{}.json", symbol, now.format("%Y%m%d_%H%M%S")));
    std::fs::write(&path, json).map_err(|e| {
        tracing::error!(path = %path.display(), error_detail = ?e, "Failed to save results");
        EngineError::from(e)
    })?;
    tracing::info!(path = %path.display(), "Results saved");
    Ok(path)
}
