// Narrow seam between a market-data session and the acquisition gate
use shared::models::{Bar, BarRequest};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::bar_gate::BarGate;
use super::csv_parser::BarCsvParser;
use crate::error::EngineError;

/// The only callbacks the engine needs from a session. A broker adapter translates its own
/// protocol into these three calls.
pub trait BarSink: Send + Sync {
    /// Once per bar, in time order.
    fn on_bar(&self, bar: Bar);
    /// Exactly once, after the last `on_bar` of the request.
    fn on_stream_end(&self);
    /// Instead of `on_stream_end` when the request fails upstream.
    fn on_error(&self, reason: &str);
}

impl BarSink for BarGate {
    fn on_bar(&self, bar: Bar) {
        self.push(bar);
    }

    fn on_stream_end(&self) {
        self.signal_complete();
    }

    fn on_error(&self, reason: &str) {
        tracing::error!(reason, "Bar session reported an error");
        self.signal_error(reason);
    }
}

pub trait SessionAdapter: Send + Sync {
    /// Starts asynchronous delivery of the bars described by `request` into `sink` and returns
    /// without waiting for them. An `Err` means delivery never started.
    fn request_bars(&self, request: &BarRequest, sink: Arc<dyn BarSink>) -> Result<(), EngineError>;
}

/// Replays `<data_dir>/<SYMBOL>.csv` from a background thread, standing in for a broker session.
#[derive(Debug, Clone)]
pub struct CsvReplaySession {
    data_dir: PathBuf,
    delimiter: u8,
    bar_delay: Duration,
}

impl CsvReplaySession {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), delimiter: b',', bar_delay: Duration::ZERO }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Pause between bars, to mimic a paced feed.
    pub fn with_bar_delay(mut self, bar_delay: Duration) -> Self {
        self.bar_delay = bar_delay;
        self
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", symbol))
    }
}

impl SessionAdapter for CsvReplaySession {
    fn request_bars(
        &self,
        request: &BarRequest,
        sink: Arc<dyn BarSink>,
    ) -> Result<(), EngineError> {
        if request.symbol.trim().is_empty() {
            return Err(EngineError::SessionError("Bar request has an empty symbol".to_string()));
        }

        let path = self.path_for(&request.symbol);
        let delimiter = self.delimiter;
        let bar_delay = self.bar_delay;
        let request_id = request.request_id.clone();

        tracing::info!(
            symbol = %request.symbol,
            request_id = %request_id,
            path = %path.display(),
            bar_size = %request.bar_size,
            "Replaying bars from CSV"
        );

        thread::Builder::new()
            .name(format!("csv-replay-{}", request.symbol))
            .spawn(move || match BarCsvParser::load_bars_from_csv(&path, delimiter) {
                Ok(bars) => {
                    let count = bars.len();
                    for bar in bars {
                        sink.on_bar(bar);
                        if !bar_delay.is_zero() {
                            thread::sleep(bar_delay);
                        }
                    }
                    tracing::debug!(request_id = %request_id, count, "CSV replay finished");
                    sink.on_stream_end();
                }
                Err(e) => sink.on_error(&format!("{}: {}", path.display(), e)),
            })?;

        Ok(())
    }
}
