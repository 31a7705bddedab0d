use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// One OHLC price sample. Appended once by the producer, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        time: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self { time, open, high, low, close, volume }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Trend {
    /// The low of the window came before its high.
    Bullish,
    Bearish,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Bullish => write!(f, "Bullish"),
            Trend::Bearish => write!(f, "Bearish"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
    NoData,
}

impl Signal {
    /// Trading action for a successful analysis. `NoData` is reserved for failed ones.
    pub fn from_zone(trend: Trend, in_golden_zone: bool) -> Self {
        match (in_golden_zone, trend) {
            (false, _) => Signal::Hold,
            (true, Trend::Bullish) => Signal::Buy,
            (true, Trend::Bearish) => Signal::Sell,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Signal::Buy => "Buy",
            Signal::Sell => "Sell",
            Signal::Hold => "Hold",
            Signal::NoData => "NoData",
        };
        write!(f, "{}", s)
    }
}

/// A named ratio projected onto the high/low range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetracementLevel {
    pub name: String,
    pub ratio: f64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FibonacciAnalysis {
    pub trend: Trend,
    pub high: f64,
    pub low: f64,
    pub high_time: DateTime<Utc>,
    pub low_time: DateTime<Utc>,
    pub high_index: usize,
    pub low_index: usize,
    pub range: f64,
    /// Sorted by ratio, then by name.
    pub levels: Vec<RetracementLevel>,
    pub golden_zone_low: f64,
    pub golden_zone_high: f64,
    pub current_price: f64,
    pub in_golden_zone: bool,
}

impl FibonacciAnalysis {
    pub fn signal(&self) -> Signal {
        Signal::from_zone(self.trend, self.in_golden_zone)
    }

    pub fn level(&self, name: &str) -> Option<f64> {
        self.levels.iter().find(|l| l.name == name).map(|l| l.price)
    }

    pub fn level_at_ratio(&self, ratio: f64) -> Option<f64> {
        self.levels
            .iter()
            .find(|l| (l.ratio - ratio).abs() < 1e-12)
            .map(|l| l.price)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnalysisError {
    #[error("Not enough bars: required {required}, available {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Could not find highest/lowest bar")]
    ExtremeNotFound,

    #[error("Invalid price data: high {high}, low {low}")]
    InvalidPriceData { high: f64, low: f64 },
}

impl AnalysisError {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::InsufficientData { .. } => "InsufficientData",
            AnalysisError::ExtremeNotFound => "ExtremeNotFound",
            AnalysisError::InvalidPriceData { .. } => "InvalidPriceData",
        }
    }
}

/// Outcome of one engine invocation. Analysis failures are values, not panics or `Err`s,
/// so callers must look at [`FibonacciResult::error`] before trusting anything else.
#[derive(Debug, Clone, PartialEq)]
pub enum FibonacciResult {
    Analysis(FibonacciAnalysis),
    Error(AnalysisError),
}

impl FibonacciResult {
    pub fn signal(&self) -> Signal {
        match self {
            FibonacciResult::Analysis(analysis) => analysis.signal(),
            FibonacciResult::Error(_) => Signal::NoData,
        }
    }

    pub fn analysis(&self) -> Option<&FibonacciAnalysis> {
        match self {
            FibonacciResult::Analysis(analysis) => Some(analysis),
            FibonacciResult::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&AnalysisError> {
        match self {
            FibonacciResult::Analysis(_) => None,
            FibonacciResult::Error(err) => Some(err),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, FibonacciResult::Analysis(_))
    }

    pub fn into_result(self) -> Result<FibonacciAnalysis, AnalysisError> {
        match self {
            FibonacciResult::Analysis(analysis) => Ok(analysis),
            FibonacciResult::Error(err) => Err(err),
        }
    }
}

impl From<Result<FibonacciAnalysis, AnalysisError>> for FibonacciResult {
    fn from(result: Result<FibonacciAnalysis, AnalysisError>) -> Self {
        match result {
            Ok(analysis) => FibonacciResult::Analysis(analysis),
            Err(err) => FibonacciResult::Error(err),
        }
    }
}

/// Everything a session adapter needs to start delivering one bar window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarRequest {
    pub request_id: String,
    pub symbol: String,
    pub sec_type: String,
    pub exchange: String,
    pub currency: String,
    /// Broker duration string, e.g. "1 D" or "1 W".
    pub duration: String,
    /// Broker bar size string, e.g. "5 mins" or "1 day".
    pub bar_size: String,
}

impl BarRequest {
    /// US stock routed through SMART, one day of five-minute bars.
    pub fn stock(symbol: &str) -> Self {
        Self {
            request_id: String::new(),
            symbol: symbol.to_string(),
            sec_type: "STK".to_string(),
            exchange: "SMART".to_string(),
            currency: "USD".to_string(),
            duration: "1 D".to_string(),
            bar_size: "5 mins".to_string(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_table() {
        assert_eq!(Signal::from_zone(Trend::Bullish, true), Signal::Buy);
        assert_eq!(Signal::from_zone(Trend::Bearish, true), Signal::Sell);
        assert_eq!(Signal::from_zone(Trend::Bullish, false), Signal::Hold);
        assert_eq!(Signal::from_zone(Trend::Bearish, false), Signal::Hold);
    }

    #[test]
    fn test_error_result_has_no_data_signal() {
        let result = FibonacciResult::Error(AnalysisError::ExtremeNotFound);
        assert_eq!(result.signal(), Signal::NoData);
        assert!(result.analysis().is_none());
        assert_eq!(result.error().map(|e| e.kind()), Some("ExtremeNotFound"));
    }

    #[test]
    fn test_enumerants_serialize_literally() {
        assert_eq!(serde_json::to_string(&Signal::NoData).unwrap(), "\"NoData\"");
        assert_eq!(serde_json::to_string(&Trend::Bearish).unwrap(), "\"Bearish\"");
        assert_eq!(Signal::Buy.to_string(), "Buy");
    }

    #[test]
    fn test_stock_request_defaults() {
        let req = BarRequest::stock("AAPL").with_request_id("r-1");
        assert_eq!(req.symbol, "AAPL");
        assert_eq!(req.sec_type, "STK");
        assert_eq!(req.bar_size, "5 mins");
        assert_eq!(req.request_id, "r-1");
    }
}
