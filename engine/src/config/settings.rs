// Engine settings, loaded from a JSON file or taken from defaults
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::EngineError;

pub const DEFAULT_BARS_BACK: usize = 20;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// The ten standard ratios, keyed by level name. Ratios above 1.0 are extensions.
pub fn default_levels() -> BTreeMap<String, f64> {
    [
        ("level_0", 0.000),
        ("level_1", 0.236),
        ("level_2", 0.382),
        ("level_3", 0.500),
        ("level_4", 0.618),
        ("level_5", 0.764),
        ("level_6", 0.886),
        ("level_7", 1.000),
        ("level_8", 1.618),
        ("level_9", 2.618),
    ]
    .into_iter()
    .map(|(name, ratio)| (name.to_string(), ratio))
    .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoldenZone {
    pub lower_ratio: f64,
    pub upper_ratio: f64,
}

impl Default for GoldenZone {
    fn default() -> Self {
        GoldenZone { lower_ratio: 0.382, upper_ratio: 0.618 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FibonacciSettings {
    pub bars_back: usize,
    pub start_bar: usize,
    pub levels: BTreeMap<String, f64>,
    pub golden_zone: GoldenZone,
}

impl Default for FibonacciSettings {
    fn default() -> Self {
        FibonacciSettings {
            bars_back: DEFAULT_BARS_BACK,
            start_bar: 0,
            levels: default_levels(),
            golden_zone: GoldenZone::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub acquisition_timeout_secs: u64,
    /// Pause between symbols in a batch.
    pub pacing_millis: u64,
    pub sec_type: String,
    pub exchange: String,
    pub currency: String,
    pub duration: String,
    pub bar_size: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            acquisition_timeout_secs: DEFAULT_TIMEOUT_SECS,
            pacing_millis: 1000,
            sec_type: "STK".to_string(),
            exchange: "SMART".to_string(),
            currency: "USD".to_string(),
            duration: "1 D".to_string(),
            bar_size: "5 mins".to_string(),
        }
    }
}

impl SessionSettings {
    pub fn acquisition_timeout(&self) -> Duration {
        Duration::from_secs(self.acquisition_timeout_secs)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub fibonacci: FibonacciSettings,
    pub session: SessionSettings,
    pub symbols: Vec<String>,
    pub output_dir: Option<PathBuf>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            fibonacci: FibonacciSettings::default(),
            session: SessionSettings::default(),
            symbols: vec!["AAPL".to_string(), "MSFT".to_string(), "SPY".to_string()],
            output_dir: None,
        }
    }
}

impl EngineSettings {
    pub fn load_from_file(path: &Path) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path)?;
        let settings: EngineSettings = serde_json::from_str(&raw).map_err(|e| {
            EngineError::ConfigError(format!("Invalid settings file '{}': {}", path.display(), e))
        })?;
        settings.validate()?;
        tracing::debug!(path = %path.display(), "Loaded engine settings");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let fib = &self.fibonacci;
        if fib.bars_back == 0 {
            return Err(EngineError::ConfigError("bars_back must be greater than 0".to_string()));
        }
        if fib.levels.is_empty() {
            return Err(EngineError::ConfigError(
                "at least one Fibonacci level is required".to_string(),
            ));
        }
        if let Some((name, ratio)) = fib.levels.iter().find(|(_, r)| !r.is_finite()) {
            return Err(EngineError::ConfigError(format!(
                "level '{}' has a non-finite ratio {}",
                name, ratio
            )));
        }
        let zone = fib.golden_zone;
        let finite = zone.lower_ratio.is_finite() && zone.upper_ratio.is_finite();
        if !finite || zone.lower_ratio >= zone.upper_ratio {
            return Err(EngineError::ConfigError(format!(
                "golden zone lower ratio {} must be below upper ratio {}",
                zone.lower_ratio, zone.upper_ratio
            )));
        }
        if self.session.acquisition_timeout_secs == 0 {
            return Err(EngineError::ConfigError(
                "acquisition timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
