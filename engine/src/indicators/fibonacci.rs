// Automatic Fibonacci retracement over a lookback window of bars
use super::IndicatorCalculator;
use crate::config::settings::{default_levels, FibonacciSettings, GoldenZone, DEFAULT_BARS_BACK};
use serde_json::Value;
use shared::models::{
    AnalysisError, Bar, FibonacciAnalysis, FibonacciResult, RetracementLevel, Trend,
};
use std::collections::BTreeMap;

/// Finds the swing high and low inside `[start_bar, start_bar + bars_back)`, projects the
/// configured ratios onto that range and checks whether the last close sits in the golden zone.
///
/// The calculator holds configuration only. Each call builds a fresh result, so repeated calls on
/// the same window give identical output and concurrent calls need no locking.
#[derive(Debug, Clone)]
pub struct AutoFibonacci {
    name: String,
    bars_back: usize,
    start_bar: usize,
    levels: Vec<(String, f64)>,
    golden_zone: GoldenZone,
}

impl AutoFibonacci {
    pub fn new(bars_back: usize, start_bar: usize) -> Self {
        Self {
            name: format!("AutoFib({},{})", bars_back, start_bar),
            bars_back,
            start_bar,
            levels: sorted_levels(default_levels()),
            golden_zone: GoldenZone::default(),
        }
    }

    pub fn from_settings(settings: &FibonacciSettings) -> Self {
        Self::new(settings.bars_back, settings.start_bar)
            .with_levels(settings.levels.clone())
            .with_golden_zone(settings.golden_zone)
    }

    /// Replaces the whole level set.
    pub fn with_levels(mut self, levels: BTreeMap<String, f64>) -> Self {
        self.levels = sorted_levels(levels);
        self
    }

    pub fn with_golden_zone(mut self, golden_zone: GoldenZone) -> Self {
        self.golden_zone = golden_zone;
        self
    }

    fn analyse(&self, bars: &[Bar]) -> Result<FibonacciAnalysis, AnalysisError> {
        let required = self.bars_back + self.start_bar;
        if bars.len() < required {
            return Err(AnalysisError::InsufficientData { required, available: bars.len() });
        }

        let (low_index, high_index) = match (
            find_lowest_bar(bars, self.start_bar, self.bars_back),
            find_highest_bar(bars, self.start_bar, self.bars_back),
        ) {
            (Some(low), Some(high)) => (low, high),
            _ => return Err(AnalysisError::ExtremeNotFound),
        };
        let Some(last_bar) = bars.last() else {
            return Err(AnalysisError::ExtremeNotFound);
        };

        let high = bars[high_index].high;
        let low = bars[low_index].low;
        // Negated form also rejects NaN.
        if !(high > 0.0 && low > 0.0 && high > low) {
            return Err(AnalysisError::InvalidPriceData { high, low });
        }

        let high_time = bars[high_index].time;
        let low_time = bars[low_index].time;
        let trend = if high_time > low_time { Trend::Bullish } else { Trend::Bearish };
        let range = high - low;

        // Ratios 0 and 1 land exactly on the swing points; `low + (high - low)` can miss `high`
        // by an ulp.
        let (from, to) = match trend {
            Trend::Bullish => (low, high),
            Trend::Bearish => (high, low),
        };
        let project = |ratio: f64| {
            if ratio == 0.0 {
                from
            } else if ratio == 1.0 {
                to
            } else {
                match trend {
                    Trend::Bullish => low + range * ratio,
                    Trend::Bearish => high - range * ratio,
                }
            }
        };

        let levels = self
            .levels
            .iter()
            .map(|(name, ratio)| RetracementLevel {
                name: name.clone(),
                ratio: *ratio,
                price: project(*ratio),
            })
            .collect();

        let lower = project(self.golden_zone.lower_ratio);
        let upper = project(self.golden_zone.upper_ratio);
        let (golden_zone_low, golden_zone_high) = (lower.min(upper), lower.max(upper));

        let current_price = last_bar.close;
        let in_golden_zone = golden_zone_low <= current_price && current_price <= golden_zone_high;

        Ok(FibonacciAnalysis {
            trend,
            high,
            low,
            high_time,
            low_time,
            high_index,
            low_index,
            range,
            levels,
            golden_zone_low,
            golden_zone_high,
            current_price,
            in_golden_zone,
        })
    }
}

impl Default for AutoFibonacci {
    fn default() -> Self {
        Self::new(DEFAULT_BARS_BACK, 0)
    }
}

impl IndicatorCalculator for AutoFibonacci {
    type Output = FibonacciResult;

    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> Value {
        let levels: serde_json::Map<String, Value> =
            self.levels.iter().map(|(name, ratio)| (name.clone(), Value::from(*ratio))).collect();
        serde_json::json!({
            "bars_back": self.bars_back,
            "start_bar": self.start_bar,
            "levels": levels,
            "golden_zone": [self.golden_zone.lower_ratio, self.golden_zone.upper_ratio],
        })
    }

    fn calculate(&self, data: &[Bar]) -> FibonacciResult {
        self.analyse(data).into()
    }
}

fn sorted_levels(levels: BTreeMap<String, f64>) -> Vec<(String, f64)> {
    let mut levels: Vec<(String, f64)> = levels.into_iter().collect();
    levels.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    levels
}

// Index of the lowest low in the window. Only a strictly lower value moves the index, so ties keep
// the earliest bar.
fn find_lowest_bar(bars: &[Bar], start: usize, count: usize) -> Option<usize> {
    let window = bars.get(start..start.checked_add(count)?)?;
    let (first, rest) = window.split_first()?;
    let mut lowest = (start, first.low);
    for (offset, bar) in rest.iter().enumerate() {
        if bar.low < lowest.1 {
            lowest = (start + offset + 1, bar.low);
        }
    }
    Some(lowest.0)
}

fn find_highest_bar(bars: &[Bar], start: usize, count: usize) -> Option<usize> {
    let window = bars.get(start..start.checked_add(count)?)?;
    let (first, rest) = window.split_first()?;
    let mut highest = (start, first.high);
    for (offset, bar) in rest.iter().enumerate() {
        if bar.high > highest.1 {
            highest = (start + offset + 1, bar.high);
        }
    }
    Some(highest.0)
}
