// Technical indicators module
pub mod fibonacci;

pub use fibonacci::AutoFibonacci;

use serde_json::Value;
use shared::models::Bar;

// Common trait for all indicators
pub trait IndicatorCalculator: Send + Sync {
    type Output;

    fn name(&self) -> &str;
    fn parameters(&self) -> Value; // Parameters used for this indicator instance
    fn calculate(&self, data: &[Bar]) -> Self::Output;
}
