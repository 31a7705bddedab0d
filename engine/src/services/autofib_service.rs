// Acquire-then-analyse cycle for one symbol, and sequential batches over many
use shared::models::{Bar, BarRequest, FibonacciResult};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::settings::{EngineSettings, SessionSettings};
use crate::data::bar_gate::BarGate;
use crate::data::session::SessionAdapter;
use crate::error::EngineError;
use crate::indicators::{AutoFibonacci, IndicatorCalculator};

/// What happened for one symbol. `result` is `Err` when no usable bar window arrived, and
/// `Ok` (possibly carrying an analysis error) once the engine ran.
#[derive(Debug)]
pub struct SymbolOutcome {
    pub symbol: String,
    pub request_id: String,
    pub bars_received: usize,
    pub result: Result<FibonacciResult, EngineError>,
}

impl SymbolOutcome {
    /// True when the symbol produced no analysis, whether acquisition or the engine failed.
    pub fn is_failure(&self) -> bool {
        !matches!(&self.result, Ok(result) if result.is_ok())
    }
}

pub struct AutoFibService {
    session: Arc<dyn SessionAdapter>,
    indicator: AutoFibonacci,
    settings: SessionSettings,
}

impl AutoFibService {
    pub fn new(session: Arc<dyn SessionAdapter>, settings: &EngineSettings) -> Self {
        Self {
            session,
            indicator: AutoFibonacci::from_settings(&settings.fibonacci),
            settings: settings.session.clone(),
        }
    }

    pub fn bar_request(&self, symbol: &str) -> BarRequest {
        BarRequest {
            request_id: Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            sec_type: self.settings.sec_type.clone(),
            exchange: self.settings.exchange.clone(),
            currency: self.settings.currency.clone(),
            duration: self.settings.duration.clone(),
            bar_size: self.settings.bar_size.clone(),
        }
    }

    /// Starts the session request on a gate of its own and blocks until the bar stream
    /// completes, fails or times out.
    ///
    /// A producer abandoned after a timeout keeps only its own gate, so its late bars never reach
    /// a later request.
    pub fn fetch_bars(&self, request: &BarRequest) -> Result<Vec<Bar>, EngineError> {
        let gate = Arc::new(BarGate::with_timeout(self.settings.acquisition_timeout()));
        self.session.request_bars(request, gate.clone())?;
        tracing::debug!(
            request_id = %request.request_id,
            timeout = ?gate.default_timeout(),
            "Waiting for bars"
        );

        let bars = gate.acquire_default().map_err(|e| {
            tracing::warn!(
                symbol = %request.symbol,
                request_id = %request.request_id,
                error_detail = %e,
                "Bar acquisition failed"
            );
            e
        })?;
        tracing::info!(
            symbol = %request.symbol,
            request_id = %request.request_id,
            count = bars.len(),
            "Historical data received"
        );
        Ok(bars)
    }

    pub fn analyse_symbol(&self, symbol: &str) -> SymbolOutcome {
        let request = self.bar_request(symbol);
        tracing::info!(symbol, request_id = %request.request_id, "Fetching data");

        let bars = match self.fetch_bars(&request) {
            Ok(bars) => bars,
            Err(e) => {
                return SymbolOutcome {
                    symbol: symbol.to_string(),
                    request_id: request.request_id,
                    bars_received: 0,
                    result: Err(e),
                }
            }
        };

        // An empty window still goes through the engine, which reports it as insufficient data.
        let result = self.indicator.calculate(&bars);
        match &result {
            FibonacciResult::Analysis(analysis) => tracing::info!(
                symbol,
                trend = %analysis.trend,
                signal = %result.signal(),
                in_golden_zone = analysis.in_golden_zone,
                "Fibonacci levels calculated"
            ),
            FibonacciResult::Error(err) => tracing::warn!(
                symbol,
                kind = err.kind(),
                error_detail = %err,
                parameters = %self.indicator.parameters(),
                "Fibonacci analysis failed"
            ),
        }

        SymbolOutcome {
            symbol: symbol.to_string(),
            request_id: request.request_id,
            bars_received: bars.len(),
            result: Ok(result),
        }
    }

    /// Runs symbols one after another on the blocking pool, pausing between requests. A failure
    /// stays local to its symbol.
    pub async fn run_batch(self: Arc<Self>, symbols: Vec<String>) -> Vec<SymbolOutcome> {
        let pacing = self.settings.pacing();
        let mut outcomes = Vec::with_capacity(symbols.len());

        for (idx, symbol) in symbols.into_iter().enumerate() {
            if idx > 0 && pacing > Duration::ZERO {
                tokio::time::sleep(pacing).await;
            }

            let service = self.clone();
            let task_symbol = symbol.clone();
            let task = tokio::task::spawn_blocking(move || service.analyse_symbol(&task_symbol));
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    tracing::error!(
                        symbol = %symbol,
                        error_detail = ?join_err,
                        "Analysis task did not finish"
                    );
                    SymbolOutcome {
                        symbol,
                        request_id: String::new(),
                        bars_received: 0,
                        result: Err(EngineError::ProcessingError(format!(
                            "analysis task failed: {}",
                            join_err
                        ))),
                    }
                }
            };
            outcomes.push(outcome);
        }

        outcomes
    }
}
