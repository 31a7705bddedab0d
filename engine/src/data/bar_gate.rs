// Rendezvous between an asynchronous bar producer and a blocking consumer
use shared::models::Bar;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::config::settings::DEFAULT_TIMEOUT_SECS;
use crate::error::AcquisitionError;

#[derive(Debug, Clone, Default, PartialEq)]
enum StreamState {
    #[default]
    Pending,
    Complete,
    Failed(String),
}

#[derive(Debug, Default)]
struct GateState {
    bars: Vec<Bar>,
    stream: StreamState,
}

/// Accumulates bars pushed by a producer thread and releases consumers blocked in
/// [`BarGate::acquire`] once the producer signals completion or failure.
///
/// Serves one logical request at a time. Callers normally give each request a fresh gate; a
/// reused gate must be [`BarGate::reset`] before its next producer starts. The buffer and the
/// stream state sit behind one mutex, which is also the mutex the condition variable waits on.
#[derive(Debug)]
pub struct BarGate {
    state: Mutex<GateState>,
    ready: Condvar,
    default_timeout: Duration,
}

impl BarGate {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(default_timeout: Duration) -> Self {
        Self { state: Mutex::new(GateState::default()), ready: Condvar::new(), default_timeout }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    // The state is plain data, so a panic in another holder cannot leave it half-written in a way
    // that matters here.
    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clears the buffer and the completion flag. Must run before the producer for the new request
    /// is started.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.bars.clear();
        state.stream = StreamState::Pending;
    }

    /// Appends one bar. Bars arriving after the stream was closed belong to no request and are
    /// dropped.
    pub fn push(&self, bar: Bar) {
        let mut state = self.lock();
        if state.stream != StreamState::Pending {
            tracing::warn!(time = %bar.time, "Dropping bar pushed after stream end");
            return;
        }
        state.bars.push(bar);
        tracing::trace!(count = state.bars.len(), "Bar pushed");
    }

    /// Marks the stream finished and wakes every waiting consumer.
    pub fn signal_complete(&self) {
        let mut state = self.lock();
        if state.stream == StreamState::Pending {
            state.stream = StreamState::Complete;
            tracing::debug!(count = state.bars.len(), "Bar stream complete");
        }
        drop(state);
        self.ready.notify_all();
    }

    /// Marks the stream failed and wakes every waiting consumer. The first terminal signal wins.
    pub fn signal_error(&self, reason: &str) {
        let mut state = self.lock();
        if state.stream == StreamState::Pending {
            state.stream = StreamState::Failed(reason.to_string());
            tracing::debug!(reason, "Bar stream failed");
        }
        drop(state);
        self.ready.notify_all();
    }

    /// Blocks until the producer signals completion or failure, or `timeout` elapses.
    ///
    /// Wakeups that do not change the stream state are absorbed; the predicate is checked again
    /// after each one.
    pub fn acquire(&self, timeout: Duration) -> Result<Vec<Bar>, AcquisitionError> {
        let guard = self.lock();
        let (state, wait) = self
            .ready
            .wait_timeout_while(guard, timeout, |state| state.stream == StreamState::Pending)
            .unwrap_or_else(PoisonError::into_inner);

        match &state.stream {
            StreamState::Complete => Ok(state.bars.clone()),
            StreamState::Failed(reason) => Err(AcquisitionError::Failed { reason: reason.clone() }),
            StreamState::Pending => {
                debug_assert!(wait.timed_out());
                Err(AcquisitionError::Timeout { waited: timeout, partial: state.bars.clone() })
            }
        }
    }

    pub fn acquire_default(&self) -> Result<Vec<Bar>, AcquisitionError> {
        self.acquire(self.default_timeout)
    }
}

impl Default for BarGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    fn create_bar(i: i64) -> Bar {
        let start = Utc.with_ymd_and_hms(2025, 10, 6, 9, 30, 0).unwrap();
        let time = start + chrono::Duration::minutes(5 * i);
        let price = 100.0 + i as f64;
        Bar::new(time, price, price + 1.0, price - 1.0, price, 10.0)
    }

    #[test]
    fn test_default_timeout_is_thirty_seconds() {
        assert_eq!(BarGate::new().default_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_producer_thread_releases_consumer_in_order() {
        let gate = Arc::new(BarGate::new());
        gate.reset();

        let producer = {
            let gate = gate.clone();
            thread::spawn(move || {
                for i in 0..5 {
                    gate.push(create_bar(i));
                    thread::sleep(Duration::from_millis(5));
                }
                gate.signal_complete();
            })
        };

        let bars = gate.acquire(Duration::from_secs(5)).unwrap();
        producer.join().unwrap();
        assert_eq!(bars.len(), 5);
        for (i, bar) in bars.iter().enumerate() {
            assert_eq!(bar, &create_bar(i as i64));
        }
    }

    #[test]
    fn test_complete_with_no_bars_is_success() {
        let gate = BarGate::new();
        gate.reset();
        gate.signal_complete();
        assert_eq!(gate.acquire(Duration::from_millis(50)), Ok(vec![]));
    }

    #[test]
    fn test_timeout_returns_partial_buffer_after_deadline() {
        let gate = BarGate::new();
        gate.reset();
        gate.push(create_bar(0));

        let timeout = Duration::from_millis(200);
        let started = Instant::now();
        let err = gate.acquire(timeout).unwrap_err();
        let elapsed = started.elapsed();

        assert!(elapsed >= timeout, "returned early after {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(5), "returned late after {:?}", elapsed);
        match err {
            AcquisitionError::Timeout { waited, partial } => {
                assert_eq!(waited, timeout);
                assert_eq!(partial, vec![create_bar(0)]);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_spurious_wakeups_do_not_release() {
        let gate = Arc::new(BarGate::new());
        gate.reset();

        let nudger = {
            let gate = gate.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    gate.ready.notify_all();
                    thread::sleep(Duration::from_millis(10));
                }
            })
        };

        let timeout = Duration::from_millis(300);
        let started = Instant::now();
        let result = gate.acquire(timeout);
        nudger.join().unwrap();
        assert!(matches!(result, Err(AcquisitionError::Timeout { .. })));
        assert!(started.elapsed() >= timeout);
    }

    #[test]
    fn test_producer_error_is_distinct_from_timeout() {
        let gate = Arc::new(BarGate::new());
        gate.reset();
        let producer = {
            let gate = gate.clone();
            thread::spawn(move || {
                gate.push(create_bar(0));
                gate.signal_error("connection refused");
            })
        };
        let err = gate.acquire(Duration::from_secs(5)).unwrap_err();
        producer.join().unwrap();
        assert_eq!(err, AcquisitionError::Failed { reason: "connection refused".to_string() });
    }

    #[test]
    fn test_all_waiting_consumers_are_released() {
        let gate = Arc::new(BarGate::new());
        gate.reset();

        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let gate = gate.clone();
                thread::spawn(move || gate.acquire(Duration::from_secs(5)))
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        gate.push(create_bar(0));
        gate.push(create_bar(1));
        gate.signal_complete();

        for consumer in consumers {
            assert_eq!(consumer.join().unwrap().unwrap().len(), 2);
        }
    }

    #[test]
    fn test_reset_clears_previous_request() {
        let gate = BarGate::new();
        gate.reset();
        gate.push(create_bar(0));
        gate.signal_complete();
        assert_eq!(gate.acquire(Duration::from_millis(10)).unwrap().len(), 1);

        gate.reset();
        match gate.acquire(Duration::from_millis(20)) {
            Err(AcquisitionError::Timeout { partial, .. }) => assert!(partial.is_empty()),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_pushes_after_stream_end_are_dropped() {
        let gate = BarGate::new();
        gate.reset();
        gate.push(create_bar(0));
        gate.signal_complete();
        gate.push(create_bar(1));
        gate.signal_error("late");
        assert_eq!(gate.acquire(Duration::from_millis(10)).unwrap(), vec![create_bar(0)]);
    }
}
