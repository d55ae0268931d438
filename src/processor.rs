//! The processing stage: one slow unit of work per inbound request.
//!
//! [`QuoteProcessor::process`] simulates a hard-working task by holding a
//! worker thread for a fixed duration, then prices the request with a
//! uniformly distributed value in `[0, 100)`. The delay runs on tokio's
//! blocking pool so a slow invocation never occupies the runtime threads
//! driving broker I/O, and it wakes immediately when cancelled.

use crate::quote::Quote;
use rand::Rng;
use std::sync::mpsc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Exclusive upper bound for generated quote values.
pub const QUOTE_VALUE_BOUND: u8 = 100;

/// Nominal per-request processing delay.
pub const DEFAULT_WORK_DURATION: Duration = Duration::from_millis(1000);

/// The only error kind originating in the processing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProcessError {
    /// The delay was interrupted before completion; no quote was produced.
    #[error("processing was cancelled before completion")]
    Cancelled,
}

/// Stateless, call-scoped quote processor.
///
/// May be invoked concurrently for multiple in-flight messages. Each
/// invocation draws its value from the worker thread's own generator, so
/// concurrent invocations never share mutable random state.
#[derive(Debug, Clone)]
pub struct QuoteProcessor {
    work_duration: Duration,
}

impl QuoteProcessor {
    pub fn new(work_duration: Duration) -> Self {
        Self { work_duration }
    }

    pub fn work_duration(&self) -> Duration {
        self.work_duration
    }

    /// Process one quote request.
    ///
    /// Holds a blocking worker thread for the configured duration, then
    /// returns a [`Quote`] echoing `request` verbatim with a fresh value in
    /// `[0, 100)`. If `cancel` fires before the work completes the
    /// invocation fails with [`ProcessError::Cancelled`] and produces no
    /// quote.
    pub async fn process(
        &self,
        request: &str,
        cancel: &CancellationToken,
    ) -> Result<Quote, ProcessError> {
        if cancel.is_cancelled() {
            return Err(ProcessError::Cancelled);
        }

        let work_duration = self.work_duration;
        let requested_item = request.to_string();

        // Wakes the blocking delay below as soon as the token fires
        let (interrupt_tx, interrupt_rx) = mpsc::channel::<()>();
        let watcher = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                cancel.cancelled().await;
                let _ = interrupt_tx.send(());
            }
        });

        let job = tokio::task::spawn_blocking(move || {
            // simulate some hard-working task; an interrupt message (or a
            // torn-down watcher) ends the delay early
            match interrupt_rx.recv_timeout(work_duration) {
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    let quote_value = rand::rng().random_range(0..QUOTE_VALUE_BOUND);
                    Ok(Quote::new(requested_item, quote_value))
                }
                Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                    Err(ProcessError::Cancelled)
                }
            }
        });

        let outcome = match job.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(ProcessError::Cancelled),
        };
        watcher.abort();

        if outcome.is_err() {
            debug!("quote invocation interrupted mid-work");
        }
        outcome
    }
}

impl Default for QuoteProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_WORK_DURATION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_processor_uses_nominal_duration() {
        let processor = QuoteProcessor::default();
        assert_eq!(processor.work_duration(), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_process_fails_immediately_when_already_cancelled() {
        let processor = QuoteProcessor::new(Duration::from_secs(60));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = processor.process("silver", &cancel).await;
        assert_eq!(result, Err(ProcessError::Cancelled));
    }

    #[tokio::test]
    async fn test_process_echoes_request_and_bounds_value() {
        let processor = QuoteProcessor::new(Duration::from_millis(1));
        let quote = processor
            .process("silver", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(quote.requested_item, "silver");
        assert!(quote.quote_value < QUOTE_VALUE_BOUND);
    }

    #[test]
    fn test_cancelled_error_display() {
        assert_eq!(
            ProcessError::Cancelled.to_string(),
            "processing was cancelled before completion"
        );
    }
}
