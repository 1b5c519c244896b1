use std::time::Duration;

use crate::config::RetryConfig;

/// Retry delay counter owned by one execution.
///
/// The counter is never reset: a retry of any operation, forward or
/// rollback, starts from wherever the previous retry left it.
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    current_ms: u64,
    max_ms: u64,
    multiplier: f64,
}

impl Backoff {
    pub(crate) fn new(config: &RetryConfig) -> Self {
        Self {
            current_ms: duration_ms(config.retry_delay()),
            max_ms: duration_ms(config.max_retry_delay()),
            multiplier: config.retry_delay_multiplier(),
        }
    }

    /// Delay to wait before the next retry; grows the counter afterwards.
    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = Duration::from_millis(self.current_ms);
        self.current_ms = self.max_ms.min(self.grown());
        delay
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn grown(&self) -> u64 {
        // float-to-int `as` saturates
        (self.current_ms as f64 * self.multiplier).floor() as u64
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
