use std::time::Duration;

use crate::audit::{ExecutionLog, Phase};
use crate::backoff::Backoff;
use crate::config::RetryConfig;
use crate::error::{StepError, TransactionError};

/// Direction of travel through the registry.
///
/// The rollback direction carries the error that started it, so a rollback
/// can never be reported without its cause.
#[derive(Debug)]
enum Direction {
    Forward,
    Rollback {
        failed_step: String,
        cause: StepError,
    },
}

/// What the engine does after an operation completes.
#[derive(Debug)]
pub(crate) enum Transition {
    /// Re-invoke the same operation after the delay.
    Retry(Duration),
    /// Move the cursor and dispatch the next operation.
    Continue,
    /// A rollback failed; the execution ends with this error.
    Fatal(TransactionError),
}

/// Control state owned by a single execution.
#[derive(Debug)]
pub(crate) struct ExecutionContext {
    cursor: isize,
    direction: Direction,
    backoff: Backoff,
    pub(crate) log: ExecutionLog,
}

impl ExecutionContext {
    pub(crate) fn new(config: &RetryConfig) -> Self {
        Self {
            cursor: 0,
            direction: Direction::Forward,
            backoff: Backoff::new(config),
            log: ExecutionLog::new(),
        }
    }

    /// Index of the active step, or `None` once the cursor has run off
    /// either end of the registry.
    pub(crate) fn position(&self, len: usize) -> Option<usize> {
        usize::try_from(self.cursor).ok().filter(|&index| index < len)
    }

    pub(crate) fn phase(&self) -> Phase {
        match self.direction {
            Direction::Forward => Phase::Action,
            Direction::Rollback { .. } => Phase::Rollback,
        }
    }

    pub(crate) fn is_rolling_back(&self) -> bool {
        matches!(self.direction, Direction::Rollback { .. })
    }

    /// Apply the (already classified) result of the active operation.
    pub(crate) fn transition(&mut self, step: &str, error: Option<StepError>) -> Transition {
        let Some(error) = error else {
            self.log.record_success();
            self.step_cursor();
            return Transition::Continue;
        };

        if error.is_retryable() {
            let delay = self.backoff.next_delay();
            self.log.record_retry(delay);
            return Transition::Retry(delay);
        }

        self.log.record_failure();
        match std::mem::replace(&mut self.direction, Direction::Forward) {
            Direction::Rollback { failed_step, cause } => {
                Transition::Fatal(TransactionError::RollbackFailed {
                    step: step.to_string(),
                    source: error,
                    failed_step,
                    cause,
                })
            }
            Direction::Forward => {
                self.direction = Direction::Rollback {
                    failed_step: step.to_string(),
                    cause: error,
                };
                // the failing step itself is not rolled back
                self.cursor -= 1;
                Transition::Continue
            }
        }
    }

    /// The classifier cleared the operation's error; proceed as on success.
    pub(crate) fn suppressed(&mut self) -> Transition {
        self.log.record_suppressed();
        self.step_cursor();
        Transition::Continue
    }

    fn step_cursor(&mut self) {
        match self.direction {
            Direction::Forward => self.cursor += 1,
            Direction::Rollback { .. } => self.cursor -= 1,
        }
    }

    /// Terminal result once the cursor left the registry.
    pub(crate) fn finish(self) -> (Option<TransactionError>, ExecutionLog) {
        let error = match self.direction {
            Direction::Forward => None,
            Direction::Rollback { failed_step, cause } => Some(TransactionError::StepFailed {
                step: failed_step,
                source: cause,
            }),
        };
        (error, self.log)
    }
}
