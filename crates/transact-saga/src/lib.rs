//! Sequential transactions with compensating rollback.
//!
//! A [`Transaction`] runs its steps one after another, threading a state
//! value through them. Each step reports a partial update that is shallowly
//! merged into the state. When an action fails, the rollbacks of all
//! previously succeeded steps run in reverse order. Errors marked retryable
//! re-run the same operation after an exponential backoff instead.
//!
//! The backoff counter belongs to the whole execution. It is not reset when
//! a different step retries, nor when the execution switches from running
//! actions to running rollbacks.

mod audit;
mod backoff;
mod builder;
pub mod classifier;
mod config;
mod context;
mod error;
mod merge;
mod step;
mod transaction;

pub use audit::{ExecutionLog, Phase, StepRecord, StepStatus};
pub use builder::TransactionBuilder;
pub use classifier::ErrorClassifier;
pub use config::{
    DEFAULT_MAX_RETRY_DELAY, DEFAULT_RETRY_DELAY, DEFAULT_RETRY_DELAY_MULTIPLIER, RetryConfig,
};
pub use error::{ConfigError, StepError, StepPanic, TransactionError};
pub use merge::{Merge, State};
pub use step::{DEFAULT_STEP_NAME, Step, StepOutput};
pub use transaction::{Transaction, TransactionOutcome};
