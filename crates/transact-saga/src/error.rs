use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Error reported by a step's action or rollback.
///
/// Wraps any underlying error together with the retry marker the engine
/// inspects after classification. Errors are non-retryable unless marked.
pub struct StepError {
    inner: BoxError,
    retry: bool,
}

impl StepError {
    /// Wrap an arbitrary error as a non-retryable step error.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            inner: Box::new(error),
            retry: false,
        }
    }

    /// Create a non-retryable step error from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            inner: Box::new(Message(message.into())),
            retry: false,
        }
    }

    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            String::from("non-string panic payload")
        };
        Self::new(StepPanic { message })
    }

    /// Mark this error as retryable.
    #[must_use]
    pub fn retryable(self) -> Self {
        self.with_retry(true)
    }

    /// Set or clear the retry marker.
    #[must_use]
    pub fn with_retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.retry
    }

    /// Borrow the wrapped error as a concrete type, if it is one.
    #[must_use]
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        self.inner.downcast_ref::<E>()
    }

    /// Whether the error was produced by catching a panic inside an operation.
    #[must_use]
    pub fn is_panic(&self) -> bool {
        self.downcast_ref::<StepPanic>().is_some()
    }

    /// Consume the step error, returning the wrapped error.
    #[must_use]
    pub fn into_inner(self) -> BoxError {
        self.inner
    }
}

impl fmt::Debug for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepError")
            .field("inner", &self.inner)
            .field("retry", &self.retry)
            .finish()
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl StdError for StepError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source()
    }
}

impl From<&str> for StepError {
    fn from(message: &str) -> Self {
        Self::msg(message)
    }
}

impl From<String> for StepError {
    fn from(message: String) -> Self {
        Self::msg(message)
    }
}

impl From<BoxError> for StepError {
    fn from(inner: BoxError) -> Self {
        Self {
            inner,
            retry: false,
        }
    }
}

impl From<std::io::Error> for StepError {
    fn from(error: std::io::Error) -> Self {
        Self::new(error)
    }
}

impl From<serde_json::Error> for StepError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(error)
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
struct Message(String);

/// A panic caught while invoking a step operation.
#[derive(Debug, Error)]
#[error("step panicked: {message}")]
pub struct StepPanic {
    /// The panic payload, when it was a string.
    pub message: String,
}

/// Error from transaction execution.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransactionError {
    /// A step failed and every earlier step was rolled back.
    #[error("step '{step}' failed: {source}")]
    StepFailed {
        /// Display name of the step whose action failed.
        step: String,
        /// The (classified) error reported by the action.
        #[source]
        source: StepError,
    },

    /// A rollback failed while unwinding an earlier step failure.
    ///
    /// Rollbacks of steps before `step` were never attempted.
    #[error(
        "rollback of step '{step}' failed: {source}, during rollback caused by step '{failed_step}' failing: {cause}"
    )]
    RollbackFailed {
        /// Display name of the step whose rollback failed.
        step: String,
        /// The error reported by the rollback.
        #[source]
        source: StepError,
        /// Display name of the step whose action started the rollback.
        failed_step: String,
        /// The error that started the rollback.
        cause: StepError,
    },
}

impl TransactionError {
    /// Name of the step whose action failed and triggered rollback.
    #[must_use]
    pub fn failed_step(&self) -> &str {
        match self {
            Self::StepFailed { step, .. } => step,
            Self::RollbackFailed { failed_step, .. } => failed_step,
        }
    }

    /// The forward error that triggered rollback.
    #[must_use]
    pub fn triggering_error(&self) -> &StepError {
        match self {
            Self::StepFailed { source, .. } => source,
            Self::RollbackFailed { cause, .. } => cause,
        }
    }

    /// The rollback error, if unwinding itself failed.
    #[must_use]
    pub fn rollback_error(&self) -> Option<&StepError> {
        match self {
            Self::StepFailed { .. } => None,
            Self::RollbackFailed { source, .. } => Some(source),
        }
    }
}

/// Error loading a [`RetryConfig`](crate::RetryConfig).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read retry config at '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error")]
    TomlParse(#[from] toml::de::Error),

    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}
