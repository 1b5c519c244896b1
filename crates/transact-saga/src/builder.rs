use std::sync::Arc;
use std::time::Duration;

use crate::classifier::{self, ErrorClassifier};
use crate::config::RetryConfig;
use crate::error::{ConfigError, StepError};
use crate::merge::Merge;
use crate::step::Step;
use crate::transaction::Transaction;

/// Builder for a [`Transaction`] with initial steps, retry policy and
/// error classifier.
///
/// ```
/// use std::time::Duration;
///
/// use transact_saga::{State, Step, Transaction};
///
/// let tx = Transaction::<State>::builder()
///     .step(Step::named("reserve"))
///     .step(Step::named("charge"))
///     .retry_delay(Duration::from_millis(200))
///     .on_error(|error| Some(error.retryable()))
///     .build()
///     .expect("valid retry policy");
///
/// assert_eq!(tx.len(), 2);
/// ```
pub struct TransactionBuilder<S: Merge> {
    steps: Vec<Step<S>>,
    config: RetryConfig,
    on_error: ErrorClassifier,
}

impl<S> TransactionBuilder<S>
where
    S: Merge + Clone + Send + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            config: RetryConfig::default(),
            on_error: classifier::identity(),
        }
    }

    /// Append one step.
    #[must_use]
    pub fn step(mut self, step: Step<S>) -> Self {
        self.steps.push(step);
        self
    }

    /// Append several steps in order.
    #[must_use]
    pub fn steps(mut self, steps: impl IntoIterator<Item = Step<S>>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Replace the whole retry policy.
    #[must_use]
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config = self.config.with_retry_delay(delay);
        self
    }

    #[must_use]
    pub fn max_retry_delay(mut self, delay: Duration) -> Self {
        self.config = self.config.with_max_retry_delay(delay);
        self
    }

    #[must_use]
    pub fn retry_delay_multiplier(mut self, multiplier: f64) -> Self {
        self.config = self.config.with_retry_delay_multiplier(multiplier);
        self
    }

    /// Install the error classifier.
    #[must_use]
    pub fn on_error<F>(mut self, classify: F) -> Self
    where
        F: Fn(StepError) -> Option<StepError> + Send + Sync + 'static,
    {
        self.on_error = Arc::new(classify);
        self
    }

    /// Install a shared, prebuilt error classifier.
    #[must_use]
    pub fn classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.on_error = classifier;
        self
    }

    /// Build the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the retry delay multiplier is negative or not
    /// finite.
    pub fn build(self) -> Result<Transaction<S>, ConfigError> {
        let config = self.config.validated()?;
        Ok(Transaction::from_parts(self.steps, config, self.on_error))
    }
}

impl<S> Default for TransactionBuilder<S>
where
    S: Merge + Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
