use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, warn};

use crate::audit::ExecutionLog;
use crate::builder::TransactionBuilder;
use crate::classifier::{self, ErrorClassifier};
use crate::config::RetryConfig;
use crate::context::{ExecutionContext, Transition};
use crate::error::{StepError, TransactionError};
use crate::merge::{Merge, shallow_merge};
use crate::step::{Operation, Step, StepOutput};

/// Final result of one execution.
///
/// The state is reported on failure too: after a compensated failure it is
/// the state produced by the rollback chain.
#[derive(Debug)]
pub struct TransactionOutcome<S> {
    pub state: S,
    pub error: Option<TransactionError>,
    pub log: ExecutionLog,
}

impl<S> TransactionOutcome<S> {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Convert into a `Result`, discarding the state on failure.
    ///
    /// # Errors
    ///
    /// Returns the transaction error if the execution did not succeed.
    pub fn into_result(self) -> Result<S, TransactionError> {
        match self.error {
            None => Ok(self.state),
            Some(error) => Err(error),
        }
    }
}

/// An ordered registry of steps executed as a compensating transaction.
///
/// Steps run one at a time. When an action fails with a non-retryable
/// error, the rollbacks of every earlier step run in reverse order. A failed
/// rollback ends the execution immediately.
///
/// Cloning a transaction shares its registry. Executions keep the step list
/// they started with: [`add`](Self::add) during an in-flight execution
/// copies the list rather than changing it under that execution.
pub struct Transaction<S: Merge> {
    steps: Arc<Vec<Step<S>>>,
    config: RetryConfig,
    on_error: ErrorClassifier,
}

impl<S> Transaction<S>
where
    S: Merge + Clone + Send + 'static,
{
    /// Create an empty transaction with the given retry policy.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self {
            steps: Arc::new(Vec::new()),
            config,
            on_error: classifier::identity(),
        }
    }

    #[must_use]
    pub fn builder() -> TransactionBuilder<S> {
        TransactionBuilder::new()
    }

    pub(crate) fn from_parts(
        steps: Vec<Step<S>>,
        config: RetryConfig,
        on_error: ErrorClassifier,
    ) -> Self {
        Self {
            steps: Arc::new(steps),
            config,
            on_error,
        }
    }

    /// Append a step to the registry.
    pub fn add(&mut self, step: Step<S>) {
        Arc::make_mut(&mut self.steps).push(step);
    }

    #[must_use]
    pub fn steps(&self) -> &[Step<S>] {
        &self.steps
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Start one execution and report its outcome through `callback`.
    ///
    /// With no steps registered the callback runs immediately, before this
    /// function returns. Otherwise the execution is spawned onto the Tokio
    /// runtime and the callback runs on completion, never from within this
    /// call.
    ///
    /// # Panics
    ///
    /// Panics if steps are registered and this is called outside a Tokio
    /// runtime.
    pub fn execute<F>(&self, state: S, callback: F)
    where
        F: FnOnce(TransactionOutcome<S>) + Send + 'static,
    {
        if self.steps.is_empty() {
            debug!("no steps registered, completing immediately");
            callback(TransactionOutcome {
                state,
                error: None,
                log: ExecutionLog::new(),
            });
            return;
        }

        let execution = drive(
            Arc::clone(&self.steps),
            Arc::clone(&self.on_error),
            self.config,
            state,
        );
        tokio::spawn(async move {
            callback(execution.await);
        });
    }

    /// Run one execution to completion on the current task.
    pub async fn run(&self, state: S) -> TransactionOutcome<S> {
        if self.steps.is_empty() {
            return TransactionOutcome {
                state,
                error: None,
                log: ExecutionLog::new(),
            };
        }
        drive(
            Arc::clone(&self.steps),
            Arc::clone(&self.on_error),
            self.config,
            state,
        )
        .await
    }
}

impl<S> Default for Transaction<S>
where
    S: Merge + Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl<S: Merge> Clone for Transaction<S> {
    fn clone(&self) -> Self {
        Self {
            steps: Arc::clone(&self.steps),
            config: self.config,
            on_error: Arc::clone(&self.on_error),
        }
    }
}

impl<S: Merge> fmt::Debug for Transaction<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("steps", &self.steps)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

async fn drive<S>(
    steps: Arc<Vec<Step<S>>>,
    on_error: ErrorClassifier,
    config: RetryConfig,
    mut state: S,
) -> TransactionOutcome<S>
where
    S: Merge + Clone + Send + 'static,
{
    let mut ctx = ExecutionContext::new(&config);

    loop {
        tokio::task::yield_now().await;

        let Some(index) = ctx.position(steps.len()) else {
            let (error, log) = ctx.finish();
            debug!(success = error.is_none(), "transaction completed");
            return TransactionOutcome { state, error, log };
        };

        let step = &steps[index];
        let name = step.display_name();
        let phase = ctx.phase();
        debug!(step = name, index, phase = ?phase, "dispatching step operation");
        ctx.log.record_start(index, name, phase);

        let output = invoke(step.operation(ctx.is_rolling_back()), state.clone()).await;
        state = shallow_merge(state, output.update);

        let transition = match output.error {
            None => ctx.transition(name, None),
            Some(error) => match on_error(error) {
                None => {
                    debug!(step = name, index, "error suppressed by classifier");
                    ctx.suppressed()
                }
                Some(error) => {
                    if !error.is_retryable() {
                        warn!(step = name, index, phase = ?phase, error = %error, "step operation failed");
                    }
                    ctx.transition(name, Some(error))
                }
            },
        };

        match transition {
            Transition::Continue => {}
            Transition::Retry(delay) => {
                warn!(
                    step = name,
                    index,
                    phase = ?phase,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "retrying step operation"
                );
                tokio::time::sleep(delay).await;
            }
            Transition::Fatal(error) => {
                warn!(error = %error, "rollback failed, abandoning remaining rollbacks");
                return TransactionOutcome {
                    state,
                    error: Some(error),
                    log: ctx.log,
                };
            }
        }
    }
}

/// Invoke an operation, folding a panic into a reported error.
async fn invoke<S: Merge>(operation: &Operation<S>, state: S) -> StepOutput<S::Update> {
    let future = match panic::catch_unwind(AssertUnwindSafe(|| operation(state))) {
        Ok(future) => future,
        Err(payload) => return StepOutput::failed(StepError::from_panic(payload.as_ref())),
    };

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(output) => output,
        Err(payload) => StepOutput::failed(StepError::from_panic(payload.as_ref())),
    }
}
