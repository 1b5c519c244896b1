use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::StepError;
use crate::merge::Merge;

/// Name used in diagnostics for steps registered without one.
pub const DEFAULT_STEP_NAME: &str = "step";

/// What an action or rollback reports when it completes.
///
/// The update is merged into the transaction state even when an error is
/// reported alongside it.
#[derive(Debug)]
pub struct StepOutput<U> {
    pub error: Option<StepError>,
    pub update: Option<U>,
}

impl<U> StepOutput<U> {
    /// Success without touching the state.
    #[must_use]
    pub fn unchanged() -> Self {
        Self {
            error: None,
            update: None,
        }
    }

    /// Success with a partial state update.
    #[must_use]
    pub fn update(update: U) -> Self {
        Self {
            error: None,
            update: Some(update),
        }
    }

    /// Failure without a state update.
    pub fn failed(error: impl Into<StepError>) -> Self {
        Self {
            error: Some(error.into()),
            update: None,
        }
    }

    /// Failure that still contributes a partial state update.
    pub fn partial(error: impl Into<StepError>, update: U) -> Self {
        Self {
            error: Some(error.into()),
            update: Some(update),
        }
    }
}

impl<U, E> From<Result<U, E>> for StepOutput<U>
where
    E: Into<StepError>,
{
    fn from(result: Result<U, E>) -> Self {
        match result {
            Ok(update) => Self::update(update),
            Err(error) => Self::failed(error),
        }
    }
}

pub(crate) type Operation<S> =
    Arc<dyn Fn(S) -> BoxFuture<'static, StepOutput<<S as Merge>::Update>> + Send + Sync>;

/// A step in a transaction: a forward action and its compensating rollback.
///
/// Both operations default to a pass-through that succeeds without an update.
pub struct Step<S: Merge> {
    name: Option<String>,
    action: Operation<S>,
    rollback: Operation<S>,
}

impl<S> Step<S>
where
    S: Merge + Send + 'static,
{
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            action: pass_through(),
            rollback: pass_through(),
        }
    }

    #[must_use]
    pub fn unnamed() -> Self {
        Self {
            name: None,
            action: pass_through(),
            rollback: pass_through(),
        }
    }

    /// Set the forward operation.
    #[must_use]
    pub fn action<F, Fut, R>(mut self, f: F) -> Self
    where
        F: Fn(S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: Into<StepOutput<S::Update>>,
    {
        self.action = boxed(f);
        self
    }

    /// Set the compensating operation.
    ///
    /// Invoked with the current state when a later step fails, only if this
    /// step's action had succeeded.
    #[must_use]
    pub fn rollback<F, Fut, R>(mut self, f: F) -> Self
    where
        F: Fn(S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: Into<StepOutput<S::Update>>,
    {
        self.rollback = boxed(f);
        self
    }
}

impl<S: Merge> Step<S> {
    /// Advisory name of the step.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name used in logs and errors.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_STEP_NAME)
    }

    pub(crate) fn operation(&self, rollback: bool) -> &Operation<S> {
        if rollback {
            &self.rollback
        } else {
            &self.action
        }
    }
}

impl<S: Merge> Clone for Step<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            action: Arc::clone(&self.action),
            rollback: Arc::clone(&self.rollback),
        }
    }
}

impl<S: Merge> fmt::Debug for Step<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn pass_through<S: Merge + 'static>() -> Operation<S> {
    Arc::new(|_state: S| -> BoxFuture<'static, StepOutput<S::Update>> {
        Box::pin(async { StepOutput::<S::Update>::unchanged() })
    })
}

fn boxed<S, F, Fut, R>(f: F) -> Operation<S>
where
    S: Merge + 'static,
    F: Fn(S) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Into<StepOutput<S::Update>>,
{
    Arc::new(move |state: S| -> BoxFuture<'static, StepOutput<S::Update>> {
        let fut = f(state);
        Box::pin(async move {
            let output: StepOutput<S::Update> = fut.await.into();
            output
        })
    })
}
