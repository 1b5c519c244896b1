use std::sync::Arc;

use crate::error::StepError;

/// Hook applied to every error reported by an action or rollback.
///
/// Runs before the engine looks at the retry marker. Returning `None`
/// clears the error and the operation counts as succeeded.
pub type ErrorClassifier = Arc<dyn Fn(StepError) -> Option<StepError> + Send + Sync>;

/// The default classifier: every error passes through unchanged.
#[must_use]
pub fn identity() -> ErrorClassifier {
    Arc::new(Some::<StepError>)
}

/// Classifier that marks errors matching `predicate` as retryable.
///
/// Errors that do not match keep whatever marker they already carry.
pub fn retry_when<P>(predicate: P) -> ErrorClassifier
where
    P: Fn(&StepError) -> bool + Send + Sync + 'static,
{
    Arc::new(move |error: StepError| {
        if predicate(&error) {
            Some(error.retryable())
        } else {
            Some(error)
        }
    })
}
