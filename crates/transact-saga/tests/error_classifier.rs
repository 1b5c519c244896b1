//! Integration tests for the error classifier hook.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use transact_saga::classifier::retry_when;
use transact_saga::{Phase, State, Step, StepError, StepOutput, StepStatus, Transaction};

type Output = StepOutput<State>;

#[derive(Debug, thiserror::Error)]
enum GatewayError {
    #[error("gateway timed out")]
    Timeout,
    #[error("card declined")]
    Declined,
}

/// Action that reports the given errors in order, then succeeds.
fn scripted(name: &'static str, errors: Vec<GatewayError>) -> Step<State> {
    let script = Mutex::new(errors.into_iter());
    Step::named(name).action(move |_s: State| {
        let next = script.lock().expect("lock").next();
        async move {
            match next {
                Some(error) => Output::failed(StepError::new(error)),
                None => Output::unchanged(),
            }
        }
    })
}

#[tokio::test(start_paused = true)]
async fn classifier_can_mark_errors_retryable() {
    let tx = Transaction::builder()
        .step(scripted("charge", vec![GatewayError::Timeout, GatewayError::Timeout]))
        .classifier(retry_when(|error| {
            matches!(error.downcast_ref::<GatewayError>(), Some(GatewayError::Timeout))
        }))
        .build()
        .expect("valid policy");

    let outcome = tx.run(State::new()).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.log.invoked(Phase::Action), vec![0, 0, 0]);
}

#[tokio::test(start_paused = true)]
async fn unmatched_errors_still_trigger_rollback() {
    let rolled_back = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&rolled_back);

    let tx = Transaction::builder()
        .step(Step::named("reserve").rollback(move |_s: State| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Output::unchanged() }
        }))
        .step(scripted("charge", vec![GatewayError::Timeout, GatewayError::Declined]))
        .classifier(retry_when(|error| {
            matches!(error.downcast_ref::<GatewayError>(), Some(GatewayError::Timeout))
        }))
        .build()
        .expect("valid policy");

    let outcome = tx.run(State::new()).await;

    assert_eq!(rolled_back.load(Ordering::SeqCst), 1);
    let error = outcome.error.expect("compensated failure");
    assert!(matches!(
        error.triggering_error().downcast_ref::<GatewayError>(),
        Some(GatewayError::Declined)
    ));
}

#[tokio::test]
async fn classifier_can_suppress_errors() {
    let tx = Transaction::builder()
        .step(scripted("optional", vec![GatewayError::Declined]))
        .step(Step::named("next"))
        .on_error(|_error| None)
        .build()
        .expect("valid policy");

    let outcome = tx.run(State::new()).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.log.records()[0].status, StepStatus::Suppressed);
    assert_eq!(outcome.log.invoked(Phase::Action), vec![0, 1]);
}

#[tokio::test]
async fn rewritten_errors_reach_the_caller_unchanged() {
    let tx = Transaction::builder()
        .step(scripted("charge", vec![GatewayError::Declined]))
        .on_error(|error| Some(StepError::msg(format!("payment: {error}"))))
        .build()
        .expect("valid policy");

    let outcome = tx.run(State::new()).await;

    let error = outcome.error.expect("compensated failure");
    assert_eq!(error.triggering_error().to_string(), "payment: card declined");
}

#[tokio::test]
async fn classifier_sees_rollback_errors_and_panics() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let observed = Arc::clone(&seen);

    let tx = Transaction::builder()
        .step(Step::named("reserve").rollback(|_s: State| async {
            Output::failed("release failed")
        }))
        .step(Step::named("charge").action(|s: State| async move {
            assert!(s.contains_key("card"), "no card on file");
            Output::unchanged()
        }))
        .on_error(move |error| {
            observed
                .lock()
                .expect("lock")
                .push((error.to_string(), error.is_panic()));
            Some(error)
        })
        .build()
        .expect("valid policy");

    let outcome = tx.run(State::new()).await;

    assert_eq!(
        *seen.lock().expect("lock"),
        vec![
            ("step panicked: no card on file".to_string(), true),
            ("release failed".to_string(), false),
        ]
    );
    assert!(outcome.error.and_then(|e| e.rollback_error().map(ToString::to_string)).is_some());
}

#[tokio::test(start_paused = true)]
async fn classifier_can_make_a_failing_rollback_retryable() {
    let tries = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&tries);

    let tx = Transaction::builder()
        .step(Step::named("reserve").rollback(move |_s: State| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Output::failed("locked")
                } else {
                    Output::unchanged()
                }
            }
        }))
        .step(Step::named("charge").action(|_s: State| async { Output::failed("declined") }))
        .classifier(retry_when(|error| error.to_string() == "locked"))
        .build()
        .expect("valid policy");

    let outcome = tx.run(State::new()).await;

    assert_eq!(tries.load(Ordering::SeqCst), 2);
    let error = outcome.error.expect("compensated failure");
    assert!(error.rollback_error().is_none());
    assert_eq!(error.triggering_error().to_string(), "declined");
}
