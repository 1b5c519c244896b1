use std::time::Duration;

use tokio::time::Instant;

/// Which of a step's operations was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Action,
    Rollback,
}

/// Result of one operation invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StepStatus {
    /// Operation is still running.
    Running,
    /// Operation completed without error.
    Succeeded,
    /// Operation failed with a retryable error and was rescheduled.
    Retried {
        /// Time waited before the next attempt.
        delay: Duration,
    },
    /// Operation failed with a non-retryable error.
    Failed,
    /// Operation failed but the error classifier cleared the error.
    Suppressed,
}

/// Record of one action or rollback invocation.
#[derive(Debug, Clone)]
pub struct StepRecord {
    /// Position of the step in the registry.
    pub index: usize,
    /// Display name of the step.
    pub name: String,
    pub phase: Phase,
    pub status: StepStatus,
    /// When the operation was invoked.
    pub started_at: Instant,
    /// When the operation reported completion.
    pub completed_at: Option<Instant>,
}

/// Audit trail of every operation invoked during one execution, in order.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    records: Vec<StepRecord>,
}

impl ExecutionLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_start(&mut self, index: usize, name: &str, phase: Phase) {
        self.records.push(StepRecord {
            index,
            name: name.to_string(),
            phase,
            status: StepStatus::Running,
            started_at: Instant::now(),
            completed_at: None,
        });
    }

    pub(crate) fn record_success(&mut self) {
        self.complete_last(StepStatus::Succeeded);
    }

    pub(crate) fn record_suppressed(&mut self) {
        self.complete_last(StepStatus::Suppressed);
    }

    pub(crate) fn record_retry(&mut self, delay: Duration) {
        self.complete_last(StepStatus::Retried { delay });
    }

    pub(crate) fn record_failure(&mut self) {
        self.complete_last(StepStatus::Failed);
    }

    fn complete_last(&mut self, status: StepStatus) {
        if let Some(record) = self.records.last_mut() {
            record.status = status;
            record.completed_at = Some(Instant::now());
        }
    }

    /// All records, oldest first.
    #[must_use]
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// Records of one phase, oldest first.
    pub fn records_for(&self, phase: Phase) -> impl Iterator<Item = &StepRecord> {
        self.records.iter().filter(move |r| r.phase == phase)
    }

    /// Registry indices of every invocation of the given phase, in order.
    #[must_use]
    pub fn invoked(&self, phase: Phase) -> Vec<usize> {
        self.records_for(phase).map(|r| r.index).collect()
    }

    /// Every backoff delay scheduled during the execution, in order.
    #[must_use]
    pub fn retry_delays(&self) -> Vec<Duration> {
        self.records
            .iter()
            .filter_map(|r| match r.status {
                StepStatus::Retried { delay } => Some(delay),
                _ => None,
            })
            .collect()
    }

    /// One line per invocation for display.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for record in &self.records {
            let line = match (record.phase, record.status) {
                (_, StepStatus::Running) => format!("… {}", record.name),
                (Phase::Action, StepStatus::Succeeded) => format!("✓ {}", record.name),
                (Phase::Rollback, StepStatus::Succeeded) => format!("↩ {}", record.name),
                (Phase::Action, StepStatus::Failed) => format!("✗ {}", record.name),
                (Phase::Rollback, StepStatus::Failed) => {
                    format!("⚠ {} (rollback failed)", record.name)
                }
                (_, StepStatus::Retried { delay }) => {
                    format!("↻ {} (retry in {}ms)", record.name, delay.as_millis())
                }
                (_, StepStatus::Suppressed) => format!("~ {} (error suppressed)", record.name),
            };
            lines.push(line);
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_log_is_empty() {
        let log = ExecutionLog::new();
        assert!(log.records().is_empty());
        assert!(log.retry_delays().is_empty());
    }

    #[test]
    fn record_start_adds_running_record() {
        let mut log = ExecutionLog::new();
        log.record_start(0, "reserve", Phase::Action);

        assert_eq!(log.records().len(), 1);
        assert_eq!(log.records()[0].name, "reserve");
        assert_eq!(log.records()[0].status, StepStatus::Running);
        assert!(log.records()[0].completed_at.is_none());
    }

    #[test]
    fn completion_updates_last_record() {
        let mut log = ExecutionLog::new();
        log.record_start(0, "reserve", Phase::Action);
        log.record_success();
        log.record_start(1, "charge", Phase::Action);
        log.record_failure();

        assert_eq!(log.records()[0].status, StepStatus::Succeeded);
        assert_eq!(log.records()[1].status, StepStatus::Failed);
        assert!(log.records()[1].completed_at.is_some());
    }

    #[test]
    fn retry_delays_are_collected_in_order() {
        let mut log = ExecutionLog::new();
        log.record_start(0, "a", Phase::Action);
        log.record_retry(Duration::from_millis(10));
        log.record_start(0, "a", Phase::Action);
        log.record_retry(Duration::from_millis(20));
        log.record_start(0, "a", Phase::Action);
        log.record_success();

        assert_eq!(
            log.retry_delays(),
            vec![Duration::from_millis(10), Duration::from_millis(20)]
        );
    }

    #[test]
    fn invoked_filters_by_phase() {
        let mut log = ExecutionLog::new();
        log.record_start(0, "a", Phase::Action);
        log.record_success();
        log.record_start(1, "b", Phase::Action);
        log.record_failure();
        log.record_start(0, "a", Phase::Rollback);
        log.record_success();

        assert_eq!(log.invoked(Phase::Action), vec![0, 1]);
        assert_eq!(log.invoked(Phase::Rollback), vec![0]);
    }

    #[test]
    fn summary_formats_all_records() {
        let mut log = ExecutionLog::new();
        log.record_start(0, "reserve", Phase::Action);
        log.record_success();
        log.record_start(1, "charge", Phase::Action);
        log.record_retry(Duration::from_millis(1000));
        log.record_start(1, "charge", Phase::Action);
        log.record_failure();
        log.record_start(0, "reserve", Phase::Rollback);
        log.record_success();

        let summary = log.summary();
        assert_eq!(
            summary,
            "✓ reserve\n↻ charge (retry in 1000ms)\n✗ charge\n↩ reserve"
        );
    }

    #[test]
    fn summary_shows_rollback_failure_and_suppression() {
        let mut log = ExecutionLog::new();
        log.record_start(0, "a", Phase::Action);
        log.record_suppressed();
        log.record_start(0, "a", Phase::Rollback);
        log.record_failure();

        let summary = log.summary();
        assert!(summary.contains("~ a (error suppressed)"));
        assert!(summary.contains("⚠ a (rollback failed)"));
    }
}
