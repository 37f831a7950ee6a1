use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

/// Correlation id of one saga run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SagaId(Uuid);

impl SagaId {
    /// Generate a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SagaId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for SagaId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for SagaId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for SagaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Overall state of a saga run.
///
/// ```text
/// Running ──► Completed
///    │
///    └──► Failed ──► Compensating ──► Compensated
///                         │
///                         └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum SagaStatus {
    Running,
    Completed,
    Failed,
    Compensating,
    Compensated,
}

impl SagaStatus {
    /// Whether the state machine allows moving from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: SagaStatus) -> bool {
        matches!(
            (self, next),
            (Self::Running, Self::Completed | Self::Failed)
                | (Self::Failed, Self::Compensating)
                | (Self::Compensating, Self::Compensated | Self::Failed)
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Compensating => "compensating",
            Self::Compensated => "compensated",
        }
    }
}

impl fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single step in the instance log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum StepStatus {
    /// Step started but has not finished.
    Pending,
    /// Step executed successfully.
    Completed,
    /// Step failed during execution.
    Failed,
    /// Step was compensated successfully.
    Compensated,
    /// Step compensation failed.
    CompensationFailed,
}

/// Record of a step's execution in the saga.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// Name of the step.
    pub name: String,
    /// Current status.
    pub status: StepStatus,
    /// JSON snapshot of the step output.
    pub result: Option<Value>,
    /// Error message from execution or compensation.
    pub error: Option<String>,
    /// Description of compensation, present when one was registered.
    pub compensation_description: Option<String>,
    /// When the step started executing.
    pub started_at: DateTime<Utc>,
    /// When the step finished executing.
    pub completed_at: Option<DateTime<Utc>>,
    /// When the step's compensation finished.
    pub compensated_at: Option<DateTime<Utc>>,
}

/// Ordered log of one saga run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaInstance {
    id: SagaId,
    saga: String,
    status: SagaStatus,
    steps: Vec<StepRecord>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    error: Option<String>,
    compensation_order: Vec<usize>,
}

impl SagaInstance {
    /// Create a running instance with an empty step log.
    #[must_use]
    pub fn new(id: SagaId, saga: impl Into<String>) -> Self {
        Self {
            id,
            saga: saga.into(),
            status: SagaStatus::Running,
            steps: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            error: None,
            compensation_order: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> SagaId {
        self.id
    }

    #[must_use]
    pub fn saga(&self) -> &str {
        &self.saga
    }

    #[must_use]
    pub fn status(&self) -> SagaStatus {
        self.status
    }

    /// Get all step records in execution order.
    #[must_use]
    pub fn records(&self) -> &[StepRecord] {
        &self.steps
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Message of the step error that failed the saga.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// A terminal instance accepts no further step or compensation records.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Names of successfully compensated steps, in compensation order.
    #[must_use]
    pub fn compensated_steps(&self) -> Vec<String> {
        self.steps_with_status(StepStatus::Compensated)
    }

    /// Names of steps whose compensation failed, in compensation order.
    #[must_use]
    pub fn failed_compensations(&self) -> Vec<String> {
        self.steps_with_status(StepStatus::CompensationFailed)
    }

    /// Name of the step that failed the saga, if any.
    #[must_use]
    pub fn failed_step(&self) -> Option<&str> {
        self.steps
            .iter()
            .find(|record| record.status == StepStatus::Failed)
            .map(|record| record.name.as_str())
    }

    fn steps_with_status(&self, status: StepStatus) -> Vec<String> {
        self.compensation_order
            .iter()
            .filter_map(|&index| self.steps.get(index))
            .filter(|record| record.status == status)
            .map(|record| record.name.clone())
            .collect()
    }

    /// Get a summary of the saga execution for display.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut lines = vec![format!("{} {} [{}]", self.saga, self.id, self.status)];
        for record in &self.steps {
            let status = match record.status {
                StepStatus::Pending => "…",
                StepStatus::Completed => "✓",
                StepStatus::Failed => "✗",
                StepStatus::Compensated => "↩",
                StepStatus::CompensationFailed => "⚠",
            };
            lines.push(format!("  {status} {}", record.name));
        }
        lines.join("\n")
    }

    /// Append a pending record for `name` and return its index.
    pub(crate) fn record_start(&mut self, name: &str) -> usize {
        let index = self.steps.len();
        if self.rejects_update("record_start") {
            return index;
        }
        self.steps.push(StepRecord {
            name: name.to_string(),
            status: StepStatus::Pending,
            result: None,
            error: None,
            compensation_description: None,
            started_at: Utc::now(),
            completed_at: None,
            compensated_at: None,
        });
        index
    }

    pub(crate) fn record_success(&mut self, result: Value, compensation_description: Option<String>) {
        if self.rejects_update("record_success") {
            return;
        }
        if let Some(record) = self.steps.last_mut() {
            record.status = StepStatus::Completed;
            record.result = Some(result);
            record.completed_at = Some(Utc::now());
            record.compensation_description = compensation_description;
        }
    }

    pub(crate) fn record_failure(&mut self, error: String) {
        if self.rejects_update("record_failure") {
            return;
        }
        if let Some(record) = self.steps.last_mut() {
            record.status = StepStatus::Failed;
            record.error = Some(error.clone());
            record.completed_at = Some(Utc::now());
        }
        self.error = Some(error);
        self.transition(SagaStatus::Failed);
    }

    /// Mark the record at `index` as compensated.
    pub(crate) fn record_compensated(&mut self, index: usize) {
        if self.rejects_update("record_compensated") {
            return;
        }
        if let Some(record) = self.compensable_record(index) {
            record.status = StepStatus::Compensated;
            record.compensated_at = Some(Utc::now());
            self.compensation_order.push(index);
        }
    }

    pub(crate) fn record_compensation_failed(&mut self, index: usize, error: String) {
        if self.rejects_update("record_compensation_failed") {
            return;
        }
        if let Some(record) = self.compensable_record(index) {
            record.status = StepStatus::CompensationFailed;
            record.error = Some(error);
            record.compensated_at = Some(Utc::now());
            self.compensation_order.push(index);
        }
    }

    pub(crate) fn begin_compensation(&mut self) {
        self.transition(SagaStatus::Compensating);
    }

    /// Close a compensation phase: `Compensated` when every reverse action
    /// succeeded, `Failed` otherwise.
    pub(crate) fn finish_compensation(&mut self, all_succeeded: bool) {
        let next = if all_succeeded {
            SagaStatus::Compensated
        } else {
            SagaStatus::Failed
        };
        self.transition(next);
        self.finish();
    }

    pub(crate) fn complete(&mut self) {
        self.transition(SagaStatus::Completed);
        self.finish();
    }

    fn finish(&mut self) {
        if self.finished_at.is_none() {
            self.finished_at = Some(Utc::now());
        }
    }

    /// Only a completed record that registered a compensation can be undone.
    fn compensable_record(&mut self, index: usize) -> Option<&mut StepRecord> {
        let saga_id = self.id;
        match self.steps.get_mut(index) {
            Some(record)
                if record.status == StepStatus::Completed
                    && record.compensation_description.is_some() =>
            {
                Some(record)
            }
            _ => {
                warn!(%saga_id, index, "no compensable step record at index");
                None
            }
        }
    }

    fn transition(&mut self, next: SagaStatus) {
        if self.is_terminal() || !self.status.can_transition_to(next) {
            warn!(
                saga_id = %self.id,
                from = %self.status,
                to = %next,
                "ignoring illegal saga state transition"
            );
            return;
        }
        self.status = next;
    }

    fn rejects_update(&self, operation: &str) -> bool {
        if self.is_terminal() {
            warn!(saga_id = %self.id, operation, "saga instance is terminal");
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running() -> SagaInstance {
        SagaInstance::new(SagaId::new(), "test_saga")
    }

    #[test]
    fn new_instance_is_running_and_empty() {
        let instance = running();

        assert_eq!(instance.status(), SagaStatus::Running);
        assert!(instance.records().is_empty());
        assert!(!instance.is_terminal());
    }

    #[test]
    fn record_start_adds_pending_step() {
        let mut instance = running();
        instance.record_start("lock_funds");

        assert_eq!(instance.records().len(), 1);
        assert_eq!(instance.records()[0].name, "lock_funds");
        assert_eq!(instance.records()[0].status, StepStatus::Pending);
        assert!(instance.records()[0].completed_at.is_none());
    }

    #[test]
    fn record_success_stores_result_and_description() {
        let mut instance = running();
        instance.record_start("lock_funds");
        instance.record_success(Value::from("lock_1"), Some("unlock funds".to_string()));

        let record = &instance.records()[0];
        assert_eq!(record.status, StepStatus::Completed);
        assert_eq!(record.result, Some(Value::from("lock_1")));
        assert_eq!(
            record.compensation_description.as_deref(),
            Some("unlock funds")
        );
        assert!(record.completed_at.is_some());
    }

    #[test]
    fn record_failure_moves_saga_to_failed() {
        let mut instance = running();
        instance.record_start("execute_order");
        instance.record_failure("market closed".to_string());

        assert_eq!(instance.status(), SagaStatus::Failed);
        assert_eq!(instance.error(), Some("market closed"));
        assert_eq!(instance.failed_step(), Some("execute_order"));
    }

    #[test]
    fn compensation_updates_record_by_index_when_names_repeat() {
        let mut instance = running();
        let compensable = instance.record_start("transfer");
        instance.record_success(Value::Null, Some("undo transfer".to_string()));
        instance.record_start("transfer");
        instance.record_success(Value::Null, None);
        instance.record_start("boom");
        instance.record_failure("boom".to_string());
        instance.begin_compensation();

        instance.record_compensated(compensable);

        assert_eq!(instance.records()[0].status, StepStatus::Compensated);
        assert_eq!(instance.records()[1].status, StepStatus::Completed);
        assert_eq!(instance.compensated_steps(), vec!["transfer"]);
    }

    #[test]
    fn record_without_compensation_is_never_marked_compensated() {
        let mut instance = running();
        let read_only = instance.record_start("validate_account");
        instance.record_success(Value::Null, None);
        instance.record_start("lock_funds");
        instance.record_failure("insufficient funds".to_string());
        instance.begin_compensation();

        instance.record_compensated(read_only);
        instance.record_compensated(99);

        assert_eq!(instance.records()[0].status, StepStatus::Completed);
        assert!(instance.compensated_steps().is_empty());
    }

    #[test]
    fn finish_compensation_reflects_failures() {
        let mut instance = running();
        let lock = instance.record_start("lock_funds");
        instance.record_success(Value::Null, Some("unlock funds".to_string()));
        instance.record_start("create_order");
        instance.record_failure("rejected".to_string());
        instance.begin_compensation();
        instance.record_compensation_failed(lock, "ledger offline".to_string());
        instance.finish_compensation(false);

        assert_eq!(instance.status(), SagaStatus::Failed);
        assert!(instance.is_terminal());
        assert_eq!(instance.failed_compensations(), vec!["lock_funds"]);
        assert_eq!(
            instance.records()[0].error.as_deref(),
            Some("ledger offline")
        );
    }

    #[test]
    fn terminal_instance_ignores_further_records() {
        let mut instance = running();
        instance.record_start("only");
        instance.record_success(Value::Null, None);
        instance.complete();

        instance.record_start("late");
        instance.record_failure("late".to_string());

        assert_eq!(instance.status(), SagaStatus::Completed);
        assert_eq!(instance.records().len(), 1);
        assert!(instance.error().is_none());
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        assert!(SagaStatus::Running.can_transition_to(SagaStatus::Completed));
        assert!(SagaStatus::Failed.can_transition_to(SagaStatus::Compensating));
        assert!(!SagaStatus::Completed.can_transition_to(SagaStatus::Compensating));
        assert!(!SagaStatus::Running.can_transition_to(SagaStatus::Compensated));
        assert!(!SagaStatus::Compensated.can_transition_to(SagaStatus::Running));
    }

    #[test]
    fn summary_shows_status_indicators() {
        let mut instance = running();
        let compensated = instance.record_start("compensated_step");
        instance.record_success(Value::Null, Some("undo".to_string()));
        let comp_failed = instance.record_start("comp_failed_step");
        instance.record_success(Value::Null, Some("undo".to_string()));
        instance.record_start("failed_step");
        instance.record_failure("boom".to_string());
        instance.begin_compensation();
        instance.record_compensation_failed(comp_failed, "nope".to_string());
        instance.record_compensated(compensated);
        instance.finish_compensation(false);

        let summary = instance.summary();
        assert!(summary.contains("test_saga"));
        assert!(summary.contains("[failed]"));
        assert!(summary.contains("↩ compensated_step"));
        assert!(summary.contains("⚠ comp_failed_step"));
        assert!(summary.contains("✗ failed_step"));
    }

    #[test]
    fn saga_id_round_trips_through_display() -> anyhow::Result<()> {
        let id = SagaId::new();

        let parsed: SagaId = id.to_string().parse()?;

        assert_eq!(parsed, id);
        Ok(())
    }

    #[test]
    fn instance_serializes_with_snake_case_statuses() -> anyhow::Result<()> {
        let mut instance = running();
        instance.record_start("lock_funds");
        instance.record_success(Value::from(1), None);
        instance.complete();

        let json = serde_json::to_value(&instance)?;

        assert_eq!(json["status"], "completed");
        assert_eq!(json["steps"][0]["status"], "completed");
        assert_eq!(json["saga"], "test_saga");
        Ok(())
    }
}
