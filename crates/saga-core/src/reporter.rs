use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::ReportError;
use crate::instance::{SagaId, SagaInstance};

/// Decision recorded for a saga outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub decision: String,
    pub reasoning: Value,
    pub confidence: f64,
}

impl Decision {
    pub fn new(decision: impl Into<String>, reasoning: Value, confidence: f64) -> Self {
        Self {
            decision: decision.into(),
            reasoning,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// What went wrong in a failed run and which steps were rolled back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub failed_step: String,
    pub error: String,
    /// Successfully compensated steps, in compensation order.
    pub compensated_steps: Vec<String>,
    /// Steps whose compensation failed, in compensation order.
    pub failed_compensations: Vec<String>,
}

/// One entry in the append-only decision log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub saga_id: SagaId,
    pub saga: String,
    pub decision: String,
    pub reasoning: Value,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

/// Receives exactly one terminal report per saga run.
pub trait OutcomeReporter: Send + Sync {
    /// Record a completed saga.
    ///
    /// # Errors
    ///
    /// Returns an error if the outcome could not be persisted.
    fn report_success(&self, instance: &SagaInstance, decision: Decision)
    -> Result<(), ReportError>;

    /// Record a failed saga after compensation ran.
    ///
    /// # Errors
    ///
    /// Returns an error if the outcome could not be persisted.
    fn report_failure(
        &self,
        instance: &SagaInstance,
        failure: &FailureReport,
    ) -> Result<(), ReportError>;
}

/// Append-only sink for decision records.
pub trait DecisionLog: Send + Sync {
    /// Append a record to the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be written.
    fn append(&self, record: DecisionRecord) -> Result<(), ReportError>;
}

impl<L: DecisionLog + ?Sized> DecisionLog for &L {
    fn append(&self, record: DecisionRecord) -> Result<(), ReportError> {
        (**self).append(record)
    }
}

/// Reports saga outcomes as decision records.
///
/// Failures are recorded as a `saga_failed` decision with zero confidence.
#[derive(Debug)]
pub struct DecisionLogReporter<L> {
    log: L,
}

impl<L: DecisionLog> DecisionLogReporter<L> {
    pub fn new(log: L) -> Self {
        Self { log }
    }

    pub fn log(&self) -> &L {
        &self.log
    }
}

impl<L: DecisionLog> OutcomeReporter for DecisionLogReporter<L> {
    fn report_success(
        &self,
        instance: &SagaInstance,
        decision: Decision,
    ) -> Result<(), ReportError> {
        self.log.append(DecisionRecord {
            saga_id: instance.id(),
            saga: instance.saga().to_string(),
            decision: decision.decision,
            reasoning: decision.reasoning,
            confidence: decision.confidence,
            timestamp: Utc::now(),
        })
    }

    fn report_failure(
        &self,
        instance: &SagaInstance,
        failure: &FailureReport,
    ) -> Result<(), ReportError> {
        self.log.append(DecisionRecord {
            saga_id: instance.id(),
            saga: instance.saga().to_string(),
            decision: "saga_failed".to_string(),
            reasoning: json!({
                "saga": instance.saga(),
                "error": failure.error,
                "failed_step": failure.failed_step,
                "compensated_steps": failure.compensated_steps,
                "failed_compensations": failure.failed_compensations,
            }),
            confidence: 0.0,
            timestamp: Utc::now(),
        })
    }
}

#[derive(Debug, Default)]
pub struct InMemoryDecisionLog {
    records: Mutex<Vec<DecisionRecord>>,
}

impl InMemoryDecisionLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn records(&self) -> Vec<DecisionRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DecisionLog for InMemoryDecisionLog {
    fn append(&self, record: DecisionRecord) -> Result<(), ReportError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }
}
