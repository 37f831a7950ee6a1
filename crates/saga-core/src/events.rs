use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

use crate::error::ReportError;
use crate::instance::SagaId;

/// What happened to a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum StepEventKind {
    Executed,
    Failed,
    Compensated,
    CompensationFailed,
}

/// Lifecycle event for one step of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepEvent {
    pub saga_id: SagaId,
    pub saga: String,
    pub step: String,
    /// Position of the step's record in the instance log.
    pub index: usize,
    pub kind: StepEventKind,
    /// Output snapshot of an executed step.
    pub result: Option<Value>,
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

impl StepEvent {
    pub(crate) fn new(
        saga_id: SagaId,
        saga: &str,
        step: &str,
        index: usize,
        kind: StepEventKind,
    ) -> Self {
        Self {
            saga_id,
            saga: saga.to_string(),
            step: step.to_string(),
            index,
            kind,
            result: None,
            error: None,
            at: Utc::now(),
        }
    }

    pub(crate) fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    pub(crate) fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Receives step lifecycle events while a saga runs.
///
/// Events arrive in the order they happen: executed steps in execution
/// order, then the failing step, then compensations in LIFO order.
pub trait StepEventSink: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the sink cannot accept the event. The run logs
    /// it and carries on.
    fn publish(&self, event: StepEvent) -> Result<(), ReportError>;
}

pub(crate) fn publish(sink: Option<&dyn StepEventSink>, event: StepEvent) {
    let Some(sink) = sink else {
        return;
    };
    let step = event.step.clone();
    if let Err(err) = sink.publish(event) {
        error!(step = %step, error = %err, "failed to publish step event");
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStepEvents {
    events: Mutex<Vec<StepEvent>>,
}

impl InMemoryStepEvents {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<StepEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl StepEventSink for InMemoryStepEvents {
    fn publish(&self, event: StepEvent) -> Result<(), ReportError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ClosedSink;

    impl StepEventSink for ClosedSink {
        fn publish(&self, _event: StepEvent) -> Result<(), ReportError> {
            Err(ReportError::Unavailable("event bus".to_string()))
        }
    }

    #[test]
    fn publish_without_sink_is_a_no_op() {
        publish(
            None,
            StepEvent::new(
                SagaId::new(),
                "trading_execution",
                "lock_funds",
                1,
                StepEventKind::Executed,
            ),
        );
    }

    #[test]
    fn sink_errors_are_swallowed() {
        publish(
            Some(&ClosedSink),
            StepEvent::new(
                SagaId::new(),
                "trading_execution",
                "lock_funds",
                1,
                StepEventKind::Executed,
            ),
        );
    }

    #[test]
    fn in_memory_sink_keeps_events_in_order() {
        let sink = InMemoryStepEvents::new();
        let saga_id = SagaId::new();

        publish(
            Some(&sink),
            StepEvent::new(
                saga_id,
                "stablecoin_issuance",
                "mint_stablecoins",
                3,
                StepEventKind::Executed,
            )
            .with_result(Value::from("mint_0001")),
        );
        publish(
            Some(&sink),
            StepEvent::new(
                saga_id,
                "stablecoin_issuance",
                "mint_stablecoins",
                3,
                StepEventKind::CompensationFailed,
            )
            .with_error("custodian offline"),
        );

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, StepEventKind::Executed);
        assert_eq!(events[0].result, Some(Value::from("mint_0001")));
        assert_eq!(events[1].kind, StepEventKind::CompensationFailed);
        assert_eq!(events[1].error.as_deref(), Some("custodian offline"));
    }

    #[test]
    fn events_serialize_with_snake_case_kind() -> anyhow::Result<()> {
        let event = StepEvent::new(
            SagaId::new(),
            "trading_execution",
            "create_order",
            2,
            StepEventKind::CompensationFailed,
        );

        let json = serde_json::to_value(&event)?;

        assert_eq!(json["kind"], "compensation_failed");
        assert_eq!(json["index"], 2);
        Ok(())
    }
}
