use std::fmt::{Debug, Display};

use chrono::Utc;
use tracing::{debug, error, info};

use crate::error::CompensationError;
use crate::events::{self, StepEvent, StepEventKind, StepEventSink};
use crate::instance::SagaInstance;
use crate::registry::CompensationRegistry;
use crate::review::{ReviewItem, ReviewQueue};

/// Drains a compensation registry, best effort.
///
/// Each reverse action runs inside its own error boundary: a failure is
/// logged, recorded on the instance, escalated to the review queue when one
/// is configured, and the loop moves on to the next entry. Nothing is
/// retried.
#[derive(Default)]
pub struct Compensator<'r> {
    review_queue: Option<&'r dyn ReviewQueue>,
    step_events: Option<&'r dyn StepEventSink>,
}

impl<'r> Compensator<'r> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Escalate failed compensations to `queue`.
    #[must_use]
    pub fn with_review_queue(mut self, queue: &'r dyn ReviewQueue) -> Self {
        self.review_queue = Some(queue);
        self
    }

    /// Publish a `Compensated` or `CompensationFailed` event per entry.
    #[must_use]
    pub fn with_step_events(mut self, sink: &'r dyn StepEventSink) -> Self {
        self.step_events = Some(sink);
        self
    }

    /// Run every registered compensation in LIFO order.
    ///
    /// Moves the instance through `Compensating` to `Compensated`, or to
    /// `Failed` when at least one reverse action failed. Returns the failed
    /// compensations; the registry is empty afterwards.
    pub fn compensate<Ctx, Err>(
        &self,
        ctx: &Ctx,
        registry: &mut CompensationRegistry<'_, Ctx, Err>,
        instance: &mut SagaInstance,
    ) -> Vec<CompensationError<Err>>
    where
        Err: Debug + Display,
    {
        instance.begin_compensation();
        info!(
            saga_id = %instance.id(),
            pending = registry.len(),
            "compensating completed steps"
        );

        let mut failures = Vec::new();
        while let Some(entry) = registry.pop() {
            let record = entry.record();
            let step = entry.step().to_string();
            let description = entry.description().to_string();
            debug!(saga_id = %instance.id(), step = %step, "running compensation");

            match entry.run(ctx) {
                Ok(()) => {
                    instance.record_compensated(record);
                    events::publish(
                        self.step_events,
                        StepEvent::new(
                            instance.id(),
                            instance.saga(),
                            &step,
                            record,
                            StepEventKind::Compensated,
                        ),
                    );
                    debug!(saga_id = %instance.id(), step = %step, "step compensated");
                }
                Err(err) => {
                    error!(
                        saga_id = %instance.id(),
                        step = %step,
                        error = %err,
                        "compensation failed, continuing with remaining steps"
                    );
                    instance.record_compensation_failed(record, err.to_string());
                    events::publish(
                        self.step_events,
                        StepEvent::new(
                            instance.id(),
                            instance.saga(),
                            &step,
                            record,
                            StepEventKind::CompensationFailed,
                        )
                        .with_error(err.to_string()),
                    );
                    self.escalate(instance, &step, &description, &err);
                    failures.push(CompensationError {
                        step,
                        description,
                        error: err,
                    });
                }
            }
        }

        instance.finish_compensation(failures.is_empty());
        info!(
            saga_id = %instance.id(),
            status = %instance.status(),
            failed = failures.len(),
            "compensation finished"
        );
        failures
    }

    fn escalate<Err: Display>(
        &self,
        instance: &SagaInstance,
        step: &str,
        description: &str,
        err: &Err,
    ) {
        let Some(queue) = self.review_queue else {
            return;
        };
        let item = ReviewItem {
            saga_id: instance.id(),
            saga: instance.saga().to_string(),
            step: step.to_string(),
            description: description.to_string(),
            error: err.to_string(),
            raised_at: Utc::now(),
        };
        if let Err(queue_error) = queue.enqueue(item) {
            error!(
                saga_id = %instance.id(),
                step,
                error = %queue_error,
                "failed to escalate compensation failure for review"
            );
        }
    }
}
