use std::fmt::{Debug, Display};
use std::marker::PhantomData;

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, error, info, info_span, warn};

use crate::compensator::Compensator;
use crate::erased::ErasedStep;
use crate::error::SagaError;
use crate::events::{self, StepEvent, StepEventKind, StepEventSink};
use crate::instance::{SagaId, SagaInstance};
use crate::registry::CompensationRegistry;
use crate::reporter::{Decision, FailureReport, OutcomeReporter};
use crate::review::ReviewQueue;
use crate::value::ErasedValue;

type DecisionFn<Output> = Box<dyn Fn(&Output) -> Decision + Send + Sync>;

/// Collaborators and identity for a single run.
#[derive(Default, Clone, Copy)]
pub struct RunOptions<'r> {
    saga_id: Option<SagaId>,
    reporter: Option<&'r dyn OutcomeReporter>,
    review_queue: Option<&'r dyn ReviewQueue>,
    step_events: Option<&'r dyn StepEventSink>,
}

impl<'r> RunOptions<'r> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a caller-provided correlation id instead of a fresh one.
    #[must_use]
    pub fn with_saga_id(mut self, saga_id: SagaId) -> Self {
        self.saga_id = Some(saga_id);
        self
    }

    /// Send the terminal outcome to `reporter`.
    #[must_use]
    pub fn with_reporter(mut self, reporter: &'r dyn OutcomeReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Escalate failed compensations to `queue`.
    #[must_use]
    pub fn with_review_queue(mut self, queue: &'r dyn ReviewQueue) -> Self {
        self.review_queue = Some(queue);
        self
    }

    /// Publish step lifecycle events to `sink` as the run progresses.
    #[must_use]
    pub fn with_step_events(mut self, sink: &'r dyn StepEventSink) -> Self {
        self.step_events = Some(sink);
        self
    }
}

/// Result of a run together with its instance log.
#[derive(Debug)]
pub struct SagaRun<Output, Err: Debug> {
    pub result: Result<Output, SagaError<Err>>,
    pub instance: SagaInstance,
}

impl<Output, Err: Debug> SagaRun<Output, Err> {
    pub fn into_parts(self) -> (Result<Output, SagaError<Err>>, SagaInstance) {
        (self.result, self.instance)
    }
}

/// A compiled saga ready for execution.
///
/// Sagas execute a sequence of steps, where each step's output becomes the
/// next step's input. If any step fails, previously completed steps are
/// compensated in reverse order (LIFO). A saga holds no per-run state, so
/// one value can serve any number of concurrent runs.
pub struct Saga<Input, Output, Ctx, Err> {
    name: &'static str,
    steps: Vec<Box<dyn ErasedStep<Ctx, Err>>>,
    decide: DecisionFn<Output>,
    _phantom: PhantomData<fn(Input) -> Output>,
}

impl<Input, Output, Ctx, Err> Saga<Input, Output, Ctx, Err>
where
    Input: Clone + Send + Serialize + 'static,
    Output: Clone + Send + Serialize + 'static,
    Err: Debug + Display,
{
    pub(crate) fn from_steps(name: &'static str, steps: Vec<Box<dyn ErasedStep<Ctx, Err>>>) -> Self {
        Self {
            name,
            steps,
            decide: Box::new(move |output: &Output| default_decision(name, output)),
            _phantom: PhantomData,
        }
    }

    /// Replace the decision reported when the saga completes.
    #[must_use]
    pub fn with_decision<F>(mut self, decide: F) -> Self
    where
        F: Fn(&Output) -> Decision + Send + Sync + 'static,
    {
        self.decide = Box::new(decide);
        self
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Step names in execution order.
    #[must_use]
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    /// Execute the saga, returning the final output on success.
    ///
    /// On failure, compensates all previously completed steps in reverse order.
    ///
    /// # Errors
    ///
    /// Returns `SagaError::StepFailed` if a step fails and all compensations succeed.
    /// Returns `SagaError::CompensationFailed` if a step fails and some compensations also fail.
    pub fn execute(&self, ctx: &Ctx, input: Input) -> Result<Output, SagaError<Err>> {
        self.run(ctx, input, RunOptions::default()).result
    }

    /// Execute the saga and return both the result and the instance log.
    pub fn execute_with_audit(
        &self,
        ctx: &Ctx,
        input: Input,
    ) -> (Result<Output, SagaError<Err>>, SagaInstance) {
        self.run(ctx, input, RunOptions::default()).into_parts()
    }

    /// Execute the saga with the given collaborators.
    ///
    /// Exactly one outcome is sent to the configured reporter. A reporter
    /// error is logged and does not change the saga result.
    pub fn run(&self, ctx: &Ctx, input: Input, options: RunOptions<'_>) -> SagaRun<Output, Err> {
        let saga_id = options.saga_id.unwrap_or_default();
        let span = info_span!("saga", saga = self.name, saga_id = %saga_id);
        let _entered = span.enter();

        let mut instance = SagaInstance::new(saga_id, self.name);
        let mut registry = CompensationRegistry::new();
        info!(steps = self.steps.len(), "saga started");

        let mut current: Box<dyn ErasedValue> = Box::new(input);

        for (index, step) in self.steps.iter().enumerate() {
            let record = instance.record_start(step.name());
            debug!(step = step.name(), index, "executing step");

            let stored_input = step.has_compensation().then(|| current.clone_box());

            match step.execute_erased(ctx, current) {
                Ok(output) => {
                    let description = stored_input.map(|stored_input| {
                        let stored_output = output.clone_box();
                        let description = step.compensation_description();
                        let step: &dyn ErasedStep<Ctx, Err> = step.as_ref();
                        registry.register(record, step.name(), description.clone(), move |ctx: &Ctx| {
                            step.compensate_erased(ctx, stored_input, stored_output)
                        });
                        description
                    });
                    let snapshot = output.snapshot();
                    instance.record_success(snapshot.clone(), description);
                    events::publish(
                        options.step_events,
                        StepEvent::new(
                            saga_id,
                            self.name,
                            step.name(),
                            record,
                            StepEventKind::Executed,
                        )
                        .with_result(snapshot),
                    );
                    debug!(step = step.name(), index, "step completed");
                    current = output;
                }
                Err(err) => {
                    warn!(step = step.name(), index, error = %err, "step failed");
                    instance.record_failure(err.to_string());
                    events::publish(
                        options.step_events,
                        StepEvent::new(
                            saga_id,
                            self.name,
                            step.name(),
                            record,
                            StepEventKind::Failed,
                        )
                        .with_error(err.to_string()),
                    );

                    let mut compensator = Compensator::new();
                    if let Some(queue) = options.review_queue {
                        compensator = compensator.with_review_queue(queue);
                    }
                    if let Some(sink) = options.step_events {
                        compensator = compensator.with_step_events(sink);
                    }
                    let compensation_errors =
                        compensator.compensate(ctx, &mut registry, &mut instance);

                    self.report_failure(&instance, options.reporter);

                    let failed_step = step.name().to_string();
                    let saga_error = if compensation_errors.is_empty() {
                        SagaError::StepFailed {
                            saga_id,
                            step: failed_step,
                            source: err,
                        }
                    } else {
                        SagaError::CompensationFailed {
                            saga_id,
                            failed_step,
                            step_error: err,
                            compensation_errors,
                        }
                    };
                    return SagaRun {
                        result: Err(saga_error),
                        instance,
                    };
                }
            }
        }

        let output = *current
            .into_any()
            .downcast::<Output>()
            .expect("type-state builder guarantees final output type");
        instance.complete();
        info!("saga completed");

        if let Some(reporter) = options.reporter {
            let decision = (self.decide)(&output);
            if let Err(report_error) = reporter.report_success(&instance, decision) {
                error!(error = %report_error, "failed to report saga success");
            }
        }

        SagaRun {
            result: Ok(output),
            instance,
        }
    }

    fn report_failure(&self, instance: &SagaInstance, reporter: Option<&dyn OutcomeReporter>) {
        let Some(reporter) = reporter else {
            return;
        };
        let failure = FailureReport {
            failed_step: instance.failed_step().unwrap_or_default().to_string(),
            error: instance.error().unwrap_or_default().to_string(),
            compensated_steps: instance.compensated_steps(),
            failed_compensations: instance.failed_compensations(),
        };
        if let Err(report_error) = reporter.report_failure(instance, &failure) {
            error!(saga = self.name, error = %report_error, "failed to report saga failure");
        }
    }
}

fn default_decision<Output: Serialize>(saga: &str, output: &Output) -> Decision {
    let output = serde_json::to_value(output).unwrap_or(Value::Null);
    Decision::new(
        format!("{saga}_completed"),
        json!({ "saga": saga, "output": output }),
        1.0,
    )
}
