//! Saga orchestration with LIFO compensation.
//!
//! A saga runs an ordered list of steps. Each step's output becomes the next
//! step's input, and every completed step that declares a compensation pushes
//! a reverse action onto a per-run registry. When a step fails the registry
//! is drained in reverse order, best effort, and exactly one terminal outcome
//! is handed to an [`OutcomeReporter`].
//!
//! The pieces are usable on their own: [`CompensationRegistry`] and
//! [`Compensator`] work with arbitrary closures, while [`SagaBuilder`] wires
//! them behind a type-checked step pipeline.

mod builder;
mod compensator;
mod erased;
mod error;
mod events;
mod instance;
mod registry;
mod reporter;
mod review;
mod saga;
mod step;
mod value;

pub use builder::{Empty, HasSteps, SagaBuilder};
pub use compensator::Compensator;
pub use error::{CompensationError, ReportError, SagaError};
pub use events::{InMemoryStepEvents, StepEvent, StepEventKind, StepEventSink};
pub use instance::{SagaId, SagaInstance, SagaStatus, StepRecord, StepStatus};
pub use registry::{CompensationAction, CompensationEntry, CompensationRegistry};
pub use reporter::{
    Decision, DecisionLog, DecisionLogReporter, DecisionRecord, FailureReport,
    InMemoryDecisionLog, OutcomeReporter,
};
pub use review::{InMemoryReviewQueue, ReviewItem, ReviewQueue};
pub use saga::{RunOptions, Saga, SagaRun};
pub use step::SagaStep;
