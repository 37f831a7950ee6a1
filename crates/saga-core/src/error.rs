use std::fmt::Debug;

use thiserror::Error;

use crate::instance::SagaId;

/// Error from a failed compensation operation.
#[derive(Debug, thiserror::Error)]
#[error("compensation failed for step '{step}': {description}")]
pub struct CompensationError<E> {
    /// Name of the step whose compensation failed.
    pub step: String,
    /// Description of what the compensation was trying to do.
    pub description: String,
    /// The underlying error.
    #[source]
    pub error: E,
}

/// Error from saga execution.
///
/// Either variant embeds the original step error, reachable through
/// [`std::error::Error::source`] or [`SagaError::step_error`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SagaError<E: Debug> {
    /// A step failed and all compensations succeeded.
    #[error("saga {saga_id}: step '{step}' failed")]
    StepFailed {
        /// Correlation id of the failed run.
        saga_id: SagaId,
        /// Name of the step that failed.
        step: String,
        /// The error that caused the step to fail.
        #[source]
        source: E,
    },

    /// A step failed and some compensations also failed.
    #[error(
        "saga {saga_id}: step '{failed_step}' failed, and {} compensation(s) also failed",
        compensation_errors.len()
    )]
    CompensationFailed {
        /// Correlation id of the failed run.
        saga_id: SagaId,
        /// Name of the step that originally failed.
        failed_step: String,
        /// The error from the failed step.
        #[source]
        step_error: E,
        /// Errors from failed compensations.
        compensation_errors: Vec<CompensationError<E>>,
    },
}

impl<E: Debug> SagaError<E> {
    #[must_use]
    pub fn saga_id(&self) -> SagaId {
        match self {
            Self::StepFailed { saga_id, .. } | Self::CompensationFailed { saga_id, .. } => *saga_id,
        }
    }

    /// Name of the step whose failure triggered compensation.
    #[must_use]
    pub fn failed_step(&self) -> &str {
        match self {
            Self::StepFailed { step, .. } => step,
            Self::CompensationFailed { failed_step, .. } => failed_step,
        }
    }

    /// The original step error.
    #[must_use]
    pub fn step_error(&self) -> &E {
        match self {
            Self::StepFailed { source, .. } => source,
            Self::CompensationFailed { step_error, .. } => step_error,
        }
    }

    /// Compensations that failed during rollback; empty for `StepFailed`.
    #[must_use]
    pub fn compensation_errors(&self) -> &[CompensationError<E>] {
        match self {
            Self::StepFailed { .. } => &[],
            Self::CompensationFailed {
                compensation_errors,
                ..
            } => compensation_errors,
        }
    }

    /// Consume the error, returning the original step error.
    pub fn into_step_error(self) -> E {
        match self {
            Self::StepFailed { source, .. } => source,
            Self::CompensationFailed { step_error, .. } => step_error,
        }
    }
}

/// Error from an outcome sink (decision log or review queue).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportError {
    #[error("failed to write to {sink}")]
    Io {
        sink: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode record")]
    Encode(#[from] serde_json::Error),

    #[error("{0} is unavailable")]
    Unavailable(String),
}
