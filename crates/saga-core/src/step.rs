use serde::Serialize;

/// A step in a saga that can be executed and compensated.
///
/// Each step transforms an input into an output, with the ability to undo
/// its effects if a later step fails. The executor keeps a copy of the input
/// and the output and hands both back to [`compensate`](SagaStep::compensate)
/// on rollback.
///
/// # Type Parameters
///
/// - `Input`: Data received from the previous step (or saga entry point)
/// - `Output`: Data produced for the next step
/// - `Context`: Shared collaborators (ledger, exchange, ...) injected by the caller
/// - `Error`: The error type for step failures
pub trait SagaStep: Send + Sync {
    /// Data received from the previous step or saga entry point.
    type Input: Clone + Send + Serialize + 'static;

    /// Data produced for the next step.
    type Output: Clone + Send + Serialize + 'static;

    /// Shared context providing dependencies.
    type Context;

    /// Error type for step failures.
    type Error;

    /// Stable name used in logs, audit records and errors.
    fn name(&self) -> &'static str;

    /// Execute the step, transforming input into output.
    ///
    /// # Errors
    ///
    /// Returns an error if the step fails to complete. No compensation is
    /// registered for a failed step.
    fn execute(&self, ctx: &Self::Context, input: Self::Input)
    -> Result<Self::Output, Self::Error>;

    /// Compensate (undo) the step's effects.
    ///
    /// Called during rollback when a later step fails. Receives the original
    /// input that was passed to `execute()` and the output it returned, so
    /// identifiers created by the step (lock ids, order ids) can be undone.
    /// The default is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if compensation fails.
    fn compensate(
        &self,
        ctx: &Self::Context,
        input: Self::Input,
        output: Self::Output,
    ) -> Result<(), Self::Error> {
        let _ = (ctx, input, output);
        Ok(())
    }

    /// Whether a completed run of this step registers a compensation.
    ///
    /// Read-only steps (validation, lookups) return `false` so nothing is
    /// pushed onto the compensation stack for them.
    fn has_compensation(&self) -> bool {
        true
    }

    /// Human-readable description of what compensation will do.
    fn compensation_description(&self) -> String {
        format!("undo {}", self.name())
    }
}
