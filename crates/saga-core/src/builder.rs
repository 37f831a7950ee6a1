use std::fmt::{Debug, Display};
use std::marker::PhantomData;

use serde::Serialize;

use crate::erased::{ErasedStep, StepWrapper};
use crate::saga::Saga;
use crate::step::SagaStep;

/// State of a builder that has no steps yet.
pub struct Empty;

/// State of a builder whose last step produces `LastOutput`.
pub struct HasSteps<LastOutput>(PhantomData<LastOutput>);

/// Assembles a [`Saga`] one step at a time.
///
/// The `State` parameter tracks the output type of the last step, so a step
/// can only be appended when its input is that type. A pipeline where a lock
/// id is handed to a step expecting an amount is rejected by the compiler:
///
/// ```compile_fail
/// use saga_core::{SagaBuilder, SagaStep};
///
/// struct ReserveMargin;
/// impl SagaStep for ReserveMargin {
///     type Input = u64;
///     type Output = String;
///     type Context = ();
///     type Error = String;
///     fn name(&self) -> &'static str { "reserve_margin" }
///     fn execute(&self, _: &(), cents: u64) -> Result<String, String> {
///         Ok(format!("margin-{cents}"))
///     }
/// }
///
/// struct PlaceOrder;
/// impl SagaStep for PlaceOrder {
///     type Input = u64;
///     type Output = u64;
///     type Context = ();
///     type Error = String;
///     fn name(&self) -> &'static str { "place_order" }
///     fn execute(&self, _: &(), cents: u64) -> Result<u64, String> {
///         Ok(cents)
///     }
/// }
///
/// SagaBuilder::new("order")
///     .first_step(ReserveMargin)
///     .then(PlaceOrder)
///     .build();
/// ```
///
/// `build` only exists once a first step was added:
///
/// ```compile_fail
/// use saga_core::SagaBuilder;
///
/// SagaBuilder::<(), (), (), String, _>::new("nothing").build();
/// ```
pub struct SagaBuilder<Input, Output, Ctx, Err, State> {
    name: &'static str,
    steps: Vec<Box<dyn ErasedStep<Ctx, Err>>>,
    _phantom: PhantomData<fn(Input, State) -> Output>,
}

impl<Input, Output, Ctx, Err, State> SagaBuilder<Input, Output, Ctx, Err, State> {
    fn push<S, NextInput>(
        mut self,
        step: S,
    ) -> SagaBuilder<NextInput, S::Output, Ctx, Err, HasSteps<S::Output>>
    where
        S: SagaStep<Context = Ctx, Error = Err> + 'static,
    {
        self.steps.push(Box::new(StepWrapper::new(step)));
        SagaBuilder {
            name: self.name,
            steps: self.steps,
            _phantom: PhantomData,
        }
    }
}

impl<Ctx, Err> SagaBuilder<(), (), Ctx, Err, Empty> {
    /// `name` identifies the saga in logs, instance records and decisions.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            steps: Vec::new(),
            _phantom: PhantomData,
        }
    }

    /// Start the pipeline; the saga takes `S::Input`.
    #[must_use]
    pub fn first_step<S>(
        self,
        step: S,
    ) -> SagaBuilder<S::Input, S::Output, Ctx, Err, HasSteps<S::Output>>
    where
        S: SagaStep<Context = Ctx, Error = Err> + 'static,
    {
        self.push(step)
    }
}

impl<Input, CurrentOutput, Ctx, Err>
    SagaBuilder<Input, CurrentOutput, Ctx, Err, HasSteps<CurrentOutput>>
{
    /// Append a step consuming the previous step's output.
    #[must_use]
    pub fn then<S>(self, step: S) -> SagaBuilder<Input, S::Output, Ctx, Err, HasSteps<S::Output>>
    where
        S: SagaStep<Input = CurrentOutput, Context = Ctx, Error = Err> + 'static,
    {
        self.push(step)
    }

    #[must_use]
    pub fn build(self) -> Saga<Input, CurrentOutput, Ctx, Err>
    where
        Input: Clone + Send + Serialize + 'static,
        CurrentOutput: Clone + Send + Serialize + 'static,
        Err: Debug + Display,
    {
        Saga::from_steps(self.name, self.steps)
    }
}
