use crate::step::SagaStep;
use crate::value::ErasedValue;

pub(crate) trait ErasedStep<Ctx, Err>: Send + Sync {
    fn name(&self) -> &'static str;

    fn execute_erased(
        &self,
        ctx: &Ctx,
        input: Box<dyn ErasedValue>,
    ) -> Result<Box<dyn ErasedValue>, Err>;

    fn compensate_erased(
        &self,
        ctx: &Ctx,
        input: Box<dyn ErasedValue>,
        output: Box<dyn ErasedValue>,
    ) -> Result<(), Err>;

    fn has_compensation(&self) -> bool;

    fn compensation_description(&self) -> String;
}

pub(crate) struct StepWrapper<S> {
    step: S,
}

impl<S> StepWrapper<S> {
    pub(crate) fn new(step: S) -> Self {
        Self { step }
    }
}

impl<S> ErasedStep<S::Context, S::Error> for StepWrapper<S>
where
    S: SagaStep,
{
    fn name(&self) -> &'static str {
        self.step.name()
    }

    fn execute_erased(
        &self,
        ctx: &S::Context,
        input: Box<dyn ErasedValue>,
    ) -> Result<Box<dyn ErasedValue>, S::Error> {
        let typed_input = input
            .into_any()
            .downcast::<S::Input>()
            .expect("type-state builder guarantees correct input type");
        let output = self.step.execute(ctx, *typed_input)?;
        Ok(Box::new(output))
    }

    fn compensate_erased(
        &self,
        ctx: &S::Context,
        input: Box<dyn ErasedValue>,
        output: Box<dyn ErasedValue>,
    ) -> Result<(), S::Error> {
        let typed_input = input
            .into_any()
            .downcast::<S::Input>()
            .expect("compensation input was captured from this step's execution");
        let typed_output = output
            .into_any()
            .downcast::<S::Output>()
            .expect("compensation output was captured from this step's execution");
        self.step.compensate(ctx, *typed_input, *typed_output)
    }

    fn has_compensation(&self) -> bool {
        self.step.has_compensation()
    }

    fn compensation_description(&self) -> String {
        self.step.compensation_description()
    }
}
