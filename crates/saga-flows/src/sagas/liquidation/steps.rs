use rust_decimal::Decimal;
use saga_core::SagaStep;
use tracing::{debug, warn};

use super::LIQUIDATION_PENALTY;
use super::context::LiquidationContext;
use super::data::{Assessment, LiquidationData};
use crate::checked;
use crate::error::FlowError;
use crate::sagas::{missing, provider_step};
use crate::traits::{IssuerService, LedgerService, PositionStatus};

fn assessment<'a>(data: &'a LiquidationData, step: &'static str) -> Result<&'a Assessment, FlowError> {
    data.assessment
        .as_ref()
        .ok_or_else(|| missing(step, "assessment"))
}

provider_step!(
    /// Confirms the position is open and below the minimum collateral
    /// ratio, then prices the debt and penalty. Reads only.
    AssessPositionStep<L, I>
);

impl<L, I> SagaStep for AssessPositionStep<L, I>
where
    L: LedgerService + 'static,
    I: IssuerService + 'static,
{
    type Input = LiquidationData;
    type Output = LiquidationData;
    type Context = LiquidationContext<L, I>;
    type Error = FlowError;

    fn name(&self) -> &'static str {
        "assess_position"
    }

    fn execute(
        &self,
        ctx: &Self::Context,
        mut input: Self::Input,
    ) -> Result<Self::Output, Self::Error> {
        let request = &input.request;
        ctx.ledger().account(&request.liquidator)?;
        ctx.ledger().account(&request.treasury)?;

        let position = ctx.issuer().position(&request.position)?;
        if position.status != PositionStatus::Open {
            return Err(FlowError::PositionState {
                position: position.id,
                state: position.status.as_str(),
                action: "liquidate",
            });
        }
        if position.minted <= Decimal::ZERO {
            return Err(FlowError::PositionState {
                position: position.id,
                state: position.status.as_str(),
                action: "liquidate without debt",
            });
        }

        let price = ctx.issuer().collateral_price(&position.collateral_asset)?;
        let minimum = ctx.issuer().minimum_ratio();
        let value = checked::mul(position.collateral_amount, price, "collateral value")?;
        let ratio = checked::div(value, position.minted, "collateral ratio")?.round_dp(4);
        if ratio >= minimum {
            return Err(FlowError::PositionHealthy {
                position: position.id,
                ratio,
                minimum,
            });
        }

        let debt = position.minted;
        let penalty = checked::mul(debt, LIQUIDATION_PENALTY, "liquidation penalty")?
            .round_dp(8)
            .normalize();
        let amount_due = checked::add(debt, penalty, "amount due")?;
        debug!(
            position = %position.id,
            %ratio,
            %minimum,
            %debt,
            %penalty,
            "position eligible for liquidation"
        );

        input.assessment = Some(Assessment {
            owner: position.account,
            stablecoin: position.stablecoin,
            collateral_asset: position.collateral_asset,
            collateral_amount: position.collateral_amount,
            collateral_price: price,
            collateral_ratio: ratio,
            debt,
            penalty,
            amount_due,
        });
        Ok(input)
    }

    fn has_compensation(&self) -> bool {
        false
    }
}

provider_step!(FreezePositionStep<L, I>);

impl<L, I> SagaStep for FreezePositionStep<L, I>
where
    L: LedgerService + 'static,
    I: IssuerService + 'static,
{
    type Input = LiquidationData;
    type Output = LiquidationData;
    type Context = LiquidationContext<L, I>;
    type Error = FlowError;

    fn name(&self) -> &'static str {
        "freeze_position"
    }

    fn execute(
        &self,
        ctx: &Self::Context,
        mut input: Self::Input,
    ) -> Result<Self::Output, Self::Error> {
        assessment(&input, self.name())?;
        ctx.issuer().freeze_position(&input.request.position)?;
        debug!(position = %input.request.position, "position frozen for liquidation");

        input.frozen = true;
        Ok(input)
    }

    fn compensate(
        &self,
        ctx: &Self::Context,
        _input: Self::Input,
        output: Self::Output,
    ) -> Result<(), Self::Error> {
        debug!(position = %output.request.position, "unfreezing position");
        ctx.issuer().unfreeze_position(&output.request.position)
    }

    fn compensation_description(&self) -> String {
        "unfreeze the position".to_string()
    }
}

provider_step!(
    /// Takes the debt plus penalty from the liquidator's stablecoin balance.
    CollectPaymentStep<L, I>
);

impl<L, I> SagaStep for CollectPaymentStep<L, I>
where
    L: LedgerService + 'static,
    I: IssuerService + 'static,
{
    type Input = LiquidationData;
    type Output = LiquidationData;
    type Context = LiquidationContext<L, I>;
    type Error = FlowError;

    fn name(&self) -> &'static str {
        "collect_payment"
    }

    fn execute(
        &self,
        ctx: &Self::Context,
        mut input: Self::Input,
    ) -> Result<Self::Output, Self::Error> {
        let assessment = assessment(&input, self.name())?;
        ctx.ledger().debit(
            &input.request.liquidator,
            &assessment.stablecoin,
            assessment.amount_due,
        )?;
        debug!(
            liquidator = %input.request.liquidator,
            amount = %assessment.amount_due,
            "liquidation payment collected"
        );

        input.payment_collected = true;
        Ok(input)
    }

    fn compensate(
        &self,
        ctx: &Self::Context,
        _input: Self::Input,
        output: Self::Output,
    ) -> Result<(), Self::Error> {
        let assessment = assessment(&output, self.name())?;
        debug!(liquidator = %output.request.liquidator, amount = %assessment.amount_due, "refunding payment");
        ctx.ledger().credit(
            &output.request.liquidator,
            &assessment.stablecoin,
            assessment.amount_due,
        )
    }

    fn compensation_description(&self) -> String {
        "refund the liquidator's payment".to_string()
    }
}

provider_step!(
    /// Captures the owner's collateral lock and hands the collateral to the
    /// liquidator.
    SeizeCollateralStep<L, I>
);

impl<L, I> SagaStep for SeizeCollateralStep<L, I>
where
    L: LedgerService + 'static,
    I: IssuerService + 'static,
{
    type Input = LiquidationData;
    type Output = LiquidationData;
    type Context = LiquidationContext<L, I>;
    type Error = FlowError;

    fn name(&self) -> &'static str {
        "seize_collateral"
    }

    fn execute(
        &self,
        ctx: &Self::Context,
        mut input: Self::Input,
    ) -> Result<Self::Output, Self::Error> {
        let assessment = assessment(&input, self.name())?;
        let lock = &input.request.collateral_lock;

        ctx.ledger().capture(lock)?;
        if let Err(err) = ctx.ledger().credit(
            &input.request.liquidator,
            &assessment.collateral_asset,
            assessment.collateral_amount,
        ) {
            // Nothing registers a compensation for a step that failed.
            if let Err(refund_err) = ctx.ledger().refund(lock) {
                warn!(%lock, error = %refund_err, "refund after failed credit also failed");
            }
            return Err(err);
        }
        debug!(
            %lock,
            asset = %assessment.collateral_asset,
            amount = %assessment.collateral_amount,
            "collateral seized"
        );

        input.collateral_seized = true;
        Ok(input)
    }

    fn compensate(
        &self,
        ctx: &Self::Context,
        _input: Self::Input,
        output: Self::Output,
    ) -> Result<(), Self::Error> {
        let assessment = assessment(&output, self.name())?;
        let lock = &output.request.collateral_lock;

        debug!(%lock, owner = %assessment.owner, "returning seized collateral");
        ctx.ledger().debit(
            &output.request.liquidator,
            &assessment.collateral_asset,
            assessment.collateral_amount,
        )?;
        ctx.ledger().refund(lock)
    }

    fn compensation_description(&self) -> String {
        "return the seized collateral to the owner".to_string()
    }
}

provider_step!(PayPenaltyStep<L, I>);

impl<L, I> SagaStep for PayPenaltyStep<L, I>
where
    L: LedgerService + 'static,
    I: IssuerService + 'static,
{
    type Input = LiquidationData;
    type Output = LiquidationData;
    type Context = LiquidationContext<L, I>;
    type Error = FlowError;

    fn name(&self) -> &'static str {
        "pay_penalty"
    }

    fn execute(
        &self,
        ctx: &Self::Context,
        mut input: Self::Input,
    ) -> Result<Self::Output, Self::Error> {
        let assessment = assessment(&input, self.name())?;
        if assessment.penalty.is_zero() {
            return Ok(input);
        }
        ctx.ledger().credit(
            &input.request.treasury,
            &assessment.stablecoin,
            assessment.penalty,
        )?;
        debug!(treasury = %input.request.treasury, penalty = %assessment.penalty, "penalty paid");

        input.penalty_paid = true;
        Ok(input)
    }

    fn compensate(
        &self,
        ctx: &Self::Context,
        _input: Self::Input,
        output: Self::Output,
    ) -> Result<(), Self::Error> {
        if !output.penalty_paid {
            return Ok(());
        }
        let assessment = assessment(&output, self.name())?;
        debug!(treasury = %output.request.treasury, penalty = %assessment.penalty, "reclaiming penalty");
        ctx.ledger().debit(
            &output.request.treasury,
            &assessment.stablecoin,
            assessment.penalty,
        )
    }

    fn compensation_description(&self) -> String {
        "reclaim the penalty from the treasury".to_string()
    }
}

provider_step!(
    /// Retires the position's supply. This is the commit point, so it
    /// registers no compensation.
    SettleDebtStep<L, I>
);

impl<L, I> SagaStep for SettleDebtStep<L, I>
where
    L: LedgerService + 'static,
    I: IssuerService + 'static,
{
    type Input = LiquidationData;
    type Output = LiquidationData;
    type Context = LiquidationContext<L, I>;
    type Error = FlowError;

    fn name(&self) -> &'static str {
        "settle_debt"
    }

    fn execute(
        &self,
        ctx: &Self::Context,
        mut input: Self::Input,
    ) -> Result<Self::Output, Self::Error> {
        let assessment = assessment(&input, self.name())?;
        if !input.collateral_seized {
            return Err(missing(self.name(), "seized collateral"));
        }
        ctx.issuer().settle_liquidation(&input.request.position)?;
        debug!(position = %input.request.position, debt = %assessment.debt, "debt settled");

        input.settled = true;
        Ok(input)
    }

    fn has_compensation(&self) -> bool {
        false
    }
}
