use rust_decimal::Decimal;
use saga_core::SagaStep;
use tracing::debug;

use super::context::IssuanceContext;
use super::data::IssuanceData;
use crate::error::FlowError;
use crate::sagas::{missing, provider_step};
use crate::traits::{IssuerService, LedgerService};

provider_step!(
    /// Runs the issuer's compliance check and confirms the account is
    /// verified on the ledger.
    VerifyComplianceStep<L, I>
);

impl<L, I> SagaStep for VerifyComplianceStep<L, I>
where
    L: LedgerService + 'static,
    I: IssuerService + 'static,
{
    type Input = IssuanceData;
    type Output = IssuanceData;
    type Context = IssuanceContext<L, I>;
    type Error = FlowError;

    fn name(&self) -> &'static str {
        "verify_compliance"
    }

    fn execute(
        &self,
        ctx: &Self::Context,
        input: Self::Input,
    ) -> Result<Self::Output, Self::Error> {
        let request = &input.request;
        for amount in [request.collateral_amount, request.mint_amount] {
            if amount <= Decimal::ZERO {
                return Err(FlowError::InvalidAmount(amount));
            }
        }

        let account = ctx.ledger().account(&request.account)?;
        if !account.verified {
            return Err(FlowError::AccountNotVerified(account.id));
        }
        ctx.issuer().verify_compliance(&request.account)?;
        debug!(account = %request.account, "compliance verified");

        Ok(input)
    }

    fn has_compensation(&self) -> bool {
        false
    }
}

provider_step!(LockCollateralStep<L, I>);

impl<L, I> SagaStep for LockCollateralStep<L, I>
where
    L: LedgerService + 'static,
    I: IssuerService + 'static,
{
    type Input = IssuanceData;
    type Output = IssuanceData;
    type Context = IssuanceContext<L, I>;
    type Error = FlowError;

    fn name(&self) -> &'static str {
        "lock_collateral"
    }

    fn execute(
        &self,
        ctx: &Self::Context,
        mut input: Self::Input,
    ) -> Result<Self::Output, Self::Error> {
        let request = &input.request;
        let lock = ctx.ledger().lock_funds(
            &request.account,
            &request.collateral_asset,
            request.collateral_amount,
        )?;
        debug!(
            %lock,
            asset = %request.collateral_asset,
            amount = %request.collateral_amount,
            "collateral locked"
        );

        input.collateral_lock = Some(lock);
        Ok(input)
    }

    fn compensate(
        &self,
        ctx: &Self::Context,
        _input: Self::Input,
        output: Self::Output,
    ) -> Result<(), Self::Error> {
        let lock = output
            .collateral_lock
            .ok_or_else(|| missing(self.name(), "collateral lock"))?;
        debug!(%lock, "releasing collateral");
        ctx.ledger().unlock_funds(&lock)
    }

    fn compensation_description(&self) -> String {
        "release the locked collateral".to_string()
    }
}

provider_step!(OpenPositionStep<L, I>);

impl<L, I> SagaStep for OpenPositionStep<L, I>
where
    L: LedgerService + 'static,
    I: IssuerService + 'static,
{
    type Input = IssuanceData;
    type Output = IssuanceData;
    type Context = IssuanceContext<L, I>;
    type Error = FlowError;

    fn name(&self) -> &'static str {
        "open_position"
    }

    fn execute(
        &self,
        ctx: &Self::Context,
        mut input: Self::Input,
    ) -> Result<Self::Output, Self::Error> {
        if input.collateral_lock.is_none() {
            return Err(missing(self.name(), "collateral lock"));
        }
        let request = &input.request;
        let position = ctx.issuer().open_position(
            &request.account,
            &request.stablecoin,
            &request.collateral_asset,
            request.collateral_amount,
        )?;
        debug!(%position, stablecoin = %request.stablecoin, "position opened");

        input.position = Some(position);
        Ok(input)
    }

    fn compensate(
        &self,
        ctx: &Self::Context,
        _input: Self::Input,
        output: Self::Output,
    ) -> Result<(), Self::Error> {
        let position = output
            .position
            .ok_or_else(|| missing(self.name(), "position"))?;
        debug!(%position, "closing position");
        ctx.issuer().close_position(&position)
    }

    fn compensation_description(&self) -> String {
        "close the collateral position".to_string()
    }
}

provider_step!(
    /// Mints against the position; the issuer enforces the minimum
    /// collateral ratio.
    MintStablecoinsStep<L, I>
);

impl<L, I> SagaStep for MintStablecoinsStep<L, I>
where
    L: LedgerService + 'static,
    I: IssuerService + 'static,
{
    type Input = IssuanceData;
    type Output = IssuanceData;
    type Context = IssuanceContext<L, I>;
    type Error = FlowError;

    fn name(&self) -> &'static str {
        "mint_stablecoins"
    }

    fn execute(
        &self,
        ctx: &Self::Context,
        mut input: Self::Input,
    ) -> Result<Self::Output, Self::Error> {
        let position = input
            .position
            .as_ref()
            .ok_or_else(|| missing(self.name(), "position"))?;

        let mint = ctx.issuer().mint(position, input.request.mint_amount)?;
        debug!(
            mint = %mint.id,
            amount = %mint.amount,
            ratio = %mint.collateral_ratio,
            "stablecoins minted"
        );

        input.mint = Some(mint);
        Ok(input)
    }

    fn compensate(
        &self,
        ctx: &Self::Context,
        _input: Self::Input,
        output: Self::Output,
    ) -> Result<(), Self::Error> {
        let mint = output.mint.ok_or_else(|| missing(self.name(), "mint"))?;
        debug!(mint = %mint.id, amount = %mint.amount, "burning minted stablecoins");
        ctx.issuer().burn(&mint.id)
    }

    fn compensation_description(&self) -> String {
        "burn the minted stablecoins".to_string()
    }
}

provider_step!(DepositStablecoinsStep<L, I>);

impl<L, I> SagaStep for DepositStablecoinsStep<L, I>
where
    L: LedgerService + 'static,
    I: IssuerService + 'static,
{
    type Input = IssuanceData;
    type Output = IssuanceData;
    type Context = IssuanceContext<L, I>;
    type Error = FlowError;

    fn name(&self) -> &'static str {
        "deposit_stablecoins"
    }

    fn execute(
        &self,
        ctx: &Self::Context,
        mut input: Self::Input,
    ) -> Result<Self::Output, Self::Error> {
        let mint = input
            .mint
            .as_ref()
            .ok_or_else(|| missing(self.name(), "mint"))?;

        ctx.ledger()
            .credit(&input.request.account, &mint.stablecoin, mint.amount)?;
        debug!(stablecoin = %mint.stablecoin, amount = %mint.amount, "stablecoins deposited");

        input.deposited = true;
        Ok(input)
    }

    fn compensate(
        &self,
        ctx: &Self::Context,
        _input: Self::Input,
        output: Self::Output,
    ) -> Result<(), Self::Error> {
        let mint = output.mint.ok_or_else(|| missing(self.name(), "mint"))?;
        debug!(stablecoin = %mint.stablecoin, amount = %mint.amount, "withdrawing deposited stablecoins");
        ctx.ledger()
            .debit(&output.request.account, &mint.stablecoin, mint.amount)
    }

    fn compensation_description(&self) -> String {
        "withdraw the deposited stablecoins".to_string()
    }
}
