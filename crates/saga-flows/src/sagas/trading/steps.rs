use rust_decimal::Decimal;
use saga_core::SagaStep;
use tracing::{debug, warn};

use super::context::TradingContext;
use super::data::{FundsLock, Settlement, TradeData};
use crate::checked;
use crate::error::FlowError;
use crate::sagas::{missing, provider_step};
use crate::traits::{ExchangeService, LedgerService, NewOrder};
use crate::types::{Market, Side};

provider_step!(
    /// Checks the account is verified and the market is listed.
    ValidateAccountStep<L, X>
);

impl<L, X> SagaStep for ValidateAccountStep<L, X>
where
    L: LedgerService + 'static,
    X: ExchangeService + 'static,
{
    type Input = TradeData;
    type Output = TradeData;
    type Context = TradingContext<L, X>;
    type Error = FlowError;

    fn name(&self) -> &'static str {
        "validate_account"
    }

    fn execute(
        &self,
        ctx: &Self::Context,
        mut input: Self::Input,
    ) -> Result<Self::Output, Self::Error> {
        let request = &input.request;
        let account = ctx.ledger().account(&request.account)?;
        if !account.verified {
            return Err(FlowError::AccountNotVerified(account.id));
        }
        if request.amount <= Decimal::ZERO {
            return Err(FlowError::InvalidAmount(request.amount));
        }

        let market: Market = request.symbol.parse()?;
        let price = ctx.exchange().price(&market.symbol())?;
        debug!(account = %account.id, %market, %price, "account validated");

        input.market = Some(market);
        input.quoted_price = Some(price);
        Ok(input)
    }

    fn has_compensation(&self) -> bool {
        false
    }
}

provider_step!(LockFundsStep<L, X>);

impl<L, X> SagaStep for LockFundsStep<L, X>
where
    L: LedgerService + 'static,
    X: ExchangeService + 'static,
{
    type Input = TradeData;
    type Output = TradeData;
    type Context = TradingContext<L, X>;
    type Error = FlowError;

    fn name(&self) -> &'static str {
        "lock_funds"
    }

    fn execute(
        &self,
        ctx: &Self::Context,
        mut input: Self::Input,
    ) -> Result<Self::Output, Self::Error> {
        let market = input
            .market
            .as_ref()
            .ok_or_else(|| missing(self.name(), "market"))?;
        let side = input.request.side;
        let asset = market.spent_asset(side).to_string();

        let amount = match side {
            Side::Buy => input.request.amount,
            Side::Sell => {
                let price = input
                    .quoted_price
                    .ok_or_else(|| missing(self.name(), "quoted price"))?;
                checked::div(input.request.amount, price, "base amount to sell")?.round_dp(8)
            }
        };

        let id = ctx
            .ledger()
            .lock_funds(&input.request.account, &asset, amount)?;
        debug!(lock = %id, %asset, %amount, "locked funds for trade");

        input.lock = Some(FundsLock { id, asset, amount });
        Ok(input)
    }

    fn compensate(
        &self,
        ctx: &Self::Context,
        _input: Self::Input,
        output: Self::Output,
    ) -> Result<(), Self::Error> {
        let lock = output.lock.ok_or_else(|| missing(self.name(), "lock"))?;
        debug!(lock = %lock.id, amount = %lock.amount, "releasing locked funds");
        ctx.ledger().unlock_funds(&lock.id)
    }

    fn compensation_description(&self) -> String {
        "release the funds locked for the trade".to_string()
    }
}

provider_step!(CreateOrderStep<L, X>);

impl<L, X> SagaStep for CreateOrderStep<L, X>
where
    L: LedgerService + 'static,
    X: ExchangeService + 'static,
{
    type Input = TradeData;
    type Output = TradeData;
    type Context = TradingContext<L, X>;
    type Error = FlowError;

    fn name(&self) -> &'static str {
        "create_order"
    }

    fn execute(
        &self,
        ctx: &Self::Context,
        mut input: Self::Input,
    ) -> Result<Self::Output, Self::Error> {
        if input.lock.is_none() {
            return Err(missing(self.name(), "lock"));
        }
        let market = input
            .market
            .as_ref()
            .ok_or_else(|| missing(self.name(), "market"))?;

        let order = ctx.exchange().create_order(NewOrder {
            account: input.request.account.clone(),
            symbol: market.symbol(),
            side: input.request.side,
            notional: input.request.amount,
        })?;
        debug!(%order, "order created");

        input.order = Some(order);
        Ok(input)
    }

    fn compensate(
        &self,
        ctx: &Self::Context,
        _input: Self::Input,
        output: Self::Output,
    ) -> Result<(), Self::Error> {
        let order = output.order.ok_or_else(|| missing(self.name(), "order"))?;
        debug!(%order, "cancelling order");
        ctx.exchange().cancel_order(&order)
    }

    fn compensation_description(&self) -> String {
        "cancel the exchange order".to_string()
    }
}

provider_step!(ExecuteOrderStep<L, X>);

impl<L, X> SagaStep for ExecuteOrderStep<L, X>
where
    L: LedgerService + 'static,
    X: ExchangeService + 'static,
{
    type Input = TradeData;
    type Output = TradeData;
    type Context = TradingContext<L, X>;
    type Error = FlowError;

    fn name(&self) -> &'static str {
        "execute_order"
    }

    fn execute(
        &self,
        ctx: &Self::Context,
        mut input: Self::Input,
    ) -> Result<Self::Output, Self::Error> {
        let order = input
            .order
            .as_ref()
            .ok_or_else(|| missing(self.name(), "order"))?;

        let execution = ctx.exchange().execute_order(order)?;
        debug!(
            execution = %execution.id,
            price = %execution.price,
            quantity = %execution.quantity,
            fee = %execution.fee,
            "order filled"
        );

        input.execution = Some(execution);
        Ok(input)
    }

    fn compensate(
        &self,
        ctx: &Self::Context,
        _input: Self::Input,
        output: Self::Output,
    ) -> Result<(), Self::Error> {
        let execution = output
            .execution
            .ok_or_else(|| missing(self.name(), "execution"))?;
        debug!(execution = %execution.id, "reversing execution");
        ctx.exchange().reverse_execution(&execution.id)
    }

    fn compensation_description(&self) -> String {
        "reverse the order execution".to_string()
    }
}

provider_step!(
    /// Moves the locked funds out of the account and credits what the trade
    /// acquired.
    UpdatePortfolioStep<L, X>
);

impl<L, X> SagaStep for UpdatePortfolioStep<L, X>
where
    L: LedgerService + 'static,
    X: ExchangeService + 'static,
{
    type Input = TradeData;
    type Output = TradeData;
    type Context = TradingContext<L, X>;
    type Error = FlowError;

    fn name(&self) -> &'static str {
        "update_portfolio"
    }

    fn execute(
        &self,
        ctx: &Self::Context,
        mut input: Self::Input,
    ) -> Result<Self::Output, Self::Error> {
        let lock = input
            .lock
            .as_ref()
            .ok_or_else(|| missing(self.name(), "lock"))?;
        let execution = input
            .execution
            .as_ref()
            .ok_or_else(|| missing(self.name(), "execution"))?;
        let market = input
            .market
            .as_ref()
            .ok_or_else(|| missing(self.name(), "market"))?;

        let settlement = Settlement {
            asset: market.acquired_asset(input.request.side).to_string(),
            amount: execution.proceeds()?,
        };

        ctx.ledger().capture(&lock.id)?;
        if let Err(err) =
            ctx.ledger()
                .credit(&input.request.account, &settlement.asset, settlement.amount)
        {
            // The step never completed, so nothing else will put the captured
            // funds back.
            if let Err(refund_err) = ctx.ledger().refund(&lock.id) {
                warn!(lock = %lock.id, error = %refund_err, "refund after failed credit also failed");
            }
            return Err(err);
        }
        debug!(
            asset = %settlement.asset,
            amount = %settlement.amount,
            "portfolio updated"
        );

        input.settlement = Some(settlement);
        Ok(input)
    }

    fn compensate(
        &self,
        ctx: &Self::Context,
        _input: Self::Input,
        output: Self::Output,
    ) -> Result<(), Self::Error> {
        let lock = output
            .lock
            .as_ref()
            .ok_or_else(|| missing(self.name(), "lock"))?;
        let settlement = output
            .settlement
            .as_ref()
            .ok_or_else(|| missing(self.name(), "settlement"))?;

        debug!(asset = %settlement.asset, amount = %settlement.amount, "reverting portfolio update");
        ctx.ledger()
            .debit(&output.request.account, &settlement.asset, settlement.amount)?;
        ctx.ledger().refund(&lock.id)
    }

    fn compensation_description(&self) -> String {
        "debit the acquired asset and refund the captured funds".to_string()
    }
}

provider_step!(SetRiskManagementStep<L, X>);

impl<L, X> SagaStep for SetRiskManagementStep<L, X>
where
    L: LedgerService + 'static,
    X: ExchangeService + 'static,
{
    type Input = TradeData;
    type Output = TradeData;
    type Context = TradingContext<L, X>;
    type Error = FlowError;

    fn name(&self) -> &'static str {
        "set_risk_management"
    }

    fn execute(
        &self,
        ctx: &Self::Context,
        mut input: Self::Input,
    ) -> Result<Self::Output, Self::Error> {
        let execution = input
            .execution
            .as_ref()
            .ok_or_else(|| missing(self.name(), "execution"))?;

        ctx.exchange()
            .attach_risk_orders(&execution.id, &input.request.risk)?;
        debug!(
            stop_loss = %input.request.risk.stop_loss,
            take_profit = %input.request.risk.take_profit,
            "risk orders attached"
        );

        input.risk_orders_attached = true;
        Ok(input)
    }

    // Risk orders die with the execution they are attached to.
    fn has_compensation(&self) -> bool {
        false
    }
}
