//! Trading execution: lock funds, place and fill an order, settle it into the
//! portfolio and attach stop loss / take profit orders.

mod context;
mod data;
mod steps;

pub use context::TradingContext;
pub use data::{FundsLock, Settlement, TradeData};
use saga_core::{Decision, Saga, SagaBuilder};
use serde_json::json;
pub use steps::{
    CreateOrderStep, ExecuteOrderStep, LockFundsStep, SetRiskManagementStep, UpdatePortfolioStep,
    ValidateAccountStep,
};

use crate::error::FlowError;
use crate::traits::{ExchangeService, LedgerService};

pub const SAGA_NAME: &str = "trading_execution";

pub type TradingSaga<L, X> = Saga<TradeData, TradeData, TradingContext<L, X>, FlowError>;

#[must_use]
pub fn trading_saga<L, X>() -> TradingSaga<L, X>
where
    L: LedgerService + 'static,
    X: ExchangeService + 'static,
{
    SagaBuilder::new(SAGA_NAME)
        .first_step(ValidateAccountStep::new())
        .then(LockFundsStep::new())
        .then(CreateOrderStep::new())
        .then(ExecuteOrderStep::new())
        .then(UpdatePortfolioStep::new())
        .then(SetRiskManagementStep::new())
        .build()
        .with_decision(trade_decision)
}

fn trade_decision(data: &TradeData) -> Decision {
    Decision::new(
        "trade_executed",
        json!({
            "account": data.request.account,
            "symbol": data.request.symbol,
            "side": data.request.side,
            "order": data.order,
            "execution": data.execution,
            "settlement": data.settlement,
            "risk": data.request.risk,
        }),
        1.0,
    )
}
