//! Collateral liquidation: freeze an undercollateralised position, collect
//! the debt plus penalty from a liquidator, hand over the collateral and
//! retire the position's supply.

mod context;
mod data;
mod steps;

pub use context::LiquidationContext;
pub use data::{Assessment, LiquidationData};
use rust_decimal::Decimal;
use saga_core::{Decision, Saga, SagaBuilder};
use serde_json::json;
pub use steps::{
    AssessPositionStep, CollectPaymentStep, FreezePositionStep, PayPenaltyStep,
    SeizeCollateralStep, SettleDebtStep,
};

use crate::error::FlowError;
use crate::traits::{IssuerService, LedgerService};

pub const SAGA_NAME: &str = "collateral_liquidation";

/// 13% of the debt, charged on top of it and paid to the treasury.
pub const LIQUIDATION_PENALTY: Decimal = Decimal::from_parts(13, 0, 0, false, 2);

pub type LiquidationSaga<L, I> =
    Saga<LiquidationData, LiquidationData, LiquidationContext<L, I>, FlowError>;

#[must_use]
pub fn liquidation_saga<L, I>() -> LiquidationSaga<L, I>
where
    L: LedgerService + 'static,
    I: IssuerService + 'static,
{
    SagaBuilder::new(SAGA_NAME)
        .first_step(AssessPositionStep::new())
        .then(FreezePositionStep::new())
        .then(CollectPaymentStep::new())
        .then(SeizeCollateralStep::new())
        .then(PayPenaltyStep::new())
        .then(SettleDebtStep::new())
        .build()
        .with_decision(liquidation_decision)
}

fn liquidation_decision(data: &LiquidationData) -> Decision {
    Decision::new(
        "collateral_liquidated",
        json!({
            "position": data.request.position,
            "liquidator": data.request.liquidator,
            "treasury": data.request.treasury,
            "assessment": data.assessment,
        }),
        1.0,
    )
}
