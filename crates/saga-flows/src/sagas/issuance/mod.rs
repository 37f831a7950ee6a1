//! Stablecoin issuance: lock collateral, open a position against it, mint
//! and deposit the stablecoins.

mod context;
mod data;
mod steps;

pub use context::IssuanceContext;
pub use data::IssuanceData;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use saga_core::{Decision, Saga, SagaBuilder};
use serde_json::json;
pub use steps::{
    DepositStablecoinsStep, LockCollateralStep, MintStablecoinsStep, OpenPositionStep,
    VerifyComplianceStep,
};

use crate::error::FlowError;
use crate::traits::{IssuerService, LedgerService};

pub const SAGA_NAME: &str = "stablecoin_issuance";

pub type IssuanceSaga<L, I> = Saga<IssuanceData, IssuanceData, IssuanceContext<L, I>, FlowError>;

/// Builds the issuance saga. `minimum_ratio` scales the confidence of the
/// success decision: a position at twice the minimum scores 1.0.
#[must_use]
pub fn issuance_saga<L, I>(minimum_ratio: Decimal) -> IssuanceSaga<L, I>
where
    L: LedgerService + 'static,
    I: IssuerService + 'static,
{
    SagaBuilder::new(SAGA_NAME)
        .first_step(VerifyComplianceStep::new())
        .then(LockCollateralStep::new())
        .then(OpenPositionStep::new())
        .then(MintStablecoinsStep::new())
        .then(DepositStablecoinsStep::new())
        .build()
        .with_decision(move |data: &IssuanceData| issuance_decision(data, minimum_ratio))
}

fn issuance_decision(data: &IssuanceData, minimum_ratio: Decimal) -> Decision {
    let ratio = data
        .mint
        .as_ref()
        .map_or(Decimal::ZERO, |mint| mint.collateral_ratio);
    let confidence = if minimum_ratio > Decimal::ZERO {
        // A target beyond the decimal range is never reached.
        minimum_ratio
            .checked_mul(Decimal::TWO)
            .and_then(|target| ratio.checked_div(target))
            .and_then(|score| score.to_f64())
            .unwrap_or(0.0)
    } else {
        1.0
    };

    Decision::new(
        "stablecoin_issued",
        json!({
            "account": data.request.account,
            "stablecoin": data.request.stablecoin,
            "collateral_asset": data.request.collateral_asset,
            "collateral_amount": data.request.collateral_amount,
            "minted": data.request.mint_amount,
            "position": data.position,
            "collateral_ratio": ratio,
            "minimum_ratio": minimum_ratio,
        }),
        confidence.min(1.0),
    )
}
