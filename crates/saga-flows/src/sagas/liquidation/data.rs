use rust_decimal::Decimal;
use serde::Serialize;

use crate::types::LiquidationRequest;

/// What the position owes and holds at the moment it was assessed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assessment {
    pub owner: String,
    pub stablecoin: String,
    pub collateral_asset: String,
    pub collateral_amount: Decimal,
    pub collateral_price: Decimal,
    pub collateral_ratio: Decimal,
    pub debt: Decimal,
    pub penalty: Decimal,
    /// Debt plus penalty, paid by the liquidator.
    pub amount_due: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct LiquidationData {
    pub request: LiquidationRequest,
    pub assessment: Option<Assessment>,
    pub frozen: bool,
    pub payment_collected: bool,
    pub collateral_seized: bool,
    pub penalty_paid: bool,
    pub settled: bool,
}

impl LiquidationData {
    #[must_use]
    pub fn new(request: LiquidationRequest) -> Self {
        Self {
            request,
            assessment: None,
            frozen: false,
            payment_collected: false,
            collateral_seized: false,
            penalty_paid: false,
            settled: false,
        }
    }
}

impl From<LiquidationRequest> for LiquidationData {
    fn from(request: LiquidationRequest) -> Self {
        Self::new(request)
    }
}
