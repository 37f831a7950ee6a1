use rust_decimal::Decimal;
use serde::Serialize;

use crate::Result;
use crate::checked;
use crate::types::{ExecutionId, OrderId, RiskParameters, Side};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewOrder {
    pub account: String,
    pub symbol: String,
    pub side: Side,
    /// Order size in the quote asset.
    pub notional: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Executed,
    Cancelled,
    Reversed,
}

impl OrderStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Executed => "executed",
            Self::Cancelled => "cancelled",
            Self::Reversed => "reversed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSnapshot {
    pub id: OrderId,
    pub order: NewOrder,
    pub status: OrderStatus,
    pub execution: Option<ExecutionId>,
    pub risk: Option<RiskParameters>,
}

/// A fill of an order at the market price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub order: OrderId,
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    /// Base asset quantity filled.
    pub quantity: Decimal,
    /// Quote asset value of the fill.
    pub notional: Decimal,
    /// Fee charged in the quote asset.
    pub fee: Decimal,
}

impl Execution {
    /// Amount of the acquired asset the account receives after fees.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Overflow`](crate::FlowError::Overflow) when the
    /// bought quantity does not fit a `Decimal`.
    pub fn proceeds(&self) -> Result<Decimal> {
        let net = self.notional - self.fee;
        match self.side {
            Side::Buy => Ok(checked::div(net, self.price, "bought quantity")?.round_dp(8)),
            Side::Sell => Ok(net),
        }
    }
}

pub trait ExchangeService: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if no market exists for the symbol.
    fn price(&self, symbol: &str) -> Result<Decimal>;

    /// # Errors
    ///
    /// Returns an error if the market is unknown or the notional is not
    /// positive.
    fn create_order(&self, order: NewOrder) -> Result<OrderId>;

    /// Cancels a pending order. Cancelling a cancelled or reversed order
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the order is unknown or has been executed.
    fn cancel_order(&self, order: &OrderId) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the order is unknown or not pending.
    fn execute_order(&self, order: &OrderId) -> Result<Execution>;

    /// Unwinds an execution, leaving its order `Reversed`. Reversing twice
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the execution is unknown.
    fn reverse_execution(&self, execution: &ExecutionId) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the execution is unknown or the stop loss and
    /// take profit do not bracket the fill price.
    fn attach_risk_orders(&self, execution: &ExecutionId, risk: &RiskParameters) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the order is unknown.
    fn order(&self, order: &OrderId) -> Result<OrderSnapshot>;
}
