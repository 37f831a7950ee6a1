use rust_decimal::Decimal;
use serde::Serialize;

use crate::traits::Execution;
use crate::types::{LockId, Market, OrderId, TradeRequest};

/// Funds held back for the trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FundsLock {
    pub id: LockId,
    pub asset: String,
    pub amount: Decimal,
}

/// What the account received once the execution settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settlement {
    pub asset: String,
    pub amount: Decimal,
}

/// Data flowing through the trading saga. Each step fills in its part.
#[derive(Debug, Clone, Serialize)]
pub struct TradeData {
    pub request: TradeRequest,
    pub market: Option<Market>,
    pub quoted_price: Option<Decimal>,
    pub lock: Option<FundsLock>,
    pub order: Option<OrderId>,
    pub execution: Option<Execution>,
    pub settlement: Option<Settlement>,
    pub risk_orders_attached: bool,
}

impl TradeData {
    #[must_use]
    pub fn new(request: TradeRequest) -> Self {
        Self {
            request,
            market: None,
            quoted_price: None,
            lock: None,
            order: None,
            execution: None,
            settlement: None,
            risk_orders_attached: false,
        }
    }
}

impl From<TradeRequest> for TradeData {
    fn from(request: TradeRequest) -> Self {
        Self::new(request)
    }
}
