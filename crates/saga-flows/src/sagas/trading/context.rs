use std::sync::Arc;

use crate::traits::{ExchangeService, LedgerService};

pub struct TradingContext<L, X> {
    ledger: Arc<L>,
    exchange: Arc<X>,
}

impl<L, X> Clone for TradingContext<L, X> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            exchange: Arc::clone(&self.exchange),
        }
    }
}

impl<L, X> TradingContext<L, X>
where
    L: LedgerService,
    X: ExchangeService,
{
    pub fn new(ledger: Arc<L>, exchange: Arc<X>) -> Self {
        Self { ledger, exchange }
    }

    #[must_use]
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    #[must_use]
    pub fn exchange(&self) -> &X {
        &self.exchange
    }
}
