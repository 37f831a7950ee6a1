use std::sync::Arc;

use crate::traits::{IssuerService, LedgerService};

pub struct IssuanceContext<L, I> {
    ledger: Arc<L>,
    issuer: Arc<I>,
}

impl<L, I> Clone for IssuanceContext<L, I> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            issuer: Arc::clone(&self.issuer),
        }
    }
}

impl<L, I> IssuanceContext<L, I>
where
    L: LedgerService,
    I: IssuerService,
{
    pub fn new(ledger: Arc<L>, issuer: Arc<I>) -> Self {
        Self { ledger, issuer }
    }

    #[must_use]
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    #[must_use]
    pub fn issuer(&self) -> &I {
        &self.issuer
    }
}
