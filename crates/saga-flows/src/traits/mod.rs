mod exchange;
mod issuer;
mod ledger;

pub use exchange::{Execution, ExchangeService, NewOrder, OrderSnapshot, OrderStatus};
pub use issuer::{IssuerService, Mint, PositionSnapshot, PositionStatus};
pub use ledger::{AccountSnapshot, Balance, LedgerService, LockStatus};
