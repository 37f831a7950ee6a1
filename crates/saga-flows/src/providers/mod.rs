mod decision_log;
mod exchange;
mod faults;
mod issuer;
mod ledger;

pub use decision_log::JsonlDecisionLog;
pub use exchange::{DEFAULT_FEE_RATE, InMemoryExchange};
pub use faults::FaultPlan;
pub use issuer::{DEFAULT_MINIMUM_RATIO, InMemoryIssuer};
pub use ledger::InMemoryLedger;
