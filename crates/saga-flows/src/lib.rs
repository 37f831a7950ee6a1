//! Trading, stablecoin issuance and collateral liquidation sagas over ledger, exchange and issuer
//! collaborators, with in-memory providers and TOML scenarios to drive them.

mod checked;
pub mod catalog;
mod error;
pub mod providers;
pub mod sagas;
pub mod scenario;
pub mod traits;
pub mod types;

pub use catalog::SagaKind;
pub use error::{FlowError, Result};
pub use scenario::{Scenario, ScenarioOutcome};
