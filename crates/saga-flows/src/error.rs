use std::path::PathBuf;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::{ExecutionId, LockId, MintId, OrderId, PositionId};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FlowError {
    #[error("unknown saga '{name}' (available: {available})")]
    UnknownSaga { name: String, available: String },

    #[error("invalid scenario: {0}")]
    Scenario(String),

    #[error("failed to read scenario '{path}'")]
    ScenarioRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse scenario")]
    ScenarioParse(#[from] toml::de::Error),

    #[error("account '{0}' not found")]
    UnknownAccount(String),

    #[error("account '{0}' already exists")]
    DuplicateAccount(String),

    #[error("account '{0}' is not verified")]
    AccountNotVerified(String),

    #[error(
        "insufficient {asset} in account '{account}': requested {requested}, available {available}"
    )]
    InsufficientFunds {
        account: String,
        asset: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("amount must be positive, got {0}")]
    InvalidAmount(Decimal),

    #[error("lock '{0}' not found")]
    UnknownLock(LockId),

    #[error("lock '{lock}' is {state}, cannot {action}")]
    LockState {
        lock: LockId,
        state: &'static str,
        action: &'static str,
    },

    #[error("invalid symbol '{0}', expected BASE/QUOTE")]
    InvalidSymbol(String),

    #[error("no market for '{0}'")]
    UnknownMarket(String),

    #[error("order '{0}' not found")]
    UnknownOrder(OrderId),

    #[error("order '{order}' is {state}, cannot {action}")]
    OrderState {
        order: OrderId,
        state: &'static str,
        action: &'static str,
    },

    #[error("execution '{0}' not found")]
    UnknownExecution(ExecutionId),

    #[error("invalid risk parameters: {0}")]
    InvalidRiskParameters(String),

    #[error("compliance check rejected account '{0}'")]
    ComplianceRejected(String),

    #[error("no price for collateral asset '{0}'")]
    UnknownCollateral(String),

    #[error("position '{0}' not found")]
    UnknownPosition(PositionId),

    #[error("position '{position}' is {state}, cannot {action}")]
    PositionState {
        position: PositionId,
        state: &'static str,
        action: &'static str,
    },

    #[error("mint '{0}' not found")]
    UnknownMint(MintId),

    #[error("collateral ratio {ratio} is below the minimum {minimum}")]
    Undercollateralized { ratio: Decimal, minimum: Decimal },

    #[error("position '{position}' has collateral ratio {ratio}, not below the minimum {minimum}")]
    PositionHealthy {
        position: PositionId,
        ratio: Decimal,
        minimum: Decimal,
    },

    #[error("step '{step}' ran without {field} from an earlier step")]
    MissingStepData {
        step: &'static str,
        field: &'static str,
    },

    #[error("amount overflow while computing {0}")]
    Overflow(&'static str),

    #[error("injected fault in '{0}'")]
    InjectedFault(String),

    #[error("{0} state is unavailable")]
    Poisoned(&'static str),
}

pub type Result<T> = std::result::Result<T, FlowError>;
