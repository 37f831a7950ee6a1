//! TOML scenario files: a seeded set of in-memory collaborators plus one
//! saga request to run against them.
//!
//! ```toml
//! saga = "trading_execution"
//!
//! [accounts.alice]
//! verified = true
//! balances = { USD = "100000" }
//!
//! [prices]
//! "BTC/USD" = "50000"
//!
//! [trade]
//! account = "alice"
//! symbol = "BTC/USD"
//! side = "buy"
//! amount = "10000"
//! risk = { stop_loss = "45000", take_profit = "60000" }
//!
//! [faults]
//! fail = ["execute_order"]
//! ```
//!
//! A `collateral_liquidation` scenario describes the position to liquidate
//! in a `[liquidation]` table instead. The owner's collateral is locked and
//! the position opened with its debt before any fault is armed.

use std::error::Error;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexMap;
use rust_decimal::Decimal;
use saga_core::{
    InMemoryStepEvents, OutcomeReporter, ReviewQueue, RunOptions, SagaId, SagaInstance,
    SagaStatus, StepEvent,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::Result;
use crate::catalog::SagaKind;
use crate::error::FlowError;
use crate::providers::{
    DEFAULT_MINIMUM_RATIO, FaultPlan, InMemoryExchange, InMemoryIssuer, InMemoryLedger,
};
use crate::sagas::issuance::{IssuanceContext, IssuanceData, issuance_saga};
use crate::sagas::liquidation::{LiquidationContext, LiquidationData, liquidation_saga};
use crate::sagas::trading::{TradeData, TradingContext, trading_saga};
use crate::traits::{AccountSnapshot, LedgerService};
use crate::types::{IssuanceRequest, LiquidationRequest, TradeRequest};

/// Provider operations a scenario may fail.
pub const FAULT_TARGETS: &[&str] = &[
    "lock_funds",
    "unlock_funds",
    "capture",
    "refund",
    "credit",
    "debit",
    "create_order",
    "cancel_order",
    "execute_order",
    "reverse_execution",
    "attach_risk_orders",
    "verify_compliance",
    "open_position",
    "close_position",
    "mint",
    "burn",
    "freeze_position",
    "unfreeze_position",
    "settle_liquidation",
];

fn default_verified() -> bool {
    true
}

fn default_minimum_ratio() -> Decimal {
    DEFAULT_MINIMUM_RATIO
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountConfig {
    #[serde(default = "default_verified")]
    pub verified: bool,
    #[serde(default)]
    pub balances: IndexMap<String, Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssuerConfig {
    #[serde(default = "default_minimum_ratio")]
    pub minimum_ratio: Decimal,
    /// Price of one unit of each collateral asset in stablecoin terms.
    #[serde(default)]
    pub collateral_prices: IndexMap<String, Decimal>,
    /// Accounts that fail the compliance check.
    #[serde(default)]
    pub blocked: Vec<String>,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            minimum_ratio: DEFAULT_MINIMUM_RATIO,
            collateral_prices: IndexMap::new(),
            blocked: Vec::new(),
        }
    }
}

/// An existing position to liquidate. `owner` must hold the collateral.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LiquidationConfig {
    pub owner: String,
    pub stablecoin: String,
    pub collateral_asset: String,
    pub collateral_amount: Decimal,
    /// Stablecoins already minted against the position.
    pub debt: Decimal,
    pub liquidator: String,
    pub treasury: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FaultConfig {
    #[serde(default)]
    pub fail: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub saga: String,
    /// Correlation id for the run; a fresh one is generated when absent.
    #[serde(default)]
    pub saga_id: Option<SagaId>,
    #[serde(default)]
    pub accounts: IndexMap<String, AccountConfig>,
    /// Market prices keyed by `BASE/QUOTE` symbol.
    #[serde(default)]
    pub prices: IndexMap<String, Decimal>,
    #[serde(default)]
    pub issuer: IssuerConfig,
    #[serde(default)]
    pub trade: Option<TradeRequest>,
    #[serde(default)]
    pub issuance: Option<IssuanceRequest>,
    #[serde(default)]
    pub liquidation: Option<LiquidationConfig>,
    #[serde(default)]
    pub faults: FaultConfig,
}

/// Result of running a scenario. A failed saga is still an `Ok` outcome.
#[derive(Debug)]
pub struct ScenarioOutcome {
    pub kind: SagaKind,
    pub instance: SagaInstance,
    /// Final saga output on success.
    pub output: Option<serde_json::Value>,
    /// Error with its source chain on failure.
    pub error: Option<String>,
    /// Ledger accounts after the run.
    pub accounts: Vec<AccountSnapshot>,
    /// Provider operations in the order they were attempted.
    pub operations: Vec<String>,
    /// Step executions and compensations in the order they happened.
    pub events: Vec<StepEvent>,
}

impl ScenarioOutcome {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.instance.status() == SagaStatus::Completed
    }
}

impl FromStr for Scenario {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self> {
        let scenario: Self = toml::from_str(s)?;
        scenario.validate()?;
        Ok(scenario)
    }
}

impl Scenario {
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML or
    /// describes an invalid scenario.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| FlowError::ScenarioRead {
            path: path.to_path_buf(),
            source,
        })?;
        contents.parse()
    }

    /// # Errors
    ///
    /// Returns [`FlowError::UnknownSaga`] for an unknown saga name.
    pub fn kind(&self) -> Result<SagaKind> {
        self.saga.parse()
    }

    /// Checks everything that can be checked before a step runs.
    ///
    /// # Errors
    ///
    /// Returns the first configuration problem found.
    pub fn validate(&self) -> Result<()> {
        match self.kind()? {
            SagaKind::TradingExecution if self.trade.is_none() => {
                return Err(FlowError::Scenario(
                    "trading_execution needs a [trade] table".to_string(),
                ));
            }
            SagaKind::StablecoinIssuance if self.issuance.is_none() => {
                return Err(FlowError::Scenario(
                    "stablecoin_issuance needs an [issuance] table".to_string(),
                ));
            }
            SagaKind::CollateralLiquidation if self.liquidation.is_none() => {
                return Err(FlowError::Scenario(
                    "collateral_liquidation needs a [liquidation] table".to_string(),
                ));
            }
            _ => {}
        }

        if let Some(unknown) = self
            .faults
            .fail
            .iter()
            .find(|op| !FAULT_TARGETS.contains(&op.as_str()))
        {
            return Err(FlowError::Scenario(format!(
                "unknown fault target '{unknown}' (expected one of: {})",
                FAULT_TARGETS.join(", ")
            )));
        }

        for (account, config) in &self.accounts {
            if let Some((asset, amount)) = config.balances.iter().find(|(_, a)| a.is_sign_negative())
            {
                return Err(FlowError::Scenario(format!(
                    "account '{account}' has a negative {asset} balance ({amount})"
                )));
            }
        }

        if self.issuer.minimum_ratio <= Decimal::ZERO {
            return Err(FlowError::Scenario(format!(
                "issuer minimum_ratio must be positive, got {}",
                self.issuer.minimum_ratio
            )));
        }
        Ok(())
    }

    /// Seeds the collaborators, arms the faults and runs the saga.
    ///
    /// # Errors
    ///
    /// Returns an error if the scenario is invalid. A saga that fails and
    /// compensates is reported through the outcome, not as an error.
    pub fn run(
        &self,
        reporter: &dyn OutcomeReporter,
        review_queue: &dyn ReviewQueue,
    ) -> Result<ScenarioOutcome> {
        self.validate()?;
        let kind = self.kind()?;

        let faults = Arc::new(FaultPlan::new());
        let ledger = Arc::new(InMemoryLedger::with_faults(Arc::clone(&faults)));
        self.seed_ledger(&ledger)?;
        let issuer = self.seed_issuer(&faults)?;
        let liquidation = match kind {
            SagaKind::CollateralLiquidation => Some(self.seed_liquidation(&ledger, &issuer)?),
            _ => None,
        };
        for operation in &self.faults.fail {
            faults.fail(operation.clone())?;
        }
        debug!(faults = ?self.faults.fail, "scenario seeded");

        let events = InMemoryStepEvents::new();
        let mut options = RunOptions::new()
            .with_reporter(reporter)
            .with_review_queue(review_queue)
            .with_step_events(&events);
        if let Some(saga_id) = self.saga_id {
            options = options.with_saga_id(saga_id);
        }

        let (output, error, instance) = match kind {
            SagaKind::TradingExecution => {
                let exchange = Arc::new(InMemoryExchange::with_faults(Arc::clone(&faults)));
                for (symbol, price) in &self.prices {
                    exchange.set_price(symbol, *price)?;
                }
                let request = self.trade.clone().ok_or_else(|| {
                    FlowError::Scenario("trading_execution needs a [trade] table".to_string())
                })?;

                let ctx = TradingContext::new(Arc::clone(&ledger), exchange);
                let (result, instance) = trading_saga()
                    .run(&ctx, TradeData::new(request), options)
                    .into_parts();
                let (output, error) = split(result);
                (output, error, instance)
            }
            SagaKind::StablecoinIssuance => {
                let request = self.issuance.clone().ok_or_else(|| {
                    FlowError::Scenario("stablecoin_issuance needs an [issuance] table".to_string())
                })?;

                let ctx = IssuanceContext::new(Arc::clone(&ledger), issuer);
                let (result, instance) = issuance_saga(self.issuer.minimum_ratio)
                    .run(&ctx, IssuanceData::new(request), options)
                    .into_parts();
                let (output, error) = split(result);
                (output, error, instance)
            }
            SagaKind::CollateralLiquidation => {
                let request = liquidation.ok_or_else(|| {
                    FlowError::Scenario(
                        "collateral_liquidation needs a [liquidation] table".to_string(),
                    )
                })?;

                let ctx = LiquidationContext::new(Arc::clone(&ledger), issuer);
                let (result, instance) = liquidation_saga()
                    .run(&ctx, LiquidationData::new(request), options)
                    .into_parts();
                let (output, error) = split(result);
                (output, error, instance)
            }
        };

        info!(saga = %kind, status = %instance.status(), "scenario finished");
        Ok(ScenarioOutcome {
            kind,
            instance,
            output,
            error,
            accounts: ledger.accounts()?,
            operations: faults.journal(),
            events: events.events(),
        })
    }

    fn seed_issuer(&self, faults: &Arc<FaultPlan>) -> Result<Arc<InMemoryIssuer>> {
        let issuer = InMemoryIssuer::with_faults(Arc::clone(faults))
            .with_minimum_ratio(self.issuer.minimum_ratio);
        for (asset, price) in &self.issuer.collateral_prices {
            issuer.set_collateral_price(asset, *price)?;
        }
        for account in &self.issuer.blocked {
            issuer.block(account)?;
        }
        Ok(Arc::new(issuer))
    }

    /// Locks the owner's collateral and opens the indebted position.
    fn seed_liquidation(
        &self,
        ledger: &InMemoryLedger,
        issuer: &InMemoryIssuer,
    ) -> Result<LiquidationRequest> {
        let config = self.liquidation.as_ref().ok_or_else(|| {
            FlowError::Scenario("collateral_liquidation needs a [liquidation] table".to_string())
        })?;

        let collateral_lock = ledger.lock_funds(
            &config.owner,
            &config.collateral_asset,
            config.collateral_amount,
        )?;
        let position = issuer.seed_position(
            &config.owner,
            &config.stablecoin,
            &config.collateral_asset,
            config.collateral_amount,
            config.debt,
        )?;
        debug!(%position, %collateral_lock, "liquidation position seeded");

        Ok(LiquidationRequest {
            position,
            collateral_lock,
            liquidator: config.liquidator.clone(),
            treasury: config.treasury.clone(),
        })
    }

    fn seed_ledger(&self, ledger: &InMemoryLedger) -> Result<()> {
        for (account, config) in &self.accounts {
            ledger.open_account(account, config.verified)?;
            for (asset, amount) in &config.balances {
                if amount.is_zero() {
                    continue;
                }
                ledger.credit(account, asset, *amount)?;
            }
        }
        Ok(())
    }
}

fn split<T, E>(result: std::result::Result<T, E>) -> (Option<serde_json::Value>, Option<String>)
where
    T: serde::Serialize,
    E: Error,
{
    match result {
        Ok(output) => (serde_json::to_value(&output).ok(), None),
        Err(err) => (None, Some(error_chain(&err))),
    }
}

/// Renders an error and its sources as `outer: inner: root`.
#[must_use]
pub fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
