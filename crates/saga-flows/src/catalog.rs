use std::fmt;
use std::str::FromStr;

use crate::error::FlowError;
use crate::providers::{InMemoryExchange, InMemoryIssuer, InMemoryLedger};
use crate::sagas::{issuance, liquidation, trading};

/// The sagas this crate knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SagaKind {
    TradingExecution,
    StablecoinIssuance,
    CollateralLiquidation,
}

impl SagaKind {
    pub const ALL: [Self; 3] = [
        Self::TradingExecution,
        Self::StablecoinIssuance,
        Self::CollateralLiquidation,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::TradingExecution => trading::SAGA_NAME,
            Self::StablecoinIssuance => issuance::SAGA_NAME,
            Self::CollateralLiquidation => liquidation::SAGA_NAME,
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::TradingExecution => {
                "lock funds, place and fill an order, settle it and attach risk orders"
            }
            Self::StablecoinIssuance => {
                "lock collateral, open a position, mint and deposit stablecoins"
            }
            Self::CollateralLiquidation => {
                "freeze an undercollateralised position, seize its collateral and settle the debt"
            }
        }
    }

    /// Step names in execution order.
    #[must_use]
    pub fn step_names(self) -> Vec<&'static str> {
        match self {
            Self::TradingExecution => {
                trading::trading_saga::<InMemoryLedger, InMemoryExchange>().step_names()
            }
            Self::StablecoinIssuance => issuance::issuance_saga::<InMemoryLedger, InMemoryIssuer>(
                crate::providers::DEFAULT_MINIMUM_RATIO,
            )
            .step_names(),
            Self::CollateralLiquidation => {
                liquidation::liquidation_saga::<InMemoryLedger, InMemoryIssuer>().step_names()
            }
        }
    }

    fn available() -> String {
        Self::ALL
            .iter()
            .map(|kind| kind.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for SagaKind {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| FlowError::UnknownSaga {
                name: s.to_string(),
                available: Self::available(),
            })
    }
}

impl fmt::Display for SagaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_names() {
        assert_eq!(
            "trading_execution".parse::<SagaKind>().expect("known"),
            SagaKind::TradingExecution
        );
        assert_eq!(
            "stablecoin_issuance".parse::<SagaKind>().expect("known"),
            SagaKind::StablecoinIssuance
        );
        assert_eq!(
            "collateral_liquidation".parse::<SagaKind>().expect("known"),
            SagaKind::CollateralLiquidation
        );
    }

    #[test]
    fn unknown_name_is_configuration_error() {
        let err = "risk_assessment".parse::<SagaKind>().expect_err("unknown");

        match err {
            FlowError::UnknownSaga { name, available } => {
                assert_eq!(name, "risk_assessment");
                assert_eq!(
                    available,
                    "trading_execution, stablecoin_issuance, collateral_liquidation"
                );
            }
            other => panic!("expected UnknownSaga, got {other:?}"),
        }
    }

    #[test]
    fn trading_steps_are_in_order() {
        assert_eq!(
            SagaKind::TradingExecution.step_names(),
            vec![
                "validate_account",
                "lock_funds",
                "create_order",
                "execute_order",
                "update_portfolio",
                "set_risk_management",
            ]
        );
    }

    #[test]
    fn issuance_steps_are_in_order() {
        assert_eq!(
            SagaKind::StablecoinIssuance.step_names(),
            vec![
                "verify_compliance",
                "lock_collateral",
                "open_position",
                "mint_stablecoins",
                "deposit_stablecoins",
            ]
        );
    }

    #[test]
    fn liquidation_steps_are_in_order() {
        assert_eq!(
            SagaKind::CollateralLiquidation.step_names(),
            vec![
                "assess_position",
                "freeze_position",
                "collect_payment",
                "seize_collateral",
                "pay_penalty",
                "settle_debt",
            ]
        );
    }
}
