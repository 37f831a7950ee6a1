use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::FlowError;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub(crate) fn sequential(n: u64) -> Self {
                Self(format!("{}_{n:04}", $prefix))
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

define_id!(
    /// Identifies funds held back from an account's available balance.
    LockId,
    "lock"
);
define_id!(OrderId, "ord");
define_id!(ExecutionId, "exec");
define_id!(PositionId, "pos");
define_id!(MintId, "mint");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trading pair written as `BASE/QUOTE`, e.g. `BTC/USD`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Market {
    pub base: String,
    pub quote: String,
}

impl Market {
    #[must_use]
    pub fn symbol(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }

    /// Asset the account gives up when trading on `side`.
    #[must_use]
    pub fn spent_asset(&self, side: Side) -> &str {
        match side {
            Side::Buy => &self.quote,
            Side::Sell => &self.base,
        }
    }

    /// Asset the account receives when trading on `side`.
    #[must_use]
    pub fn acquired_asset(&self, side: Side) -> &str {
        match side {
            Side::Buy => &self.base,
            Side::Sell => &self.quote,
        }
    }
}

impl FromStr for Market {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s
            .split_once('/')
            .ok_or_else(|| FlowError::InvalidSymbol(s.to_string()))?;
        let (base, quote) = (base.trim(), quote.trim());

        if base.is_empty() || quote.is_empty() || quote.contains('/') || base == quote {
            return Err(FlowError::InvalidSymbol(s.to_string()));
        }

        Ok(Self {
            base: base.to_string(),
            quote: quote.to_string(),
        })
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskParameters {
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
}

/// Request for the trading execution saga. `amount` is the notional in the
/// quote asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRequest {
    pub account: String,
    pub symbol: String,
    pub side: Side,
    pub amount: Decimal,
    pub risk: RiskParameters,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceRequest {
    pub account: String,
    pub stablecoin: String,
    pub collateral_asset: String,
    pub collateral_amount: Decimal,
    pub mint_amount: Decimal,
}

/// Request for the collateral liquidation saga. `collateral_lock` holds the
/// position's collateral in the owner's ledger account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationRequest {
    pub position: PositionId,
    pub collateral_lock: LockId,
    /// Pays off the debt plus penalty and receives the collateral.
    pub liquidator: String,
    /// Receives the liquidation penalty.
    pub treasury: String,
}
