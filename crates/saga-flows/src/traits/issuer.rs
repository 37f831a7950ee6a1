use rust_decimal::Decimal;
use serde::Serialize;

use crate::Result;
use crate::types::{MintId, PositionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    Open,
    /// Held for liquidation; nothing can be minted against it.
    Frozen,
    Liquidated,
    Closed,
}

impl PositionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Frozen => "frozen",
            Self::Liquidated => "liquidated",
            Self::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionSnapshot {
    pub id: PositionId,
    pub account: String,
    pub stablecoin: String,
    pub collateral_asset: String,
    pub collateral_amount: Decimal,
    pub minted: Decimal,
    pub status: PositionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mint {
    pub id: MintId,
    pub position: PositionId,
    pub stablecoin: String,
    pub amount: Decimal,
    /// Collateral value divided by everything minted against the position.
    pub collateral_ratio: Decimal,
}

/// Collateralised positions that back stablecoin supply.
pub trait IssuerService: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the account fails compliance checks.
    fn verify_compliance(&self, account: &str) -> Result<()>;

    fn minimum_ratio(&self) -> Decimal;

    /// # Errors
    ///
    /// Returns an error if the collateral asset has no price.
    fn collateral_price(&self, asset: &str) -> Result<Decimal>;

    /// # Errors
    ///
    /// Returns an error if the collateral asset has no price or the amount
    /// is not positive.
    fn open_position(
        &self,
        account: &str,
        stablecoin: &str,
        collateral_asset: &str,
        collateral_amount: Decimal,
    ) -> Result<PositionId>;

    /// Closes a position. Closing a closed position succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the position is unknown or still has minted
    /// supply outstanding.
    fn close_position(&self, position: &PositionId) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the position is not open or minting would take
    /// the collateral ratio below the minimum.
    fn mint(&self, position: &PositionId, amount: Decimal) -> Result<Mint>;

    /// Burns a mint, reducing the position's supply. Burning twice succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the mint is unknown.
    fn burn(&self, mint: &MintId) -> Result<()>;

    /// Freezes an open position ahead of liquidation. Freezing a frozen
    /// position succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the position is unknown, liquidated or closed.
    fn freeze_position(&self, position: &PositionId) -> Result<()>;

    /// Returns a frozen position to `Open`. Unfreezing an open position
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the position is unknown, liquidated or closed.
    fn unfreeze_position(&self, position: &PositionId) -> Result<()>;

    /// Retires all supply minted against a frozen position and marks it
    /// liquidated. Settling a liquidated position succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the position is unknown or not frozen.
    fn settle_liquidation(&self, position: &PositionId) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the position is unknown.
    fn position(&self, position: &PositionId) -> Result<PositionSnapshot>;
}
