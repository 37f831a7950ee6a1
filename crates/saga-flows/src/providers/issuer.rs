use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;
use rust_decimal::Decimal;
use tracing::debug;

use super::FaultPlan;
use crate::Result;
use crate::checked;
use crate::error::FlowError;
use crate::traits::{IssuerService, Mint, PositionSnapshot, PositionStatus};
use crate::types::{MintId, PositionId};

/// 150% collateralisation.
pub const DEFAULT_MINIMUM_RATIO: Decimal = Decimal::from_parts(15, 0, 0, false, 1);

#[derive(Debug)]
struct MintEntry {
    position: PositionId,
    amount: Decimal,
    burned: bool,
}

#[derive(Debug, Default)]
struct IssuerState {
    prices: IndexMap<String, Decimal>,
    blocked: HashSet<String>,
    positions: IndexMap<PositionId, PositionSnapshot>,
    mints: IndexMap<MintId, MintEntry>,
    next_position: u64,
    next_mint: u64,
}

impl IssuerState {
    fn price(&self, asset: &str) -> Result<Decimal> {
        self.prices
            .get(asset)
            .copied()
            .ok_or_else(|| FlowError::UnknownCollateral(asset.to_string()))
    }

    fn position_mut(&mut self, position: &PositionId) -> Result<&mut PositionSnapshot> {
        self.positions
            .get_mut(position)
            .ok_or_else(|| FlowError::UnknownPosition(position.clone()))
    }

    fn insert_position(
        &mut self,
        account: &str,
        stablecoin: &str,
        collateral_asset: &str,
        collateral_amount: Decimal,
        minted: Decimal,
    ) -> PositionId {
        self.next_position += 1;
        let id = PositionId::sequential(self.next_position);
        self.positions.insert(
            id.clone(),
            PositionSnapshot {
                id: id.clone(),
                account: account.to_string(),
                stablecoin: stablecoin.to_string(),
                collateral_asset: collateral_asset.to_string(),
                collateral_amount,
                minted,
                status: PositionStatus::Open,
            },
        );
        id
    }
}

#[derive(Debug)]
pub struct InMemoryIssuer {
    state: Mutex<IssuerState>,
    minimum_ratio: Decimal,
    faults: Arc<FaultPlan>,
}

impl Default for InMemoryIssuer {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryIssuer {
    #[must_use]
    pub fn new() -> Self {
        Self::with_faults(Arc::default())
    }

    #[must_use]
    pub fn with_faults(faults: Arc<FaultPlan>) -> Self {
        Self {
            state: Mutex::default(),
            minimum_ratio: DEFAULT_MINIMUM_RATIO,
            faults,
        }
    }

    #[must_use]
    pub fn with_minimum_ratio(mut self, minimum_ratio: Decimal) -> Self {
        self.minimum_ratio = minimum_ratio;
        self
    }

    /// Sets the price of one unit of `asset`, in stablecoin terms.
    ///
    /// # Errors
    ///
    /// Returns an error if the price is not positive.
    pub fn set_collateral_price(&self, asset: &str, price: Decimal) -> Result<()> {
        if price <= Decimal::ZERO {
            return Err(FlowError::InvalidAmount(price));
        }
        self.state()?.prices.insert(asset.to_string(), price);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the issuer state is poisoned.
    pub fn block(&self, account: &str) -> Result<()> {
        self.state()?.blocked.insert(account.to_string());
        Ok(())
    }

    /// Opens a position that already carries `minted` supply, without the
    /// ratio check a mint would apply. Used to set up existing debt.
    ///
    /// # Errors
    ///
    /// Returns an error if the collateral has no price, the collateral
    /// amount is not positive or `minted` is negative.
    pub fn seed_position(
        &self,
        account: &str,
        stablecoin: &str,
        collateral_asset: &str,
        collateral_amount: Decimal,
        minted: Decimal,
    ) -> Result<PositionId> {
        if collateral_amount <= Decimal::ZERO {
            return Err(FlowError::InvalidAmount(collateral_amount));
        }
        if minted.is_sign_negative() {
            return Err(FlowError::InvalidAmount(minted));
        }
        let mut state = self.state()?;
        state.price(collateral_asset)?;

        let id = state.insert_position(
            account,
            stablecoin,
            collateral_asset,
            collateral_amount,
            minted,
        );
        debug!(position = %id, account, %collateral_amount, %minted, "position seeded");
        Ok(id)
    }

    fn state(&self) -> Result<MutexGuard<'_, IssuerState>> {
        self.state.lock().map_err(|_| FlowError::Poisoned("issuer"))
    }
}

fn position_state_error(
    position: &PositionId,
    status: PositionStatus,
    action: &'static str,
) -> FlowError {
    FlowError::PositionState {
        position: position.clone(),
        state: status.as_str(),
        action,
    }
}

impl IssuerService for InMemoryIssuer {
    fn verify_compliance(&self, account: &str) -> Result<()> {
        self.faults.check("verify_compliance")?;
        if self.state()?.blocked.contains(account) {
            return Err(FlowError::ComplianceRejected(account.to_string()));
        }
        Ok(())
    }

    fn minimum_ratio(&self) -> Decimal {
        self.minimum_ratio
    }

    fn collateral_price(&self, asset: &str) -> Result<Decimal> {
        self.state()?.price(asset)
    }

    fn open_position(
        &self,
        account: &str,
        stablecoin: &str,
        collateral_asset: &str,
        collateral_amount: Decimal,
    ) -> Result<PositionId> {
        self.faults.check("open_position")?;
        if collateral_amount <= Decimal::ZERO {
            return Err(FlowError::InvalidAmount(collateral_amount));
        }
        let mut state = self.state()?;
        state.price(collateral_asset)?;

        let id = state.insert_position(
            account,
            stablecoin,
            collateral_asset,
            collateral_amount,
            Decimal::ZERO,
        );
        debug!(position = %id, account, collateral_asset, %collateral_amount, "position opened");
        Ok(id)
    }

    fn close_position(&self, position: &PositionId) -> Result<()> {
        self.faults.check("close_position")?;
        let mut state = self.state()?;
        let entry = state.position_mut(position)?;

        match entry.status {
            PositionStatus::Closed => return Ok(()),
            PositionStatus::Open => {}
            status => return Err(position_state_error(position, status, "close")),
        }
        if entry.minted > Decimal::ZERO {
            return Err(position_state_error(
                position,
                entry.status,
                "close with outstanding supply",
            ));
        }
        entry.status = PositionStatus::Closed;
        debug!(%position, "position closed");
        Ok(())
    }

    fn mint(&self, position: &PositionId, amount: Decimal) -> Result<Mint> {
        self.faults.check("mint")?;
        if amount <= Decimal::ZERO {
            return Err(FlowError::InvalidAmount(amount));
        }
        let mut state = self.state()?;

        let (asset, collateral, minted, stablecoin) = {
            let entry = state.position_mut(position)?;
            if entry.status != PositionStatus::Open {
                return Err(position_state_error(position, entry.status, "mint"));
            }
            (
                entry.collateral_asset.clone(),
                entry.collateral_amount,
                entry.minted,
                entry.stablecoin.clone(),
            )
        };
        let value = checked::mul(collateral, state.price(&asset)?, "collateral value")?;
        let supply = checked::add(minted, amount, "minted supply")?;
        let ratio = checked::div(value, supply, "collateral ratio")?.round_dp(4);
        if ratio < self.minimum_ratio {
            return Err(FlowError::Undercollateralized {
                ratio,
                minimum: self.minimum_ratio,
            });
        }

        state.position_mut(position)?.minted = supply;
        state.next_mint += 1;
        let id = MintId::sequential(state.next_mint);
        state.mints.insert(
            id.clone(),
            MintEntry {
                position: position.clone(),
                amount,
                burned: false,
            },
        );
        debug!(mint = %id, %position, %amount, %ratio, "stablecoins minted");

        Ok(Mint {
            id,
            position: position.clone(),
            stablecoin,
            amount,
            collateral_ratio: ratio,
        })
    }

    fn burn(&self, mint: &MintId) -> Result<()> {
        self.faults.check("burn")?;
        let mut state = self.state()?;
        let entry = state
            .mints
            .get_mut(mint)
            .ok_or_else(|| FlowError::UnknownMint(mint.clone()))?;
        if entry.burned {
            return Ok(());
        }
        entry.burned = true;
        let (position, amount) = (entry.position.clone(), entry.amount);

        state.position_mut(&position)?.minted -= amount;
        debug!(%mint, %position, %amount, "stablecoins burned");
        Ok(())
    }

    fn freeze_position(&self, position: &PositionId) -> Result<()> {
        self.faults.check("freeze_position")?;
        let mut state = self.state()?;
        let entry = state.position_mut(position)?;
        match entry.status {
            PositionStatus::Frozen => Ok(()),
            PositionStatus::Open => {
                entry.status = PositionStatus::Frozen;
                debug!(%position, "position frozen");
                Ok(())
            }
            status => Err(position_state_error(position, status, "freeze")),
        }
    }

    fn unfreeze_position(&self, position: &PositionId) -> Result<()> {
        self.faults.check("unfreeze_position")?;
        let mut state = self.state()?;
        let entry = state.position_mut(position)?;
        match entry.status {
            PositionStatus::Open => Ok(()),
            PositionStatus::Frozen => {
                entry.status = PositionStatus::Open;
                debug!(%position, "position unfrozen");
                Ok(())
            }
            status => Err(position_state_error(position, status, "unfreeze")),
        }
    }

    fn settle_liquidation(&self, position: &PositionId) -> Result<()> {
        self.faults.check("settle_liquidation")?;
        let mut state = self.state()?;
        let entry = state.position_mut(position)?;
        match entry.status {
            PositionStatus::Liquidated => return Ok(()),
            PositionStatus::Frozen => {}
            status => return Err(position_state_error(position, status, "settle liquidation")),
        }
        let retired = entry.minted;
        entry.minted = Decimal::ZERO;
        entry.collateral_amount = Decimal::ZERO;
        entry.status = PositionStatus::Liquidated;

        // Outstanding mints are retired with the position.
        for mint in state.mints.values_mut() {
            if &mint.position == position {
                mint.burned = true;
            }
        }
        debug!(%position, %retired, "liquidation settled");
        Ok(())
    }

    fn position(&self, position: &PositionId) -> Result<PositionSnapshot> {
        self.state()?
            .positions
            .get(position)
            .cloned()
            .ok_or_else(|| FlowError::UnknownPosition(position.clone()))
    }
}
