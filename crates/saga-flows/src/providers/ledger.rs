use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;
use rust_decimal::Decimal;
use tracing::debug;

use super::FaultPlan;
use crate::Result;
use crate::checked;
use crate::error::FlowError;
use crate::traits::{AccountSnapshot, Balance, LedgerService, LockStatus};
use crate::types::LockId;

#[derive(Debug)]
struct Account {
    verified: bool,
    balances: IndexMap<String, Balance>,
}

#[derive(Debug, Clone)]
struct Lock {
    account: String,
    asset: String,
    amount: Decimal,
    status: LockStatus,
}

#[derive(Debug, Default)]
struct LedgerState {
    accounts: IndexMap<String, Account>,
    locks: IndexMap<LockId, Lock>,
    next_lock: u64,
}

impl LedgerState {
    fn account_mut(&mut self, account: &str) -> Result<&mut Account> {
        self.accounts
            .get_mut(account)
            .ok_or_else(|| FlowError::UnknownAccount(account.to_string()))
    }

    fn balance_mut(&mut self, account: &str, asset: &str) -> Result<&mut Balance> {
        Ok(self
            .account_mut(account)?
            .balances
            .entry(asset.to_string())
            .or_default())
    }
}

/// Ledger held in memory. Operations are atomic with respect to each other.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
    faults: Arc<FaultPlan>,
}

impl InMemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_faults(faults: Arc<FaultPlan>) -> Self {
        Self {
            state: Mutex::default(),
            faults,
        }
    }

    /// # Errors
    ///
    /// Returns an error if the lock is unknown.
    pub fn lock_status(&self, lock: &LockId) -> Result<LockStatus> {
        self.state()?
            .locks
            .get(lock)
            .map(|l| l.status)
            .ok_or_else(|| FlowError::UnknownLock(lock.clone()))
    }

    /// Snapshots of every account, in the order they were opened.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger state is poisoned.
    pub fn accounts(&self) -> Result<Vec<AccountSnapshot>> {
        let state = self.state()?;
        Ok(state
            .accounts
            .iter()
            .map(|(id, account)| snapshot(id, account))
            .collect())
    }

    fn state(&self) -> Result<MutexGuard<'_, LedgerState>> {
        self.state.lock().map_err(|_| FlowError::Poisoned("ledger"))
    }

    fn transition(
        &self,
        operation: &'static str,
        lock: &LockId,
        apply: impl FnOnce(&mut LedgerState, &Lock) -> Result<Option<LockStatus>>,
    ) -> Result<()> {
        self.faults.check(operation)?;
        let mut state = self.state()?;

        let current = state
            .locks
            .get(lock)
            .cloned()
            .ok_or_else(|| FlowError::UnknownLock(lock.clone()))?;

        if let Some(next) = apply(&mut state, &current)? {
            if let Some(entry) = state.locks.get_mut(lock) {
                entry.status = next;
            }
            debug!(%lock, from = current.status.as_str(), to = next.as_str(), "lock transition");
        }
        Ok(())
    }
}

fn snapshot(id: &str, account: &Account) -> AccountSnapshot {
    AccountSnapshot {
        id: id.to_string(),
        verified: account.verified,
        balances: account.balances.clone(),
    }
}

fn ensure_positive(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(FlowError::InvalidAmount(amount));
    }
    Ok(())
}

fn lock_state_error(lock: &LockId, status: LockStatus, action: &'static str) -> FlowError {
    FlowError::LockState {
        lock: lock.clone(),
        state: status.as_str(),
        action,
    }
}

impl LedgerService for InMemoryLedger {
    fn open_account(&self, account: &str, verified: bool) -> Result<()> {
        let mut state = self.state()?;
        if state.accounts.contains_key(account) {
            return Err(FlowError::DuplicateAccount(account.to_string()));
        }
        state.accounts.insert(
            account.to_string(),
            Account {
                verified,
                balances: IndexMap::new(),
            },
        );
        Ok(())
    }

    fn account(&self, account: &str) -> Result<AccountSnapshot> {
        let state = self.state()?;
        state
            .accounts
            .get(account)
            .map(|a| snapshot(account, a))
            .ok_or_else(|| FlowError::UnknownAccount(account.to_string()))
    }

    fn balance(&self, account: &str, asset: &str) -> Result<Balance> {
        let state = self.state()?;
        let found = state
            .accounts
            .get(account)
            .ok_or_else(|| FlowError::UnknownAccount(account.to_string()))?;
        Ok(found.balances.get(asset).copied().unwrap_or_default())
    }

    fn lock_funds(&self, account: &str, asset: &str, amount: Decimal) -> Result<LockId> {
        self.faults.check("lock_funds")?;
        ensure_positive(amount)?;
        let mut state = self.state()?;

        let balance = state.balance_mut(account, asset)?;
        if balance.available() < amount {
            return Err(FlowError::InsufficientFunds {
                account: account.to_string(),
                asset: asset.to_string(),
                requested: amount,
                available: balance.available(),
            });
        }
        balance.locked += amount;

        state.next_lock += 1;
        let id = LockId::sequential(state.next_lock);
        state.locks.insert(
            id.clone(),
            Lock {
                account: account.to_string(),
                asset: asset.to_string(),
                amount,
                status: LockStatus::Held,
            },
        );
        debug!(lock = %id, account, asset, %amount, "funds locked");
        Ok(id)
    }

    fn unlock_funds(&self, lock: &LockId) -> Result<()> {
        self.transition("unlock_funds", lock, |state, current| {
            match current.status {
                LockStatus::Released => Ok(None),
                LockStatus::Captured => Err(lock_state_error(lock, current.status, "unlock")),
                LockStatus::Held => {
                    state.balance_mut(&current.account, &current.asset)?.locked -= current.amount;
                    Ok(Some(LockStatus::Released))
                }
            }
        })
    }

    fn capture(&self, lock: &LockId) -> Result<()> {
        self.transition("capture", lock, |state, current| match current.status {
            LockStatus::Captured => Ok(None),
            LockStatus::Released => Err(lock_state_error(lock, current.status, "capture")),
            LockStatus::Held => {
                let balance = state.balance_mut(&current.account, &current.asset)?;
                balance.locked -= current.amount;
                balance.total -= current.amount;
                Ok(Some(LockStatus::Captured))
            }
        })
    }

    fn refund(&self, lock: &LockId) -> Result<()> {
        self.transition("refund", lock, |state, current| match current.status {
            LockStatus::Held => Ok(None),
            LockStatus::Released => Err(lock_state_error(lock, current.status, "refund")),
            LockStatus::Captured => {
                let balance = state.balance_mut(&current.account, &current.asset)?;
                balance.total =
                    checked::add(balance.total, current.amount, "refunded balance")?;
                balance.locked += current.amount;
                Ok(Some(LockStatus::Held))
            }
        })
    }

    fn credit(&self, account: &str, asset: &str, amount: Decimal) -> Result<()> {
        self.faults.check("credit")?;
        ensure_positive(amount)?;
        let mut state = self.state()?;
        let balance = state.balance_mut(account, asset)?;
        balance.total = checked::add(balance.total, amount, "credited balance")?;
        debug!(account, asset, %amount, "credited");
        Ok(())
    }

    fn debit(&self, account: &str, asset: &str, amount: Decimal) -> Result<()> {
        self.faults.check("debit")?;
        ensure_positive(amount)?;
        let mut state = self.state()?;

        let balance = state.balance_mut(account, asset)?;
        if balance.available() < amount {
            return Err(FlowError::InsufficientFunds {
                account: account.to_string(),
                asset: asset.to_string(),
                requested: amount,
                available: balance.available(),
            });
        }
        balance.total -= amount;
        debug!(account, asset, %amount, "debited");
        Ok(())
    }
}
