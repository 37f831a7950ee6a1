use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::Result;
use crate::types::LockId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Balance {
    pub total: Decimal,
    pub locked: Decimal,
}

impl Balance {
    #[must_use]
    pub fn available(&self) -> Decimal {
        self.total - self.locked
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSnapshot {
    pub id: String,
    pub verified: bool,
    pub balances: IndexMap<String, Balance>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockStatus {
    Held,
    Released,
    Captured,
}

impl LockStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Held => "held",
            Self::Released => "released",
            Self::Captured => "captured",
        }
    }
}

/// Account balances and the fund locks placed against them.
///
/// A lock moves through `Held`, then either `Released` (funds returned to
/// the available balance) or `Captured` (funds leave the account). A
/// captured lock can be refunded back to `Held`.
pub trait LedgerService: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if an account with this id already exists.
    fn open_account(&self, account: &str, verified: bool) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the account does not exist.
    fn account(&self, account: &str) -> Result<AccountSnapshot>;

    /// # Errors
    ///
    /// Returns an error if the account does not exist.
    fn balance(&self, account: &str, asset: &str) -> Result<Balance>;

    /// # Errors
    ///
    /// Returns an error if the account does not exist.
    fn available(&self, account: &str, asset: &str) -> Result<Decimal> {
        Ok(self.balance(account, asset)?.available())
    }

    /// # Errors
    ///
    /// Returns an error if the amount is not positive, the account does not
    /// exist or its available balance is too small.
    fn lock_funds(&self, account: &str, asset: &str, amount: Decimal) -> Result<LockId>;

    /// Releases a held lock. Releasing an already released lock succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is unknown or has been captured.
    fn unlock_funds(&self, lock: &LockId) -> Result<()>;

    /// Debits the locked funds from the account.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is unknown or was released.
    fn capture(&self, lock: &LockId) -> Result<()>;

    /// Returns captured funds to the account and holds them again.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is unknown or was released.
    fn refund(&self, lock: &LockId) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the amount is not positive or the account does
    /// not exist.
    fn credit(&self, account: &str, asset: &str, amount: Decimal) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the amount is not positive, the account does not
    /// exist or its available balance is too small.
    fn debit(&self, account: &str, asset: &str, amount: Decimal) -> Result<()>;
}
