//! In-process ledger implementation backing the standalone service and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::UserId;

use super::{DepositError, Ledger, LedgerError};

/// In-memory balance store with a hard ceiling.
pub struct MemoryLedger {
    balances: RwLock<HashMap<UserId, u64>>,
    currency: String,
    max_balance: u64,
    global: bool,
}

impl MemoryLedger {
    pub fn new(currency: impl Into<String>, max_balance: u64) -> Self {
        Self {
            balances: RwLock::new(HashMap::new()),
            currency: currency.into(),
            max_balance,
            global: true,
        }
    }

    /// Seed a balance directly. Test and bootstrap helper; production flows
    /// go through `deposit`/`set_balance`.
    pub async fn seed(&self, user: UserId, amount: u64) {
        self.balances.write().await.insert(user, amount);
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn get_balance(&self, user: UserId) -> Result<u64, LedgerError> {
        Ok(self.balances.read().await.get(&user).copied().unwrap_or(0))
    }

    async fn deposit(&self, user: UserId, amount: u64) -> Result<u64, DepositError> {
        let mut balances = self.balances.write().await;
        let balance = balances.entry(user).or_insert(0);
        let new_balance = balance
            .checked_add(amount)
            .ok_or(DepositError::BalanceTooHigh {
                max_balance: self.max_balance,
            })?;
        if new_balance > self.max_balance {
            return Err(DepositError::BalanceTooHigh {
                max_balance: self.max_balance,
            });
        }
        *balance = new_balance;
        Ok(new_balance)
    }

    async fn set_balance(&self, user: UserId, amount: u64) -> Result<u64, LedgerError> {
        let clamped = amount.min(self.max_balance);
        self.balances.write().await.insert(user, clamped);
        Ok(clamped)
    }

    async fn get_leaderboard_position(&self, user: UserId) -> Result<Option<u64>, LedgerError> {
        let balances = self.balances.read().await;
        let Some(balance) = balances.get(&user) else {
            return Ok(None);
        };
        // Ties rank by user id for a stable ordering.
        let ahead = balances
            .iter()
            .filter(|(id, b)| *b > balance || (*b == balance && **id < user))
            .count() as u64;
        Ok(Some(ahead + 1))
    }

    fn currency_name(&self) -> String {
        self.currency.clone()
    }

    fn max_balance(&self) -> u64 {
        self.max_balance
    }

    fn is_global(&self) -> bool {
        self.global
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deposit_accumulates() {
        let ledger = MemoryLedger::new("credits", 1_000);
        assert_eq!(ledger.deposit(1, 100).await.unwrap(), 100);
        assert_eq!(ledger.deposit(1, 50).await.unwrap(), 150);
        assert_eq!(ledger.get_balance(1).await.unwrap(), 150);
    }

    #[tokio::test]
    async fn test_deposit_over_ceiling_not_applied() {
        let ledger = MemoryLedger::new("credits", 1_000);
        ledger.seed(1, 950).await;

        let err = ledger.deposit(1, 100).await.unwrap_err();
        match err {
            DepositError::BalanceTooHigh { max_balance } => assert_eq!(max_balance, 1_000),
            other => panic!("unexpected error: {other}"),
        }
        // Nothing applied.
        assert_eq!(ledger.get_balance(1).await.unwrap(), 950);
    }

    #[tokio::test]
    async fn test_leaderboard_position() {
        let ledger = MemoryLedger::new("credits", 10_000);
        ledger.seed(1, 300).await;
        ledger.seed(2, 500).await;
        ledger.seed(3, 100).await;

        assert_eq!(ledger.get_leaderboard_position(2).await.unwrap(), Some(1));
        assert_eq!(ledger.get_leaderboard_position(1).await.unwrap(), Some(2));
        assert_eq!(ledger.get_leaderboard_position(3).await.unwrap(), Some(3));
        assert_eq!(ledger.get_leaderboard_position(99).await.unwrap(), None);
    }
}
