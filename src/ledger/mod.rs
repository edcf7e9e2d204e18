//! Balance ledger boundary
//!
//! The ledger is owned by an external economy subsystem; the reward path
//! only ever mutates balances through this trait. A deposit that would push
//! a balance past the configured ceiling is signaled, not applied - the
//! caller decides whether to clamp.

mod memory;

pub use memory::MemoryLedger;

use async_trait::async_trait;
use thiserror::Error;

use crate::UserId;

/// Deposit failure modes.
///
/// Per the ledger contract a failed deposit must be assumed *not* applied.
#[derive(Debug, Error)]
pub enum DepositError {
    /// The deposit would exceed the ledger ceiling. Carries the ceiling so
    /// the caller can clamp via [`Ledger::set_balance`].
    #[error("balance would exceed the maximum of {max_balance}")]
    BalanceTooHigh { max_balance: u64 },
    #[error("ledger backend failure: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
#[error("ledger backend failure: {0}")]
pub struct LedgerError(pub String);

/// Balance-of-record interface consumed by the reward path.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn get_balance(&self, user: UserId) -> Result<u64, LedgerError>;

    /// Credit `amount` to `user`, returning the new balance. Atomic: on
    /// [`DepositError::BalanceTooHigh`] nothing was applied.
    async fn deposit(&self, user: UserId, amount: u64) -> Result<u64, DepositError>;

    async fn set_balance(&self, user: UserId, amount: u64) -> Result<u64, LedgerError>;

    /// 1-based position on the balance leaderboard, `None` if unranked.
    async fn get_leaderboard_position(&self, user: UserId) -> Result<Option<u64>, LedgerError>;

    fn currency_name(&self) -> String;

    /// The configured maximum balance an account may hold.
    fn max_balance(&self) -> u64;

    /// Whether the ledger is shared across all guilds or partitioned.
    fn is_global(&self) -> bool;
}
