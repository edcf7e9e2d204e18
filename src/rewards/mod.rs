//! Reward issuance.
//!
//! The issuer is the single authority over per-user reward state: it decides
//! eligibility, computes amounts, talks to the ledger, and reports a
//! discriminated outcome. Two entry points share the state: the push path
//! (`grant_vote_reward`, fired by a genuine vote event) and the pull path
//! (`claim`, the periodic stipend gated by the cooldown window).

mod format;
mod issuer;
mod weekend;

pub use format::format_remaining;
pub use issuer::{RewardIssuer, RewardOutcome, COOLDOWN_SECS};
pub use weekend::weekend_active;
