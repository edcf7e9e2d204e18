//! Reward issuer state machine.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};

use crate::config::{RewardSettings, SettingsHandle};
use crate::cooldown::CooldownStore;
use crate::ledger::{DepositError, Ledger};
use crate::notify::{NotificationSink, NotifyError, RewardNotice};
use crate::UserId;

use super::weekend_active;

/// Cooldown window between rewards for one user: 12 hours.
pub const COOLDOWN_SECS: i64 = 12 * 60 * 60;

/// Outcome of a reward operation. Expected conditions (cooldown, ceiling,
/// feature off) are outcomes, never errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewardOutcome {
    /// Credit applied. `amount` is the total credited; `weekend_bonus` is
    /// the bonus portion included in it.
    Granted {
        amount: u64,
        weekend_bonus: Option<u64>,
        new_balance: u64,
        rank: Option<u64>,
    },
    /// The deposit would have exceeded the ledger ceiling; the balance was
    /// clamped to `max_balance` instead.
    CeilingReached { max_balance: u64 },
    /// Claim rejected: the cooldown window has not elapsed.
    TooSoon { remaining: Duration },
    /// Rewards are disabled.
    Disabled,
}

/// Single authority for reward eligibility and execution.
pub struct RewardIssuer {
    settings: SettingsHandle,
    cooldowns: Arc<CooldownStore>,
    ledger: Arc<dyn Ledger>,
    notifier: Arc<dyn NotificationSink>,
}

impl RewardIssuer {
    pub fn new(
        settings: SettingsHandle,
        cooldowns: Arc<CooldownStore>,
        ledger: Arc<dyn Ledger>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            settings,
            cooldowns,
            ledger,
            notifier,
        }
    }

    /// Handle a genuine vote event.
    ///
    /// Vote events are never gated by the cooldown: eligibility tracking is
    /// refreshed unconditionally (repeat application is an idempotent
    /// refresh, latest event wins) and the credit is issued. Notification
    /// delivery failures never roll back the committed credit.
    pub async fn grant_vote_reward(&self, user: UserId, now: DateTime<Utc>) -> Result<RewardOutcome> {
        let settings = self.settings.snapshot().await;
        if !settings.rewards_enabled {
            return Ok(RewardOutcome::Disabled);
        }

        {
            let mut txn = self.cooldowns.begin(user).await;
            txn.state.has_voted_pending = true;
            txn.state.next_claim_at = (now + Duration::seconds(COOLDOWN_SECS)).timestamp();
            txn.commit().await;
        }

        let (amount, bonus) = reward_amount(&settings, now);
        let outcome = self.credit(user, amount, bonus).await?;
        info!(user_id = user, outcome = ?outcome, "Vote reward processed");

        if let Some(notice) = self.notice_for(&outcome) {
            if let Err(e) = self.notifier.direct_message(user, &notice).await {
                // The credit is already committed; log and move on.
                error!(user_id = user, error = %e, "Failed to send vote notification");
            }
        }

        self.publish_channel(
            &settings,
            &format!("<@{user}> `{user}` just voted on the ranking platform!"),
        )
        .await;

        Ok(outcome)
    }

    /// Handle an explicit stipend claim.
    ///
    /// Gated by the cooldown window; a rejected claim reports the remaining
    /// wait. A successful claim advances the window and consumes any pending
    /// vote credit. Nothing is committed if the deposit call fails.
    pub async fn claim(&self, user: UserId, now: DateTime<Utc>) -> Result<RewardOutcome> {
        let settings = self.settings.snapshot().await;
        if !settings.rewards_enabled {
            return Ok(RewardOutcome::Disabled);
        }

        let mut txn = self.cooldowns.begin(user).await;
        if now.timestamp() <= txn.state.next_claim_at {
            let remaining = Duration::seconds(txn.state.next_claim_at - now.timestamp());
            debug!(
                user_id = user,
                remaining = %super::format_remaining(remaining),
                "Claim too soon"
            );
            return Ok(RewardOutcome::TooSoon { remaining });
        }

        let (amount, bonus) = reward_amount(&settings, now);
        match self.ledger.deposit(user, amount).await {
            Ok(new_balance) => {
                txn.state.next_claim_at = (now + Duration::seconds(COOLDOWN_SECS)).timestamp();
                txn.state.has_voted_pending = false;
                txn.commit().await;

                let rank = self.rank_of(user).await;
                info!(user_id = user, amount, new_balance, "Stipend claim granted");
                Ok(RewardOutcome::Granted {
                    amount,
                    weekend_bonus: bonus,
                    new_balance,
                    rank,
                })
            }
            Err(DepositError::BalanceTooHigh { max_balance }) => {
                self.ledger
                    .set_balance(user, max_balance)
                    .await
                    .map_err(|e| anyhow!("failed to clamp balance: {e}"))?;
                txn.state.next_claim_at = (now + Duration::seconds(COOLDOWN_SECS)).timestamp();
                txn.state.has_voted_pending = false;
                txn.commit().await;

                info!(user_id = user, max_balance, "Stipend claim clamped at ceiling");
                Ok(RewardOutcome::CeilingReached { max_balance })
            }
            // Deposit not applied per the ledger contract; commit nothing.
            Err(DepositError::Backend(e)) => Err(anyhow!("deposit failed for {user}: {e}")),
        }
    }

    /// Public-channel announcement for a platform test event. No credit, no
    /// state change.
    pub async fn announce_test_vote(&self) {
        let settings = self.settings.snapshot().await;
        self.publish_channel(&settings, "Ranking platform test vote.")
            .await;
    }

    async fn credit(
        &self,
        user: UserId,
        amount: u64,
        bonus: Option<u64>,
    ) -> Result<RewardOutcome> {
        match self.ledger.deposit(user, amount).await {
            Ok(new_balance) => Ok(RewardOutcome::Granted {
                amount,
                weekend_bonus: bonus,
                new_balance,
                rank: self.rank_of(user).await,
            }),
            Err(DepositError::BalanceTooHigh { max_balance }) => {
                self.ledger
                    .set_balance(user, max_balance)
                    .await
                    .map_err(|e| anyhow!("failed to clamp balance: {e}"))?;
                Ok(RewardOutcome::CeilingReached { max_balance })
            }
            Err(DepositError::Backend(e)) => Err(anyhow!("deposit failed for {user}: {e}")),
        }
    }

    /// Missing rank is reported as unranked, never as an error.
    async fn rank_of(&self, user: UserId) -> Option<u64> {
        match self.ledger.get_leaderboard_position(user).await {
            Ok(rank) => rank,
            Err(e) => {
                warn!(user_id = user, error = %e, "Leaderboard lookup failed");
                None
            }
        }
    }

    fn notice_for(&self, outcome: &RewardOutcome) -> Option<RewardNotice> {
        let currency = self.ledger.currency_name();
        match outcome {
            RewardOutcome::Granted {
                amount,
                weekend_bonus,
                new_balance,
                rank,
            } => Some(RewardNotice::Granted {
                currency,
                amount: amount - weekend_bonus.unwrap_or(0),
                weekend_bonus: *weekend_bonus,
                new_balance: *new_balance,
                rank: *rank,
            }),
            RewardOutcome::CeilingReached { max_balance } => Some(RewardNotice::CeilingReached {
                currency,
                max_balance: *max_balance,
            }),
            _ => None,
        }
    }

    /// Post to the configured notification channel. A missing channel clears
    /// the configuration instead of erroring repeatedly.
    async fn publish_channel(&self, settings: &RewardSettings, text: &str) {
        let Some(channel) = settings.notification_channel else {
            return;
        };
        match self.notifier.channel_message(channel, text).await {
            Ok(()) => {}
            Err(NotifyError::ChannelMissing) => {
                warn!(channel_id = channel, "Notification channel gone, clearing configuration");
                if let Err(e) = self.settings.clear_notification_channel().await {
                    warn!(error = %e, "Failed to clear notification channel");
                }
            }
            Err(e) => error!(channel_id = channel, error = %e, "Failed to post vote announcement"),
        }
    }
}

fn reward_amount(settings: &RewardSettings, now: DateTime<Utc>) -> (u64, Option<u64>) {
    let bonus = if settings.weekend_bonus_enabled && weekend_active(now) {
        Some(settings.weekend_bonus_amount)
    } else {
        None
    };
    (settings.base_amount + bonus.unwrap_or(0), bonus)
}
