//! Notification sink boundary.
//!
//! Message delivery (DMs, channel posts, owner alerts) belongs to the
//! hosting chat runtime; the reward path only talks to this trait. Delivery
//! failures never roll back a committed credit.

use async_trait::async_trait;
use thiserror::Error;

use crate::{ChannelId, UserId};

#[derive(Debug, Error)]
pub enum NotifyError {
    /// The recipient refuses direct messages.
    #[error("recipient refuses direct messages")]
    Forbidden,
    /// The target channel no longer exists. Drives configuration self-heal.
    #[error("channel does not exist")]
    ChannelMissing,
    #[error("delivery failure: {0}")]
    Other(String),
}

/// Outbound delivery surface implemented by the hosting runtime.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn direct_message(&self, user: UserId, notice: &RewardNotice)
        -> Result<(), NotifyError>;

    async fn channel_message(&self, channel: ChannelId, text: &str) -> Result<(), NotifyError>;

    async fn owner_alert(&self, text: &str) -> Result<(), NotifyError>;
}

/// Rendered outcome of a reward grant, delivered to the rewarded user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewardNotice {
    Granted {
        currency: String,
        amount: u64,
        weekend_bonus: Option<u64>,
        new_balance: u64,
        rank: Option<u64>,
    },
    CeilingReached {
        currency: String,
        max_balance: u64,
    },
}

impl RewardNotice {
    pub fn render(&self) -> String {
        match self {
            RewardNotice::Granted {
                currency,
                amount,
                weekend_bonus,
                new_balance,
                rank,
            } => {
                let mut msg = format!(
                    "Thanks for your upvote! Take some {currency}. Enjoy! (+{amount} {currency}!)"
                );
                if let Some(bonus) = weekend_bonus {
                    msg.push_str(&format!("\nAnd your weekend bonus, +{bonus}!"));
                }
                msg.push_str(&format!(
                    "\n\nYou currently have {new_balance} {currency}."
                ));
                match rank {
                    Some(pos) => msg.push_str(&format!(
                        "\nYou are currently #{pos} on the global leaderboard!"
                    )),
                    None => msg.push_str("\nYou are currently unranked on the global leaderboard."),
                }
                msg
            }
            RewardNotice::CeilingReached {
                currency,
                max_balance,
            } => format!(
                "Thanks for your upvote! However, you've reached the maximum amount of \
                 {currency}! (**{max_balance}**) Please spend some first.\n\n\
                 You currently have {max_balance} {currency}."
            ),
        }
    }
}
