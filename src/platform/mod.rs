//! Ranking-platform client boundary.
//!
//! All HTTP failures are translated into a categorized [`PlatformError`]
//! before they reach reward logic: bad tokens and unknown entities are
//! operator problems, everything else is a "try again later" to the
//! requesting user.

mod client;

pub use client::PlatformClient;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::UserId;

#[derive(Debug, Error)]
pub enum PlatformError {
    /// Invalid API token. Surfaced to operators, not end users.
    #[error("ranking platform rejected the API token")]
    Unauthorized,
    /// The entity is not registered on the platform.
    #[error("entity not found on the ranking platform")]
    NotFound,
    /// Any other HTTP failure. Transient from the caller's perspective.
    #[error("ranking platform returned HTTP {status}")]
    Http { status: u16 },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Public listing information for a bot on the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotInfo {
    pub username: String,
    #[serde(default)]
    pub shortdesc: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub server_count: Option<u64>,
    #[serde(default)]
    pub shard_count: Option<u64>,
    #[serde(default, rename = "monthlyPoints")]
    pub monthly_points: u64,
    #[serde(default)]
    pub points: u64,
    #[serde(default)]
    pub invite: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

/// One entry in the platform's recent-upvoters feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voter {
    pub id: String,
    #[serde(default)]
    pub username: String,
}

/// Vote-status lookup, split out so consumers (the role grantor) can be
/// exercised without a live HTTP client.
#[async_trait]
pub trait VoteChecker: Send + Sync {
    async fn get_user_vote(&self, user: UserId) -> Result<bool, PlatformError>;
}

/// Tally the month's voters by vote count, most frequent first. Ties order
/// by id for stability.
pub fn monthly_votes(voters: &[Voter]) -> Vec<(String, u64)> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for voter in voters {
        *counts.entry(voter.id.as_str()).or_insert(0) += 1;
    }
    let mut tally: Vec<(String, u64)> = counts
        .into_iter()
        .map(|(id, n)| (id.to_string(), n))
        .collect();
    tally.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    tally
}
