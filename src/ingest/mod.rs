//! Vote event ingestion.
//!
//! Events arrive already authenticated and parsed from the webhook layer (or
//! a runtime adapter) on a typed channel; the ingestor validates that the
//! event names a resolvable user, then hands genuine votes to the reward
//! issuer. Delivery is at-most-once from the platform's perspective - the
//! only dedup is the natural idempotency of the eligibility refresh.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::rewards::RewardIssuer;
use crate::roles::RoleGrantor;
use crate::{GuildId, UserId};

/// Event kind reported by the ranking platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
    Vote,
    Test,
}

/// Wire shape of a platform vote notification. User ids arrive
/// string-encoded but integers are tolerated.
#[derive(Debug, Clone, Deserialize)]
pub struct VotePayload {
    #[serde(deserialize_with = "de_user_id")]
    pub user: UserId,
    #[serde(rename = "type")]
    pub kind: VoteKind,
}

fn de_user_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<UserId, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// A validated vote notification, consumed once by the issuer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteEvent {
    pub user: UserId,
    pub kind: VoteKind,
    pub received_at: DateTime<Utc>,
}

impl VoteEvent {
    pub fn from_payload(payload: VotePayload, received_at: DateTime<Utc>) -> Self {
        Self {
            user: payload.user,
            kind: payload.kind,
            received_at,
        }
    }
}

/// Events flowing between the runtime adapters and the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeEvent {
    Vote(VoteEvent),
    MemberJoined { guild: GuildId, user: UserId },
}

/// A user known to the hosting runtime's cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUser {
    pub id: UserId,
    pub name: String,
}

/// Resolves raw ids against the hosting runtime's user cache.
#[async_trait]
pub trait UserResolver: Send + Sync {
    async fn resolve(&self, user: UserId) -> Option<ResolvedUser>;
}

/// Consumes bridge events and drives the reward path.
pub struct VoteIngestor {
    issuer: Arc<RewardIssuer>,
    resolver: Arc<dyn UserResolver>,
    roles: Arc<RoleGrantor>,
}

impl VoteIngestor {
    pub fn new(
        issuer: Arc<RewardIssuer>,
        resolver: Arc<dyn UserResolver>,
        roles: Arc<RoleGrantor>,
    ) -> Self {
        Self {
            issuer,
            resolver,
            roles,
        }
    }

    /// Event loop. Exits when the channel closes or on cancellation; event
    /// handling failures are logged and never terminate the loop.
    pub async fn run(&self, mut events: mpsc::Receiver<BridgeEvent>, shutdown: CancellationToken) {
        info!("Vote ingestor started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Vote ingestor shutting down");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => {
                        warn!("Event channel closed, stopping ingestor");
                        break;
                    }
                },
            }
        }
    }

    async fn handle(&self, event: BridgeEvent) {
        match event {
            BridgeEvent::Vote(vote) => match vote.kind {
                VoteKind::Vote => self.handle_vote(vote).await,
                VoteKind::Test => {
                    debug!("Received platform test event");
                    self.issuer.announce_test_vote().await;
                }
            },
            BridgeEvent::MemberJoined { guild, user } => {
                self.roles.handle_member_join(guild, user).await;
            }
        }
    }

    async fn handle_vote(&self, vote: VoteEvent) {
        // Fail open: an unresolvable user has no channel to be rewarded or
        // notified through, so the event is dropped, not retried.
        let Some(user) = self.resolver.resolve(vote.user).await else {
            error!(
                user_id = vote.user,
                "Received a vote but cannot resolve this user from the runtime cache"
            );
            return;
        };

        match self.issuer.grant_vote_reward(user.id, vote.received_at).await {
            Ok(outcome) => debug!(user_id = user.id, user = %user.name, outcome = ?outcome, "Vote processed"),
            Err(e) => error!(user_id = user.id, error = %e, "Vote reward failed"),
        }
    }
}
