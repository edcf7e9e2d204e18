//! Integration tests for the vote bridge.
//!
//! These tests verify end-to-end behavior of the reward path: vote-triggered
//! grants, stipend claims, cooldown enforcement, ceiling clamping, the
//! notification self-heal, and the webhook-to-ingestor pipeline.

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use vote_bridge::platform::PlatformError;
use vote_bridge::rewards::format_remaining;
use vote_bridge::{
    BridgeEvent, ChannelId, CooldownStore, Ledger, MemoryLedger, NotificationSink, NotifyError,
    ResolvedUser, RewardIssuer, RewardNotice, RewardOutcome, RewardSettings, RoleError,
    RoleGrantor, RoleSink, SettingsHandle, UserId, UserResolver, VoteChecker, VoteEvent,
    VoteIngestor, VoteKind, COOLDOWN_SECS,
};

// ============================================================================
// Test Helpers
// ============================================================================

/// Notification sink that records deliveries and can simulate a deleted
/// channel.
#[derive(Default)]
struct RecordingSink {
    dms: Mutex<Vec<(UserId, String)>>,
    channel_posts: Mutex<Vec<(ChannelId, String)>>,
    alerts: Mutex<Vec<String>>,
    channel_missing: bool,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn direct_message(&self, user: UserId, notice: &RewardNotice) -> Result<(), NotifyError> {
        self.dms.lock().unwrap().push((user, notice.render()));
        Ok(())
    }

    async fn channel_message(&self, channel: ChannelId, text: &str) -> Result<(), NotifyError> {
        if self.channel_missing {
            return Err(NotifyError::ChannelMissing);
        }
        self.channel_posts
            .lock()
            .unwrap()
            .push((channel, text.to_string()));
        Ok(())
    }

    async fn owner_alert(&self, text: &str) -> Result<(), NotifyError> {
        self.alerts.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

struct Bridge {
    issuer: Arc<RewardIssuer>,
    ledger: Arc<MemoryLedger>,
    sink: Arc<RecordingSink>,
    settings: SettingsHandle,
    cooldowns: Arc<CooldownStore>,
}

fn build_bridge(settings: RewardSettings, max_balance: u64) -> Bridge {
    let handle = SettingsHandle::new(settings);
    let cooldowns = Arc::new(CooldownStore::new());
    let ledger = Arc::new(MemoryLedger::new("credits", max_balance));
    let sink = Arc::new(RecordingSink::default());
    let issuer = Arc::new(RewardIssuer::new(
        handle.clone(),
        cooldowns.clone(),
        ledger.clone(),
        sink.clone(),
    ));
    Bridge {
        issuer,
        ledger,
        sink,
        settings: handle,
        cooldowns,
    }
}

fn weekend_settings() -> RewardSettings {
    RewardSettings {
        rewards_enabled: true,
        base_amount: 100,
        weekend_bonus_enabled: true,
        weekend_bonus_amount: 500,
        ..RewardSettings::default()
    }
}

/// 2024-06-08 was a Saturday.
fn saturday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 8, 9, 0, 0).unwrap()
}

/// 2024-06-10 was a Monday.
fn monday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap()
}

// ============================================================================
// Claim / Cooldown Scenarios
// ============================================================================

mod claims {
    use super::*;

    #[tokio::test]
    async fn test_weekend_claim_grants_base_plus_bonus() {
        let bridge = build_bridge(weekend_settings(), 1_000);
        let now = saturday();

        match bridge.issuer.claim(1, now).await.unwrap() {
            RewardOutcome::Granted {
                amount,
                weekend_bonus,
                new_balance,
                rank,
            } => {
                assert_eq!(amount, 600);
                assert_eq!(weekend_bonus, Some(500));
                assert_eq!(new_balance, 600);
                assert_eq!(rank, Some(1));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        assert_eq!(bridge.ledger.get_balance(1).await.unwrap(), 600);
        assert_eq!(
            bridge.cooldowns.get(1).await.next_claim_at,
            (now + Duration::seconds(COOLDOWN_SECS)).timestamp()
        );
    }

    #[tokio::test]
    async fn test_second_claim_within_window_is_rejected() {
        let bridge = build_bridge(weekend_settings(), 1_000);
        let now = saturday();

        bridge.issuer.claim(1, now).await.unwrap();
        match bridge.issuer.claim(1, now + Duration::hours(1)).await.unwrap() {
            RewardOutcome::TooSoon { remaining } => {
                assert_eq!(remaining, Duration::hours(11));
                assert_eq!(format_remaining(remaining), "11 hours");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        // Balance unchanged by the rejected claim.
        assert_eq!(bridge.ledger.get_balance(1).await.unwrap(), 600);
    }

    #[tokio::test]
    async fn test_weekday_claim_is_base_only() {
        let bridge = build_bridge(weekend_settings(), 10_000);
        match bridge.issuer.claim(1, monday()).await.unwrap() {
            RewardOutcome::Granted {
                amount,
                weekend_bonus,
                ..
            } => {
                assert_eq!(amount, 100);
                assert_eq!(weekend_bonus, None);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_overflow_clamps_to_ceiling_exactly() {
        let bridge = build_bridge(
            RewardSettings {
                rewards_enabled: true,
                base_amount: 100,
                ..RewardSettings::default()
            },
            1_000,
        );
        bridge.ledger.seed(1, 950).await;

        match bridge.issuer.claim(1, monday()).await.unwrap() {
            RewardOutcome::CeilingReached { max_balance } => assert_eq!(max_balance, 1_000),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(bridge.ledger.get_balance(1).await.unwrap(), 1_000);
    }

    #[tokio::test]
    async fn test_disabled_claim_is_silent() {
        let bridge = build_bridge(RewardSettings::default(), 1_000);
        assert_eq!(
            bridge.issuer.claim(1, monday()).await.unwrap(),
            RewardOutcome::Disabled
        );
        assert!(bridge.sink.dms.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_racing_claims_pay_exactly_once() {
        let bridge = build_bridge(weekend_settings(), 10_000);
        let now = saturday();

        let (a, b) = tokio::join!(bridge.issuer.claim(1, now), bridge.issuer.claim(1, now));
        let outcomes = [a.unwrap(), b.unwrap()];

        let granted = outcomes
            .iter()
            .filter(|o| matches!(o, RewardOutcome::Granted { .. }))
            .count();
        let rejected = outcomes
            .iter()
            .filter(|o| matches!(o, RewardOutcome::TooSoon { .. }))
            .count();
        assert_eq!(granted, 1, "exactly one claim may win the race");
        assert_eq!(rejected, 1);
        assert_eq!(bridge.ledger.get_balance(1).await.unwrap(), 600);
    }
}

// ============================================================================
// Vote Grant Scenarios
// ============================================================================

mod vote_grants {
    use super::*;

    #[tokio::test]
    async fn test_vote_refresh_latest_call_wins() {
        let bridge = build_bridge(weekend_settings(), 1_000_000);
        let t0 = monday();

        for hours in [0i64, 2, 5] {
            let now = t0 + Duration::hours(hours);
            bridge.issuer.grant_vote_reward(1, now).await.unwrap();
            assert_eq!(
                bridge.cooldowns.get(1).await.next_claim_at,
                (now + Duration::seconds(COOLDOWN_SECS)).timestamp(),
                "refresh must always track the latest vote"
            );
        }
        assert!(bridge.cooldowns.get(1).await.has_voted_pending);
    }

    #[tokio::test]
    async fn test_votes_are_never_gated_by_cooldown() {
        let bridge = build_bridge(weekend_settings(), 1_000_000);
        let t0 = monday();

        bridge.issuer.grant_vote_reward(1, t0).await.unwrap();
        // A second vote an hour later still credits.
        match bridge
            .issuer
            .grant_vote_reward(1, t0 + Duration::hours(1))
            .await
            .unwrap()
        {
            RewardOutcome::Granted { new_balance, .. } => assert_eq!(new_balance, 200),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_claim_after_vote_within_window_is_rejected() {
        let bridge = build_bridge(weekend_settings(), 1_000_000);
        let t0 = monday();

        bridge.issuer.grant_vote_reward(1, t0).await.unwrap();
        assert!(matches!(
            bridge.issuer.claim(1, t0 + Duration::hours(2)).await.unwrap(),
            RewardOutcome::TooSoon { .. }
        ));
        // The pending vote credit is only consumed by a successful claim.
        assert!(bridge.cooldowns.get(1).await.has_voted_pending);
    }

    #[tokio::test]
    async fn test_missing_channel_clears_configuration() {
        let settings = SettingsHandle::new(RewardSettings {
            notification_channel: Some(321),
            ..weekend_settings()
        });
        let cooldowns = Arc::new(CooldownStore::new());
        let ledger = Arc::new(MemoryLedger::new("credits", 10_000));
        let sink = Arc::new(RecordingSink {
            channel_missing: true,
            ..RecordingSink::default()
        });
        let issuer = RewardIssuer::new(settings.clone(), cooldowns, ledger, sink.clone());

        issuer.grant_vote_reward(1, monday()).await.unwrap();
        assert_eq!(settings.snapshot().await.notification_channel, None);
        // A missing channel is routine configuration drift, not an incident.
        assert!(sink.alerts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_grant_dm_reports_rank_and_balance() {
        let bridge = build_bridge(weekend_settings(), 10_000);
        bridge.ledger.seed(2, 5_000).await;

        bridge.issuer.grant_vote_reward(1, monday()).await.unwrap();
        let dms = bridge.sink.dms.lock().unwrap();
        assert_eq!(dms.len(), 1);
        assert_eq!(dms[0].0, 1);
        assert!(dms[0].1.contains("+100 credits"));
        assert!(dms[0].1.contains("#2 on the global leaderboard"));
    }
}

// ============================================================================
// Webhook -> Ingestor Pipeline
// ============================================================================

mod pipeline {
    use super::*;

    struct CacheResolver {
        known: Vec<UserId>,
    }

    #[async_trait]
    impl UserResolver for CacheResolver {
        async fn resolve(&self, user: UserId) -> Option<ResolvedUser> {
            self.known.contains(&user).then(|| ResolvedUser {
                id: user,
                name: format!("user-{user}"),
            })
        }
    }

    struct NeverVoted;

    #[async_trait]
    impl VoteChecker for NeverVoted {
        async fn get_user_vote(&self, _user: UserId) -> Result<bool, PlatformError> {
            Ok(false)
        }
    }

    struct NoopRoles;

    #[async_trait]
    impl RoleSink for NoopRoles {
        async fn assign_role(&self, _g: u64, _u: UserId, _r: u64) -> Result<(), RoleError> {
            Ok(())
        }
    }

    async fn run_events(bridge: &Bridge, resolver: CacheResolver, events: Vec<BridgeEvent>) {
        let grantor = Arc::new(RoleGrantor::new(
            bridge.settings.clone(),
            Arc::new(NeverVoted),
            Arc::new(NoopRoles),
            bridge.sink.clone(),
        ));
        let ingestor = VoteIngestor::new(bridge.issuer.clone(), Arc::new(resolver), grantor);

        let (tx, rx) = mpsc::channel(16);
        for event in events {
            tx.send(event).await.unwrap();
        }
        drop(tx); // Loop exits once the queue drains.

        let shutdown = CancellationToken::new();
        tokio::time::timeout(StdDuration::from_secs(5), ingestor.run(rx, shutdown))
            .await
            .expect("ingestor must drain and stop");
    }

    fn vote(user: UserId, kind: VoteKind) -> BridgeEvent {
        BridgeEvent::Vote(VoteEvent {
            user,
            kind,
            received_at: monday(),
        })
    }

    #[tokio::test]
    async fn test_resolvable_vote_credits_user() {
        let bridge = build_bridge(weekend_settings(), 10_000);
        run_events(
            &bridge,
            CacheResolver { known: vec![221] },
            vec![vote(221, VoteKind::Vote)],
        )
        .await;
        assert_eq!(bridge.ledger.get_balance(221).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_unresolvable_vote_is_dropped() {
        let bridge = build_bridge(weekend_settings(), 10_000);
        run_events(
            &bridge,
            CacheResolver { known: vec![] },
            vec![vote(221, VoteKind::Vote)],
        )
        .await;
        assert_eq!(bridge.ledger.get_balance(221).await.unwrap(), 0);
        assert!(!bridge.cooldowns.get(221).await.has_voted_pending);
    }

    #[tokio::test]
    async fn test_test_event_announces_without_credit() {
        let mut settings = weekend_settings();
        settings.notification_channel = Some(777);
        let bridge = build_bridge(settings, 10_000);

        run_events(
            &bridge,
            CacheResolver { known: vec![221] },
            vec![vote(221, VoteKind::Test)],
        )
        .await;

        assert_eq!(bridge.ledger.get_balance(221).await.unwrap(), 0);
        let posts = bridge.sink.channel_posts.lock().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, 777);
        assert!(posts[0].1.contains("test vote"));
    }
}
