//! Periodic guild-count reporter.
//!
//! Posts aggregate counts to the ranking platform every 30 minutes while
//! enabled. Iterations are independent: any failure is logged and the loop
//! keeps going until shutdown.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::SettingsHandle;
use crate::platform::PlatformClient;

/// Reporting interval between stat posts.
pub const STATS_INTERVAL: Duration = Duration::from_secs(1800);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuildCounts {
    pub guilds: u64,
    pub shards: Option<u64>,
}

/// Source of the aggregate counts, owned by the hosting runtime.
#[async_trait]
pub trait GuildCountSource: Send + Sync {
    async fn counts(&self) -> GuildCounts;
}

pub struct StatsReporter {
    platform: Arc<PlatformClient>,
    settings: SettingsHandle,
    source: Arc<dyn GuildCountSource>,
    interval: Duration,
}

impl StatsReporter {
    pub fn new(
        platform: Arc<PlatformClient>,
        settings: SettingsHandle,
        source: Arc<dyn GuildCountSource>,
    ) -> Self {
        Self {
            platform,
            settings,
            source,
            interval: STATS_INTERVAL,
        }
    }

    /// Override the posting interval (tests).
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Infinite reporting loop; returns only on cancellation.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Stats reporter started");
        loop {
            self.tick().await;
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Stats reporter shutting down");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    async fn tick(&self) {
        if !self.settings.snapshot().await.post_guild_count {
            debug!("Stat posting disabled, skipping");
            return;
        }
        let counts = self.source.counts().await;
        match self
            .platform
            .post_guild_count(counts.guilds, counts.shards)
            .await
        {
            Ok(()) => info!(guilds = counts.guilds, "Posted server count to the ranking platform"),
            Err(e) => error!(error = %e, "Failed to post server count"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PlatformConfig, RewardSettings};

    struct FixedCounts;

    #[async_trait]
    impl GuildCountSource for FixedCounts {
        async fn counts(&self) -> GuildCounts {
            GuildCounts {
                guilds: 3,
                shards: Some(1),
            }
        }
    }

    fn unreachable_platform() -> Arc<PlatformClient> {
        // Points at an unroutable address so posts fail fast; the loop must
        // survive the failures regardless.
        let config = PlatformConfig {
            base_url: "https://127.0.0.1:1/api".to_string(),
            api_token: "t".to_string(),
            timeout_secs: 1,
            require_https: true,
        };
        Arc::new(PlatformClient::new(&config, 1).unwrap())
    }

    #[tokio::test]
    async fn test_loop_survives_post_failures_and_cancels() {
        let settings = SettingsHandle::new(RewardSettings {
            post_guild_count: true,
            ..RewardSettings::default()
        });
        let reporter = StatsReporter::new(unreachable_platform(), settings, Arc::new(FixedCounts))
            .with_interval(Duration::from_millis(10));

        let shutdown = CancellationToken::new();
        let handle = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { reporter.run(shutdown).await })
        };

        // Let a few failing iterations elapse, then cancel.
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("reporter must stop on cancellation")
            .unwrap();
    }

    #[tokio::test]
    async fn test_disabled_posting_skips_platform_call() {
        let settings = SettingsHandle::new(RewardSettings::default());
        let reporter =
            StatsReporter::new(unreachable_platform(), settings, Arc::new(FixedCounts));
        // With posting disabled the tick never touches the network.
        reporter.tick().await;
    }
}
