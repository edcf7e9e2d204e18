//! Configuration management.
//!
//! Two layers: [`AppConfig`] is immutable, loaded once from the environment
//! and validated at startup. [`RewardSettings`] is the runtime-mutable
//! reward configuration, mutated only through the explicit operations on
//! [`SettingsHandle`] and persisted as a JSON snapshot after every update.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{ChannelId, GuildId, RoleId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Webhook server configuration
    pub server: ServerConfig,
    /// Ranking-platform client configuration
    pub platform: PlatformConfig,
    /// Ledger configuration
    pub ledger: LedgerConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Our own entity id on the ranking platform
    pub bot_id: u64,
    /// Directory for settings and cooldown snapshots (in-memory only if unset)
    pub state_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind the webhook listener to
    pub host: String,
    /// Port to bind the webhook listener to
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Base URL of the ranking platform API
    pub base_url: String,
    /// API token - MUST be from environment
    pub api_token: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Require HTTPS for all platform communications
    pub require_https: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Display name of the virtual currency
    pub currency_name: String,
    /// Hard balance ceiling; deposits are clamped, never exceeded
    pub max_balance: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8130,
            },
            platform: PlatformConfig {
                base_url: "https://top.gg/api".to_string(),
                api_token: String::new(), // MUST be configured
                timeout_secs: 30,
                require_https: true,
            },
            ledger: LedgerConfig {
                currency_name: "credits".to_string(),
                max_balance: i64::MAX as u64,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
            bot_id: 0,
            state_dir: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and validate.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = env::var("VOTE_BRIDGE_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = env::var("VOTE_BRIDGE_PORT") {
            config.server.port = port.parse().context("Invalid VOTE_BRIDGE_PORT value")?;
        }

        if let Ok(base_url) = env::var("VOTE_BRIDGE_PLATFORM_URL") {
            config.platform.base_url = base_url;
        }
        config.platform.api_token = env::var("VOTE_BRIDGE_PLATFORM_TOKEN")
            .context("VOTE_BRIDGE_PLATFORM_TOKEN environment variable is required")?;
        if let Ok(timeout) = env::var("VOTE_BRIDGE_PLATFORM_TIMEOUT_SECS") {
            config.platform.timeout_secs = timeout
                .parse()
                .context("Invalid VOTE_BRIDGE_PLATFORM_TIMEOUT_SECS value")?;
        }
        if let Ok(require_https) = env::var("VOTE_BRIDGE_REQUIRE_HTTPS") {
            config.platform.require_https = require_https
                .parse()
                .context("Invalid VOTE_BRIDGE_REQUIRE_HTTPS value")?;
        }

        if let Ok(currency) = env::var("VOTE_BRIDGE_CURRENCY_NAME") {
            config.ledger.currency_name = currency;
        }
        if let Ok(max) = env::var("VOTE_BRIDGE_MAX_BALANCE") {
            config.ledger.max_balance = max
                .parse()
                .context("Invalid VOTE_BRIDGE_MAX_BALANCE value")?;
        }

        if let Ok(level) = env::var("VOTE_BRIDGE_LOG_LEVEL") {
            config.logging.level = level;
        }

        config.bot_id = env::var("VOTE_BRIDGE_BOT_ID")
            .context("VOTE_BRIDGE_BOT_ID environment variable is required")?
            .parse()
            .context("Invalid VOTE_BRIDGE_BOT_ID value")?;

        if let Ok(dir) = env::var("VOTE_BRIDGE_STATE_DIR") {
            config.state_dir = Some(PathBuf::from(dir));
        } else {
            warn!("VOTE_BRIDGE_STATE_DIR not set, reward state will not survive restarts");
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            bail!("Server host cannot be empty");
        }
        if self.server.port == 0 {
            bail!("Server port must be non-zero");
        }
        if self.platform.api_token.is_empty() {
            bail!("Platform API token is required");
        }
        if self.platform.require_https && !self.platform.base_url.starts_with("https://") {
            bail!(
                "HTTPS is required but platform URL is not HTTPS: {}",
                self.platform.base_url
            );
        }
        if self.ledger.max_balance == 0 {
            bail!("Ledger maximum balance must be non-zero");
        }
        if self.bot_id == 0 {
            bail!("Bot id must be non-zero");
        }
        Ok(())
    }
}

/// Support-server role binding: new members of `guild_id` who have upvoted
/// receive `role_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBinding {
    pub guild_id: GuildId,
    pub role_id: RoleId,
}

/// Runtime-mutable reward configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardSettings {
    pub rewards_enabled: bool,
    pub base_amount: u64,
    pub weekend_bonus_enabled: bool,
    pub weekend_bonus_amount: u64,
    pub notification_channel: Option<ChannelId>,
    pub support_role_binding: Option<RoleBinding>,
    pub post_guild_count: bool,
    pub webhook_auth: Option<String>,
}

impl Default for RewardSettings {
    fn default() -> Self {
        Self {
            rewards_enabled: false,
            base_amount: 100,
            weekend_bonus_enabled: false,
            weekend_bonus_amount: 500,
            notification_channel: None,
            support_role_binding: None,
            post_guild_count: false,
            webhook_auth: None,
        }
    }
}

/// Shared handle over the reward settings.
///
/// Reward flows take a [`snapshot`](SettingsHandle::snapshot) at the start
/// of each operation; admin operations mutate under a single write guard and
/// persist before returning, so a partial multi-field update is never
/// observable.
#[derive(Clone)]
pub struct SettingsHandle {
    inner: Arc<RwLock<RewardSettings>>,
    persist_path: Option<Arc<PathBuf>>,
}

impl SettingsHandle {
    /// In-memory handle (tests, ephemeral deployments).
    pub fn new(settings: RewardSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
            persist_path: None,
        }
    }

    /// Handle backed by a JSON settings file, loading prior state if present.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let settings = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("invalid settings file {}", path.display()))?
        } else {
            RewardSettings::default()
        };
        Ok(Self {
            inner: Arc::new(RwLock::new(settings)),
            persist_path: Some(Arc::new(path)),
        })
    }

    pub async fn snapshot(&self) -> RewardSettings {
        self.inner.read().await.clone()
    }

    async fn update<F: FnOnce(&mut RewardSettings)>(&self, f: F) -> Result<RewardSettings> {
        let mut guard = self.inner.write().await;
        f(&mut guard);
        if let Some(path) = &self.persist_path {
            let raw = serde_json::to_string_pretty(&*guard)?;
            let tmp = path.with_extension("json.tmp");
            std::fs::write(&tmp, raw)
                .with_context(|| format!("failed to write settings {}", path.display()))?;
            std::fs::rename(&tmp, path.as_ref())?;
        }
        Ok(guard.clone())
    }

    // Admin operation surface. Amount setters enforce the configuration-time
    // invariant: amounts strictly below the ledger ceiling. Grant-time
    // overflow is still possible (balances accumulate) and handled there.

    /// Toggle the reward feature, returning the new state.
    pub async fn toggle_rewards(&self) -> Result<bool> {
        let updated = self.update(|s| s.rewards_enabled = !s.rewards_enabled).await?;
        info!(enabled = updated.rewards_enabled, "Vote rewards toggled");
        Ok(updated.rewards_enabled)
    }

    pub async fn set_base_amount(&self, amount: u64, max_balance: u64) -> Result<()> {
        if amount == 0 {
            bail!("The reward amount must be greater than zero.");
        }
        if amount >= max_balance {
            bail!("The amount needs to be lower than the ledger maximum balance.");
        }
        self.update(|s| s.base_amount = amount).await?;
        Ok(())
    }

    /// Toggle the weekend bonus, returning the new state.
    pub async fn toggle_weekend_bonus(&self) -> Result<bool> {
        let updated = self
            .update(|s| s.weekend_bonus_enabled = !s.weekend_bonus_enabled)
            .await?;
        Ok(updated.weekend_bonus_enabled)
    }

    pub async fn set_weekend_bonus_amount(&self, amount: u64, max_balance: u64) -> Result<()> {
        if amount >= max_balance {
            bail!("The amount needs to be lower than the ledger maximum balance.");
        }
        self.update(|s| s.weekend_bonus_amount = amount).await?;
        Ok(())
    }

    pub async fn set_notification_channel(&self, channel: ChannelId) -> Result<()> {
        self.update(|s| s.notification_channel = Some(channel)).await?;
        Ok(())
    }

    pub async fn clear_notification_channel(&self) -> Result<()> {
        self.update(|s| s.notification_channel = None).await?;
        Ok(())
    }

    pub async fn set_role_binding(&self, guild_id: GuildId, role_id: RoleId) -> Result<()> {
        self.update(|s| s.support_role_binding = Some(RoleBinding { guild_id, role_id }))
            .await?;
        Ok(())
    }

    pub async fn clear_role_binding(&self) -> Result<()> {
        self.update(|s| s.support_role_binding = None).await?;
        Ok(())
    }

    /// Toggle stat posting, returning the new state.
    pub async fn toggle_post_guild_count(&self) -> Result<bool> {
        let updated = self.update(|s| s.post_guild_count = !s.post_guild_count).await?;
        Ok(updated.post_guild_count)
    }

    /// Generate and persist a fresh webhook authorization token. The token
    /// is returned so the operator can register it on the platform side.
    pub async fn generate_webhook_token(&self) -> Result<String> {
        let token = Uuid::new_v4().to_string();
        let t = token.clone();
        self.update(move |s| s.webhook_auth = Some(t)).await?;
        Ok(token)
    }
}
