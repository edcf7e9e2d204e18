use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};

use vote_bridge::{
    api::{create_webhook_router, WebhookState},
    AppConfig, BridgeEvent, CooldownStore, GuildCountSource, GuildCounts, Ledger, MemoryLedger,
    NotificationSink, NotifyError, PlatformClient, ResolvedUser, RewardIssuer, RewardNotice,
    RewardSettings, RoleError, RoleGrantor, RoleSink, SettingsHandle, StatsReporter, UserId,
    UserResolver, VoteChecker, VoteIngestor,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {e}");
        eprintln!("Please check environment variables.");
        e
    })?;
    init_logging(&config)?;

    info!("Starting vote bridge");

    let (settings, cooldowns) = match &config.state_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create state dir {}", dir.display()))?;
            (
                SettingsHandle::load(dir.join("settings.json"))?,
                CooldownStore::with_snapshot(dir.join("cooldowns.json"))?,
            )
        }
        None => (
            SettingsHandle::new(RewardSettings::default()),
            CooldownStore::new(),
        ),
    };
    let cooldowns = Arc::new(cooldowns);

    let ledger: Arc<dyn Ledger> = Arc::new(MemoryLedger::new(
        config.ledger.currency_name.clone(),
        config.ledger.max_balance,
    ));
    let notifier: Arc<dyn NotificationSink> = Arc::new(LogNotifier);
    let platform = Arc::new(PlatformClient::new(&config.platform, config.bot_id)?);

    let issuer = Arc::new(RewardIssuer::new(
        settings.clone(),
        cooldowns.clone(),
        ledger.clone(),
        notifier.clone(),
    ));
    let grantor = Arc::new(RoleGrantor::new(
        settings.clone(),
        platform.clone() as Arc<dyn VoteChecker>,
        Arc::new(LogRoles),
        notifier.clone(),
    ));
    let ingestor = VoteIngestor::new(issuer, Arc::new(OpenResolver), grantor);
    let reporter = StatsReporter::new(platform, settings.clone(), Arc::new(StaticCounts));

    let (events_tx, events_rx) = mpsc::channel::<BridgeEvent>(256);
    let shutdown = CancellationToken::new();

    let ingest_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { ingestor.run(events_rx, shutdown).await }
    });
    let stats_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { reporter.run(shutdown).await }
    });

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
                shutdown.cancel();
            }
        });
    }

    let app = create_webhook_router(WebhookState {
        events: events_tx,
        settings,
    })
    .layer(TraceLayer::new_for_http());

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind to {bind_addr}"))?;
    info!("Vote bridge listening on {bind_addr}");

    let serve_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { serve_shutdown.cancelled().await })
        .await?;

    shutdown.cancel();
    let _ = ingest_task.await;
    let _ = stats_task.await;
    info!("Vote bridge stopped");
    Ok(())
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let level = match config.logging.level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };
    let subscriber = tracing_subscriber::fmt().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {e}"))?;
    Ok(())
}

// Stand-ins for the hosting chat runtime. Deliveries are logged, role
// assignment is a no-op, and every id resolves; an embedding runtime
// supplies real implementations of these traits.

struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn direct_message(&self, user: UserId, notice: &RewardNotice) -> Result<(), NotifyError> {
        info!(user_id = user, "DM delivery:\n{}", notice.render());
        Ok(())
    }

    async fn channel_message(&self, channel: u64, text: &str) -> Result<(), NotifyError> {
        info!(channel_id = channel, "Channel post: {text}");
        Ok(())
    }

    async fn owner_alert(&self, text: &str) -> Result<(), NotifyError> {
        warn!("Owner alert: {text}");
        Ok(())
    }
}

struct LogRoles;

#[async_trait]
impl RoleSink for LogRoles {
    async fn assign_role(&self, guild: u64, user: UserId, role: u64) -> Result<(), RoleError> {
        info!(guild_id = guild, user_id = user, role_id = role, "Role assignment requested");
        Ok(())
    }
}

struct OpenResolver;

#[async_trait]
impl UserResolver for OpenResolver {
    async fn resolve(&self, user: UserId) -> Option<ResolvedUser> {
        Some(ResolvedUser {
            id: user,
            name: format!("user-{user}"),
        })
    }
}

struct StaticCounts;

#[async_trait]
impl GuildCountSource for StaticCounts {
    async fn counts(&self) -> GuildCounts {
        GuildCounts {
            guilds: 1,
            shards: None,
        }
    }
}
