//! Vote Bridge
//!
//! Ingests vote events from an external ranking platform and converts them
//! into idempotent reward grants against a per-user balance ledger, with a
//! 12-hour cooldown window, an optional weekend bonus, and a parallel
//! periodic-stipend claim path that shares the same ledger and cooldown
//! state without double-paying.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs        - Crate root with re-exports
//! ├── main.rs       - Server entrypoint
//! ├── config.rs     - App config + runtime reward settings
//! ├── ledger/       - Balance ledger boundary
//! │   ├── mod.rs       - Ledger trait + deposit overflow signaling
//! │   └── memory.rs    - In-process ledger implementation
//! ├── cooldown/     - Per-user reward state with scoped transactions
//! ├── rewards/      - Reward issuer state machine
//! │   ├── issuer.rs    - grant_vote_reward / claim
//! │   ├── weekend.rs   - Weekend bonus window
//! │   └── format.rs    - Human-readable remaining-time rendering
//! ├── ingest/       - Vote event types, event bus, ingestor loop
//! ├── platform/     - Ranking-platform HTTP client
//! ├── api/          - Webhook endpoint
//! ├── stats.rs      - Periodic guild-count reporter
//! ├── roles.rs      - Upvoter role grantor
//! └── notify.rs     - Notification sink boundary
//! ```

pub mod api;
pub mod config;
pub mod cooldown;
pub mod ingest;
pub mod ledger;
pub mod notify;
pub mod platform;
pub mod rewards;
pub mod roles;
pub mod stats;

/// User identifier on the hosting chat runtime.
pub type UserId = u64;
/// Guild (server) identifier.
pub type GuildId = u64;
/// Text channel identifier.
pub type ChannelId = u64;
/// Role identifier.
pub type RoleId = u64;

// Re-export main types for convenience
pub use config::{AppConfig, RewardSettings, RoleBinding, SettingsHandle};
pub use cooldown::{CooldownStore, UserRewardState};
pub use ingest::{BridgeEvent, ResolvedUser, UserResolver, VoteEvent, VoteIngestor, VoteKind};
pub use ledger::{DepositError, Ledger, MemoryLedger};
pub use notify::{NotificationSink, NotifyError, RewardNotice};
pub use platform::{BotInfo, PlatformClient, PlatformError, VoteChecker, Voter};
pub use rewards::{RewardIssuer, RewardOutcome, COOLDOWN_SECS};
pub use roles::{RoleError, RoleGrantor, RoleSink};
pub use stats::{GuildCountSource, GuildCounts, StatsReporter};
