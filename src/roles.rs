//! Upvoter role grantor.
//!
//! Reacts to member-join events: when a support-role binding matches the
//! joining guild and the member has an active upvote, the bound role is
//! applied. Losing the permission to manage roles disables the feature and
//! alerts the owner rather than retrying forever.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::SettingsHandle;
use crate::notify::NotificationSink;
use crate::platform::VoteChecker;
use crate::{GuildId, RoleId, UserId};

#[derive(Debug, Error)]
pub enum RoleError {
    /// We no longer have permission to manage roles in the guild.
    #[error("missing permission to manage roles")]
    Forbidden,
    #[error("role assignment failure: {0}")]
    Other(String),
}

/// Role assignment surface implemented by the hosting runtime.
#[async_trait]
pub trait RoleSink: Send + Sync {
    async fn assign_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<(), RoleError>;
}

pub struct RoleGrantor {
    settings: SettingsHandle,
    votes: Arc<dyn VoteChecker>,
    roles: Arc<dyn RoleSink>,
    notifier: Arc<dyn NotificationSink>,
}

impl RoleGrantor {
    pub fn new(
        settings: SettingsHandle,
        votes: Arc<dyn VoteChecker>,
        roles: Arc<dyn RoleSink>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            settings,
            votes,
            roles,
            notifier,
        }
    }

    pub async fn handle_member_join(&self, guild: GuildId, user: UserId) {
        let settings = self.settings.snapshot().await;
        let Some(binding) = settings.support_role_binding else {
            return;
        };
        if binding.guild_id != guild {
            return;
        }

        let voted = match self.votes.get_user_vote(user).await {
            Ok(voted) => voted,
            Err(e) => {
                error!(user_id = user, error = %e, "Failed to fetch vote status");
                return;
            }
        };
        if !voted {
            return;
        }

        match self.roles.assign_role(guild, user, binding.role_id).await {
            Ok(()) => {
                info!(user_id = user, guild_id = guild, role_id = binding.role_id, "Upvoter role granted");
            }
            Err(RoleError::Forbidden) => {
                // Self-disable instead of failing on every join.
                warn!(guild_id = guild, "Lost permission to assign roles, disabling role rewards");
                if let Err(e) = self.settings.clear_role_binding().await {
                    warn!(error = %e, "Failed to clear role binding");
                }
                let alert = format!(
                    "It seems that I no longer have permission to add roles for upvoters \
                     in guild `{guild}`. Role rewards have been disabled."
                );
                if let Err(e) = self.notifier.owner_alert(&alert).await {
                    warn!(error = %e, "Failed to deliver owner alert");
                }
            }
            Err(e) => {
                error!(user_id = user, guild_id = guild, error = %e, "Role assignment failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RewardSettings, RoleBinding};
    use crate::notify::{NotifyError, RewardNotice};
    use crate::platform::PlatformError;
    use crate::ChannelId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct StubVotes {
        voted: bool,
    }

    #[async_trait]
    impl VoteChecker for StubVotes {
        async fn get_user_vote(&self, _user: UserId) -> Result<bool, PlatformError> {
            Ok(self.voted)
        }
    }

    #[derive(Default)]
    struct StubRoles {
        forbidden: bool,
        assigned: AtomicUsize,
    }

    #[async_trait]
    impl RoleSink for StubRoles {
        async fn assign_role(
            &self,
            _guild: GuildId,
            _user: UserId,
            _role: RoleId,
        ) -> Result<(), RoleError> {
            if self.forbidden {
                return Err(RoleError::Forbidden);
            }
            self.assigned.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct StubNotifier {
        alerts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationSink for StubNotifier {
        async fn direct_message(
            &self,
            _user: UserId,
            _notice: &RewardNotice,
        ) -> Result<(), NotifyError> {
            Ok(())
        }

        async fn channel_message(&self, _c: ChannelId, _t: &str) -> Result<(), NotifyError> {
            Ok(())
        }

        async fn owner_alert(&self, text: &str) -> Result<(), NotifyError> {
            self.alerts.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn bound_settings() -> SettingsHandle {
        SettingsHandle::new(RewardSettings {
            support_role_binding: Some(RoleBinding {
                guild_id: 10,
                role_id: 20,
            }),
            ..RewardSettings::default()
        })
    }

    #[tokio::test]
    async fn test_grants_role_to_upvoter() {
        let roles = Arc::new(StubRoles::default());
        let grantor = RoleGrantor::new(
            bound_settings(),
            Arc::new(StubVotes { voted: true }),
            roles.clone(),
            Arc::new(StubNotifier::default()),
        );

        grantor.handle_member_join(10, 1).await;
        assert_eq!(roles.assigned.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ignores_other_guilds_and_non_voters() {
        let roles = Arc::new(StubRoles::default());
        let grantor = RoleGrantor::new(
            bound_settings(),
            Arc::new(StubVotes { voted: false }),
            roles.clone(),
            Arc::new(StubNotifier::default()),
        );

        grantor.handle_member_join(99, 1).await; // wrong guild
        grantor.handle_member_join(10, 1).await; // not an upvoter
        assert_eq!(roles.assigned.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_forbidden_disables_binding_and_alerts() {
        let settings = bound_settings();
        let notifier = Arc::new(StubNotifier::default());
        let grantor = RoleGrantor::new(
            settings.clone(),
            Arc::new(StubVotes { voted: true }),
            Arc::new(StubRoles {
                forbidden: true,
                ..StubRoles::default()
            }),
            notifier.clone(),
        );

        grantor.handle_member_join(10, 1).await;

        assert_eq!(settings.snapshot().await.support_role_binding, None);
        let alerts = notifier.alerts.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].contains("disabled"));
    }
}
