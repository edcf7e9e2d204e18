//! HTTP client for the ranking platform API.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use url::Url;

use crate::config::PlatformConfig;
use crate::UserId;

use super::{BotInfo, PlatformError, VoteChecker, Voter};

/// Authenticated client for the ranking platform, with HTTPS enforcement
/// and bounded request time.
#[derive(Clone)]
pub struct PlatformClient {
    client: Client,
    base_url: Url,
    token: String,
    bot_id: u64,
}

impl PlatformClient {
    pub fn new(config: &PlatformConfig, bot_id: u64) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).context("Invalid platform base URL")?;
        if config.require_https && base_url.scheme() != "https" {
            anyhow::bail!(
                "HTTPS is required but platform URL uses {}: {}",
                base_url.scheme(),
                config.base_url
            );
        }

        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("vote-bridge/0.3");
        if config.require_https {
            builder = builder.https_only(true);
            info!("HTTPS enforcement enabled for platform communications");
        }
        let client = builder.build().context("Failed to create platform HTTP client")?;

        Ok(Self {
            client,
            base_url,
            token: config.api_token.clone(),
            bot_id,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, PlatformError> {
        // Url::join swallows the last path segment without a trailing slash.
        let mut base = self.base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Url::parse(&base)
            .and_then(|b| b.join(path))
            .map_err(|_| PlatformError::NotFound)
    }

    fn translate_status(status: StatusCode) -> Option<PlatformError> {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Some(PlatformError::Unauthorized),
            StatusCode::NOT_FOUND => Some(PlatformError::NotFound),
            s if !s.is_success() => Some(PlatformError::Http { status: s.as_u16() }),
            _ => None,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, PlatformError> {
        let url = self.endpoint(path)?;
        debug!(%url, "Platform GET");
        let response = self
            .client
            .get(url)
            .header("Authorization", &self.token)
            .send()
            .await?;
        if let Some(err) = Self::translate_status(response.status()) {
            return Err(err);
        }
        Ok(response.json().await?)
    }

    /// Has `user` voted for us within the platform's active window?
    pub async fn get_user_vote(&self, user: UserId) -> Result<bool, PlatformError> {
        #[derive(Deserialize)]
        struct CheckResponse {
            voted: u8,
        }
        let path = format!("bots/{}/check?userId={}", self.bot_id, user);
        let check: CheckResponse = self.get_json(&path).await?;
        Ok(check.voted != 0)
    }

    /// Listing information for an arbitrary bot on the platform.
    pub async fn get_bot_info(&self, bot_id: u64) -> Result<BotInfo, PlatformError> {
        self.get_json(&format!("bots/{bot_id}")).await
    }

    /// The month's upvoters for our own listing.
    pub async fn get_bot_upvotes(&self) -> Result<Vec<Voter>, PlatformError> {
        self.get_json(&format!("bots/{}/votes", self.bot_id)).await
    }

    /// Post aggregate guild/shard counts to the platform.
    pub async fn post_guild_count(
        &self,
        guilds: u64,
        shards: Option<u64>,
    ) -> Result<(), PlatformError> {
        let url = self.endpoint(&format!("bots/{}/stats", self.bot_id))?;
        let mut body = json!({ "server_count": guilds });
        if let Some(shards) = shards {
            body["shard_count"] = json!(shards);
        }
        debug!(%url, guilds, "Posting guild count");
        let response = self
            .client
            .post(url)
            .header("Authorization", &self.token)
            .json(&body)
            .send()
            .await?;
        if let Some(err) = Self::translate_status(response.status()) {
            return Err(err);
        }
        Ok(())
    }

    /// URL of the large promotional widget for a bot. No network round trip.
    pub fn get_widget_large(&self, bot_id: u64) -> String {
        let mut base = self.base_url.clone();
        base.set_path(&format!("/api/widget/{bot_id}.svg"));
        base.to_string()
    }
}

#[async_trait]
impl VoteChecker for PlatformClient {
    async fn get_user_vote(&self, user: UserId) -> Result<bool, PlatformError> {
        PlatformClient::get_user_vote(self, user).await
    }
}
