//! Implements the Helix channel points requests the agent needs:
//!  - getCustomReward
//!  - getCustomRewardRedemption
//!  - updateRedemptionStatus
//!  - createCustomReward (one-shot administrative helper)

use std::fmt;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error, info, trace, warn};

use crate::Error;
use crate::platforms::twitch::client::TwitchHelixClient;
use crate::platforms::twitch::validation::{
    OnSchemaMismatch, validate_redemption_list, validate_reward_list,
};
use crate::query::QueryString;

const REWARDS_ENDPOINT: &str = "/channel_points/custom_rewards";
const REDEMPTIONS_ENDPOINT: &str = "/channel_points/custom_rewards/redemptions";

/// Helix accepts at most this many redemption ids per status update.
pub const MAX_IDS_PER_UPDATE: usize = 50;

/// Represents a single custom reward returned by Helix.
///
/// Images and the per-stream settings objects are kept as raw JSON and their shape is not
/// checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomReward {
    pub broadcaster_name: String,
    pub broadcaster_login: String,
    pub broadcaster_id: String,
    pub id: String,
    #[serde(default)]
    pub image: Value,
    pub background_color: String,
    pub is_enabled: bool,
    pub cost: u64,
    pub title: String,
    pub prompt: String,
    pub is_user_input_required: bool,
    #[serde(default)]
    pub max_per_stream_setting: Value,
    #[serde(default)]
    pub max_per_user_per_stream_setting: Value,
    #[serde(default)]
    pub global_cooldown_setting: Value,
    pub is_paused: bool,
    pub is_in_stock: bool,
    #[serde(default)]
    pub default_image: Value,
    pub should_redemptions_skip_request_queue: bool,
    #[serde(default)]
    pub redemptions_redeemed_current_stream: Option<u64>,
    #[serde(default)]
    pub cooldown_expires_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RedemptionStatus {
    Unfulfilled,
    Fulfilled,
    Canceled,
}

impl RedemptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedemptionStatus::Unfulfilled => "UNFULFILLED",
            RedemptionStatus::Fulfilled => "FULFILLED",
            RedemptionStatus::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for RedemptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The statuses a redemption can be moved to. UNFULFILLED is not a valid target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionStatus {
    Fulfilled,
    Canceled,
}

impl ResolutionStatus {
    pub fn as_str(&self) -> &'static str {
        RedemptionStatus::from(*self).as_str()
    }
}

impl From<ResolutionStatus> for RedemptionStatus {
    fn from(s: ResolutionStatus) -> Self {
        match s {
            ResolutionStatus::Fulfilled => RedemptionStatus::Fulfilled,
            ResolutionStatus::Canceled => RedemptionStatus::Canceled,
        }
    }
}

impl fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedemptionSort {
    Oldest,
    Newest,
}

impl fmt::Display for RedemptionSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedemptionSort::Oldest => f.write_str("OLDEST"),
            RedemptionSort::Newest => f.write_str("NEWEST"),
        }
    }
}

/// Redemption object returned by "Get Custom Reward Redemption" calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Redemption {
    pub id: String,
    pub broadcaster_id: String,
    #[serde(default)]
    pub broadcaster_login: Option<String>,
    #[serde(default)]
    pub broadcaster_name: Option<String>,
    pub user_id: String,
    #[serde(default)]
    pub user_login: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    pub user_input: String,
    pub status: RedemptionStatus,
    pub redeemed_at: String,
    pub reward: RedemptionReward,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedemptionReward {
    pub id: String,
    pub title: String,
    pub prompt: String,
    pub cost: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub cursor: Option<String>,
}

/// One page of redemptions. `Default` is the empty page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RedemptionPage {
    pub data: Vec<Redemption>,
    #[serde(default)]
    pub pagination: Pagination,
}

impl RedemptionPage {
    pub fn ids(&self) -> Vec<String> {
        self.data.iter().map(|r| r.id.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Query options for "Get Custom Reward".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetRewardsOptions {
    pub broadcaster_id: String,
    pub id: Vec<String>,
    pub only_manageable_rewards: Option<bool>,
}

impl GetRewardsOptions {
    pub fn new(broadcaster_id: &str) -> Self {
        Self {
            broadcaster_id: broadcaster_id.to_string(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id.push(id.to_string());
        self
    }

    pub fn only_manageable(mut self, only: bool) -> Self {
        self.only_manageable_rewards = Some(only);
        self
    }

    pub fn to_query(&self) -> QueryString {
        let mut q = QueryString::new();
        q.push("broadcaster_id", &self.broadcaster_id)
            .push_all("id", &self.id)
            .push_opt("only_manageable_rewards", self.only_manageable_rewards);
        q
    }
}

/// Query options for "Get Custom Reward Redemption".
#[derive(Debug, Clone, PartialEq)]
pub struct GetRedemptionsOptions {
    pub broadcaster_id: String,
    pub reward_id: String,
    pub status: RedemptionStatus,
    pub id: Vec<String>,
    /// Helix defaults to OLDEST.
    pub sort: Option<RedemptionSort>,
    pub after: Option<String>,
    pub first: Option<u32>,
}

impl GetRedemptionsOptions {
    pub fn new(broadcaster_id: &str, reward_id: &str, status: RedemptionStatus) -> Self {
        Self {
            broadcaster_id: broadcaster_id.to_string(),
            reward_id: reward_id.to_string(),
            status,
            id: Vec::new(),
            sort: None,
            after: None,
            first: None,
        }
    }

    pub fn first(mut self, first: u32) -> Self {
        self.first = Some(first);
        self
    }

    pub fn sort(mut self, sort: RedemptionSort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn after(mut self, cursor: &str) -> Self {
        self.after = Some(cursor.to_string());
        self
    }

    pub fn to_query(&self) -> QueryString {
        let mut q = QueryString::new();
        q.push("broadcaster_id", &self.broadcaster_id)
            .push("reward_id", &self.reward_id)
            .push("status", self.status)
            .push_all("id", &self.id)
            .push_opt("sort", self.sort)
            .push_opt("after", self.after.as_deref())
            .push_opt("first", self.first);
        q
    }
}

/// Request body for creating a custom reward. Only the set fields are sent.
#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct CustomRewardBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_enabled: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_user_input_required: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub should_redemptions_skip_request_queue: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_paused: Option<bool>,
}

impl CustomRewardBody {
    /// The reward the agent sets up when asked to create one.
    pub fn sample() -> Self {
        Self {
            title: Some("Sample: Follow me!".to_string()),
            prompt: Some("Follows the requesting user!".to_string()),
            cost: Some(10 * 1000 * 1000),
            is_enabled: Some(true),
            ..Default::default()
        }
    }
}

/// The channel-points surface the poller depends on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChannelPointsApi: Send + Sync {
    async fn list_rewards(
        &self,
        options: &GetRewardsOptions,
        on_mismatch: OnSchemaMismatch,
    ) -> Result<Vec<CustomReward>, Error>;

    async fn list_redemptions(
        &self,
        options: &GetRedemptionsOptions,
        on_mismatch: OnSchemaMismatch,
    ) -> Result<RedemptionPage, Error>;

    /// Never fails: an empty id list is a no-op and transport errors are logged.
    async fn fulfill_redemptions(
        &self,
        broadcaster_id: &str,
        reward_id: &str,
        redemption_ids: &[String],
        status: ResolutionStatus,
    );

    /// Returns the new reward id, or `None` on any failure.
    async fn create_reward(&self, broadcaster_id: &str, body: &CustomRewardBody) -> Option<String>;
}

impl TwitchHelixClient {
    /// Gets custom rewards for a broadcaster.
    /// Required scope: `channel:read:redemptions` or `channel:manage:redemptions`.
    pub async fn get_custom_rewards(
        &self,
        options: &GetRewardsOptions,
        on_mismatch: OnSchemaMismatch,
    ) -> Result<Vec<CustomReward>, Error> {
        let query = options.to_query();
        debug!("get_custom_rewards => query='{}'", query);

        let resp = self.send_helix(Method::GET, REWARDS_ENDPOINT, &query, None).await?;
        // Helix answers an `id` lookup that matches nothing manageable with 404.
        if resp.status == 404 {
            info!("get_custom_rewards => HTTP 404 (no matching rewards): {}", resp.body);
            return Ok(Vec::new());
        }
        if !resp.is_success() {
            warn!("GET {} => HTTP {} body={}", REWARDS_ENDPOINT, resp.status, resp.body);
        }
        let rewards = on_mismatch.resolve(validate_reward_list(resp.json()?), "rewards")?;

        debug!(
            "get_custom_rewards => returned {} rewards for broadcaster_id='{}'",
            rewards.len(),
            options.broadcaster_id
        );
        Ok(rewards)
    }

    /// Gets one page of redemptions for a reward.
    /// Required scope: `channel:read:redemptions` or `channel:manage:redemptions`.
    pub async fn get_custom_reward_redemptions(
        &self,
        options: &GetRedemptionsOptions,
        on_mismatch: OnSchemaMismatch,
    ) -> Result<RedemptionPage, Error> {
        let query = options.to_query();
        debug!("get_custom_reward_redemptions => query='{}'", query);

        let payload = self.get_json(REDEMPTIONS_ENDPOINT, &query).await?;
        let page = on_mismatch.resolve(validate_redemption_list(payload), "redemptions")?;

        debug!(
            "get_custom_reward_redemptions => returned {} redemptions",
            page.data.len()
        );
        Ok(page)
    }

    /// Moves redemptions to FULFILLED or CANCELED.
    /// Required scope: `channel:manage:redemptions`.
    ///
    /// Fire and forget: the response body is ignored and failures are only logged, so a bad
    /// batch can never take the caller down. Up to [`MAX_IDS_PER_UPDATE`] ids go out in a
    /// single call; longer lists are split.
    pub async fn update_redemption_status(
        &self,
        broadcaster_id: &str,
        reward_id: &str,
        redemption_ids: &[String],
        status: ResolutionStatus,
    ) {
        if redemption_ids.is_empty() {
            trace!("update_redemption_status => no ids, nothing to do");
            return;
        }

        for batch in redemption_ids.chunks(MAX_IDS_PER_UPDATE) {
            let mut query = QueryString::new();
            query
                .push("broadcaster_id", broadcaster_id)
                .push("reward_id", reward_id)
                .push_all("id", batch);

            debug!(
                "update_redemption_status => redemption_ids={:?} new_status='{}'",
                batch, status
            );

            let body = json!({ "status": status.as_str() });
            match self
                .send_helix(Method::PATCH, REDEMPTIONS_ENDPOINT, &query, Some(body))
                .await
            {
                Ok(resp) if resp.is_success() => {
                    trace!("update_redemption_status => HTTP {}", resp.status);
                }
                Ok(resp) => {
                    warn!(
                        "update_redemption_status => status={} body={}",
                        resp.status, resp.body
                    );
                }
                Err(e) => {
                    error!("update_redemption_status failed for {} ids: {}", batch.len(), e);
                }
            }
        }
    }

    /// Creates a custom reward in the broadcaster's channel.
    /// Required scope: `channel:manage:redemptions`
    pub async fn create_custom_reward(
        &self,
        broadcaster_id: &str,
        body: &CustomRewardBody,
    ) -> Option<String> {
        match self.try_create_custom_reward(broadcaster_id, body).await {
            Ok(id) => {
                info!("Created custom reward '{}' (id={})", body.title.as_deref().unwrap_or(""), id);
                Some(id)
            }
            Err(e) => {
                error!("Failed to add the reward. Please try again. ({})", e);
                None
            }
        }
    }

    async fn try_create_custom_reward(
        &self,
        broadcaster_id: &str,
        body: &CustomRewardBody,
    ) -> Result<String, Error> {
        let mut query = QueryString::new();
        query.push("broadcaster_id", broadcaster_id);
        debug!("create_custom_reward => body={:?}", body);

        let resp = self
            .send_helix(Method::POST, REWARDS_ENDPOINT, &query, Some(serde_json::to_value(body)?))
            .await?;

        trace!("create_custom_reward => HTTP {} => body={}", resp.status, resp.body);
        if !resp.is_success() {
            return Err(Error::Platform(format!(
                "create_custom_reward: HTTP {} => {}",
                resp.status, resp.body
            )));
        }

        validate_reward_list(resp.json()?)?
            .into_iter()
            .next()
            .map(|reward| reward.id)
            .ok_or_else(|| Error::Platform("No reward returned by create_custom_reward".into()))
    }
}

#[async_trait]
impl ChannelPointsApi for TwitchHelixClient {
    async fn list_rewards(
        &self,
        options: &GetRewardsOptions,
        on_mismatch: OnSchemaMismatch,
    ) -> Result<Vec<CustomReward>, Error> {
        self.get_custom_rewards(options, on_mismatch).await
    }

    async fn list_redemptions(
        &self,
        options: &GetRedemptionsOptions,
        on_mismatch: OnSchemaMismatch,
    ) -> Result<RedemptionPage, Error> {
        self.get_custom_reward_redemptions(options, on_mismatch).await
    }

    async fn fulfill_redemptions(
        &self,
        broadcaster_id: &str,
        reward_id: &str,
        redemption_ids: &[String],
        status: ResolutionStatus,
    ) {
        self.update_redemption_status(broadcaster_id, reward_id, redemption_ids, status)
            .await
    }

    async fn create_reward(&self, broadcaster_id: &str, body: &CustomRewardBody) -> Option<String> {
        self.create_custom_reward(broadcaster_id, body).await
    }
}
