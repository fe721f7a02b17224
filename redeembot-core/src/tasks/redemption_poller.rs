// src/tasks/redemption_poller.rs
//
// Steady-state loop: fetch UNFULFILLED redemptions for one reward, fulfill the whole batch
// in one call, sleep, repeat.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::Error;
use crate::platforms::twitch::requests::channel_points::{
    ChannelPointsApi, GetRedemptionsOptions, GetRewardsOptions, MAX_IDS_PER_UPDATE,
    RedemptionStatus, ResolutionStatus,
};
use crate::platforms::twitch::validation::OnSchemaMismatch;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub broadcaster_id: String,
    pub reward_id: String,
    /// Measured from the end of one cycle to the start of the next.
    pub interval: Duration,
    /// Policy for redemption listing. `Empty` keeps the loop alive across odd payloads.
    pub on_schema_mismatch: OnSchemaMismatch,
    /// Look the reward up once before the first cycle.
    pub verify_reward: bool,
    pub page_size: u32,
}

impl PollerConfig {
    pub fn new(broadcaster_id: &str, reward_id: &str) -> Self {
        Self {
            broadcaster_id: broadcaster_id.to_string(),
            reward_id: reward_id.to_string(),
            interval: DEFAULT_POLL_INTERVAL,
            on_schema_mismatch: OnSchemaMismatch::Empty,
            verify_reward: true,
            page_size: MAX_IDS_PER_UPDATE as u32,
        }
    }
}

/// Why the poller stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationCause {
    /// Stop was requested through the handle.
    ManualStop,
    /// A schema mismatch that no call site absorbed.
    UnhandledValidationError(String),
    /// Any other error that escaped a cycle.
    UnhandledError(String),
}

impl TerminationCause {
    fn from_error(e: &Error) -> Self {
        if e.is_schema_mismatch() {
            TerminationCause::UnhandledValidationError(e.to_string())
        } else {
            TerminationCause::UnhandledError(e.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Fetching,
    Terminated(TerminationCause),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleReport {
    pub fetched: usize,
    pub fulfilled: usize,
}

/// Polls one reward's redemption queue and fulfills whatever it finds.
///
/// Failure policy: fulfillment errors are absorbed by the API client and redemption-listing
/// schema mismatches become an empty page (under the default policy). Anything else that
/// escapes a cycle ends the poller with a [`TerminationCause`]. One unhandled error ends it.
pub struct RedemptionPoller {
    api: Arc<dyn ChannelPointsApi>,
    config: PollerConfig,
    state_tx: watch::Sender<PollerState>,
}

impl RedemptionPoller {
    pub fn new(api: Arc<dyn ChannelPointsApi>, config: PollerConfig) -> Self {
        let (state_tx, _) = watch::channel(PollerState::Idle);
        Self {
            api,
            config,
            state_tx,
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    pub fn state(&self) -> PollerState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PollerState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: PollerState) {
        self.state_tx.send_replace(state);
    }

    /// Checks the configured reward exists and is manageable by this token. Reward listing
    /// does not absorb schema mismatches.
    pub async fn verify_reward(&self) -> Result<(), Error> {
        let options = GetRewardsOptions::new(&self.config.broadcaster_id)
            .with_id(&self.config.reward_id)
            .only_manageable(true);
        let rewards = self.api.list_rewards(&options, OnSchemaMismatch::Throw).await?;

        match rewards.iter().find(|r| r.id == self.config.reward_id) {
            Some(reward) => {
                info!(
                    "Watching reward '{}' (id={}, cost={}, enabled={}, paused={})",
                    reward.title, reward.id, reward.cost, reward.is_enabled, reward.is_paused
                );
                if !reward.is_enabled || reward.is_paused {
                    warn!("Reward '{}' is disabled or paused; no redemptions will arrive", reward.title);
                }
            }
            None => warn!(
                "Reward id={} not found among this broadcaster's manageable rewards",
                self.config.reward_id
            ),
        }
        Ok(())
    }

    /// One fetch-then-fulfill pass. Idle -> Fetching -> Idle, whatever the outcome.
    pub async fn run_cycle(&self) -> Result<CycleReport, Error> {
        self.set_state(PollerState::Fetching);
        let result = self.fetch_and_fulfill().await;
        self.set_state(PollerState::Idle);
        result
    }

    async fn fetch_and_fulfill(&self) -> Result<CycleReport, Error> {
        let options = GetRedemptionsOptions::new(
            &self.config.broadcaster_id,
            &self.config.reward_id,
            RedemptionStatus::Unfulfilled,
        )
        .first(self.config.page_size);

        let page = self
            .api
            .list_redemptions(&options, self.config.on_schema_mismatch)
            .await?;
        info!("new redemptions: {}", page.data.len());

        if page.is_empty() {
            return Ok(CycleReport::default());
        }

        let ids = page.ids();
        self.api
            .fulfill_redemptions(
                &self.config.broadcaster_id,
                &self.config.reward_id,
                &ids,
                ResolutionStatus::Fulfilled,
            )
            .await;
        info!("fulfilled {} redemption(s)", ids.len());

        Ok(CycleReport {
            fetched: page.data.len(),
            fulfilled: ids.len(),
        })
    }

    /// Runs until `shutdown` flips to `true` (or its sender goes away) or a cycle fails.
    ///
    /// Shutdown is honoured between cycles; a cycle that has started always finishes.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> TerminationCause {
        if self.config.verify_reward {
            if let Err(e) = self.verify_reward().await {
                return self.terminate(TerminationCause::from_error(&e));
            }
        }

        loop {
            if *shutdown.borrow() {
                return self.terminate(TerminationCause::ManualStop);
            }

            match self.run_cycle().await {
                Ok(report) => debug!("poll cycle done: {:?}", report),
                Err(e) => {
                    error!("poll cycle failed: {}", e);
                    return self.terminate(TerminationCause::from_error(&e));
                }
            }

            tokio::select! {
                _ = sleep(self.config.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return self.terminate(TerminationCause::ManualStop);
                    }
                }
            }
        }
    }

    fn terminate(&self, cause: TerminationCause) -> TerminationCause {
        info!("Redemption poller terminated: {:?}", cause);
        self.set_state(PollerState::Terminated(cause.clone()));
        cause
    }

    /// Run on a tokio task and return a handle that can stop it.
    pub fn spawn(self) -> PollerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let state_rx = self.subscribe_state();
        let join = tokio::spawn(self.run(stop_rx));
        PollerHandle {
            stop_tx,
            state_rx,
            join,
        }
    }
}

pub struct PollerHandle {
    stop_tx: watch::Sender<bool>,
    state_rx: watch::Receiver<PollerState>,
    join: JoinHandle<TerminationCause>,
}

impl PollerHandle {
    /// Ask the poller to stop after the current cycle.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn state(&self) -> PollerState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PollerState> {
        self.state_rx.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub async fn join(self) -> Result<TerminationCause, Error> {
        self.join
            .await
            .map_err(|e| Error::Platform(format!("redemption poller task failed: {e}")))
    }
}
