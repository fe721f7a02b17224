// File: redeembot-server/src/agent.rs
//
// Wires the handshake, reward setup and poller together for the binary.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info, warn};

use redeembot_common::Error;
use redeembot_common::models::Credentials;
use redeembot_core::auth::{start_callback_server, test_port_available};
use redeembot_core::platforms::twitch::requests::channel_points::CustomRewardBody;
use redeembot_core::platforms::twitch::{AuthConfig, AuthSession, TwitchHelixClient};
use redeembot_core::tasks::{PollerConfig, PollerState, RedemptionPoller, TerminationCause};

use crate::Args;

pub async fn run(args: Args) -> Result<TerminationCause, Error> {
    let api = Arc::new(TwitchHelixClient::with_reqwest(&args.client_id));

    let credentials = match &args.access_token {
        Some(token) => {
            info!("Using the provided access token; skipping the OAuth handshake.");
            let creds = Credentials::new(token, args.refresh_token.as_deref().unwrap_or(""));
            api.set_credentials(creds.clone());
            creds
        }
        None => authenticate(&api, &args).await?,
    };
    info!(
        "Authenticated. scopes=[{}], refresh_token={}",
        credentials.scopes.join(" "),
        if credentials.has_refresh_token() { "yes" } else { "no" }
    );

    let broadcaster_id = match &args.broadcaster_id {
        Some(id) => id.clone(),
        None => {
            let validation = api.validate_token().await?;
            info!(
                "Token belongs to login={:?}, user_id={:?}",
                validation.login, validation.user_id
            );
            validation.user_id.ok_or_else(|| {
                Error::Config("token is not a user token; pass --broadcaster-id".into())
            })?
        }
    };

    let reward_id = resolve_reward(&api, &args, &broadcaster_id).await?;

    let mut config = PollerConfig::new(&broadcaster_id, &reward_id);
    config.interval = args.poll_interval();
    config.verify_reward = !args.skip_reward_check;

    info!(
        "Polling reward {} for broadcaster {} every {:?}",
        reward_id, broadcaster_id, config.interval
    );
    let handle = RedemptionPoller::new(api.clone(), config).spawn();
    let mut state_rx = handle.subscribe_state();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received; stopping after the current cycle.");
            handle.stop();
        }
        _ = state_rx.wait_for(|s| matches!(s, PollerState::Terminated(_))) => {}
    }

    handle.join().await
}

async fn authenticate(api: &TwitchHelixClient, args: &Args) -> Result<Credentials, Error> {
    let client_secret = args
        .client_secret
        .as_deref()
        .ok_or_else(|| Error::Config("CLIENT_SECRET is required for the OAuth handshake".into()))?;

    test_port_available(args.port).await?;
    let listener = start_callback_server(SocketAddr::from(([127, 0, 0, 1], args.port))).await?;

    let config = AuthConfig::new(&args.client_id, client_secret)
        .with_port(args.port)
        .with_timeout(args.handshake_timeout());
    let no_browser = args.no_browser;

    let result = AuthSession::new(config)
        .start(api, listener.code_rx, |url| {
            info!("Open this URL to authorize: {}", url);
            if !no_browser {
                if let Err(e) = open::that(url) {
                    warn!("Could not open a browser ({}); open the URL manually.", e);
                }
            }
        })
        .await;

    let _ = listener.shutdown_tx.send(());
    result
}

async fn resolve_reward(
    api: &TwitchHelixClient,
    args: &Args,
    broadcaster_id: &str,
) -> Result<String, Error> {
    if !args.create_reward {
        return args
            .reward_id
            .clone()
            .ok_or_else(|| Error::Config("REWARD_ID is required unless --create-reward is set".into()));
    }

    let mut body = CustomRewardBody::sample();
    if let Some(title) = &args.reward_title {
        body.title = Some(title.clone());
    }
    if let Some(cost) = args.reward_cost {
        body.cost = Some(cost);
    }

    match api.create_custom_reward(broadcaster_id, &body).await {
        Some(id) => Ok(id),
        None => {
            error!("Reward creation failed; nothing to poll.");
            Err(Error::Platform("could not create the custom reward".into()))
        }
    }
}
