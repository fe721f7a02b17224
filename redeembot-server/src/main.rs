use std::process;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use redeembot_core::tasks::TerminationCause;

mod agent;

#[derive(Parser, Debug, Clone)]
#[command(name = "redeembot")]
#[command(author, version, about = "Redeembot - fulfills channel-point redemptions for one reward")]
pub struct Args {
    /// Twitch application client id
    #[arg(long, env = "CLIENT_ID")]
    pub client_id: String,

    /// Twitch application client secret (needed for the OAuth handshake)
    #[arg(long, env = "CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Pre-provisioned user access token; skips the OAuth handshake when set
    #[arg(long, env = "ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Refresh token that goes with --access-token
    #[arg(long, env = "REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: Option<String>,

    /// Broadcaster user id. Looked up from the token when omitted.
    #[arg(long, env = "BROADCASTER_ID")]
    pub broadcaster_id: Option<String>,

    /// Custom reward whose redemptions get fulfilled
    #[arg(long, env = "REWARD_ID")]
    pub reward_id: Option<String>,

    /// Local port for the OAuth redirect (http://localhost:<port>)
    #[arg(long, env = "CALLBACK_PORT", default_value = "3000")]
    pub port: u16,

    /// Seconds between the end of one poll cycle and the start of the next
    #[arg(long, default_value = "15")]
    pub poll_interval_secs: u64,

    /// Give up on the browser flow after this many seconds (default: wait forever)
    #[arg(long)]
    pub handshake_timeout_secs: Option<u64>,

    /// Print the authorization URL instead of opening a browser
    #[arg(long, default_value = "false")]
    pub no_browser: bool,

    /// Create the custom reward before polling and watch the new one
    #[arg(long, default_value = "false")]
    pub create_reward: bool,

    /// Title for --create-reward
    #[arg(long)]
    pub reward_title: Option<String>,

    /// Cost for --create-reward
    #[arg(long)]
    pub reward_cost: Option<u64>,

    /// Do not look the reward up before the first poll cycle
    #[arg(long, default_value = "false")]
    pub skip_reward_check: bool,
}

impl Args {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn handshake_timeout(&self) -> Option<Duration> {
        self.handshake_timeout_secs.map(Duration::from_secs)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("redeembot_core=info,redeembot_server=info"));
    fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() {
    let _ = dotenv::dotenv();
    init_tracing();
    let args = Args::parse();
    info!(
        "Redeembot starting. port={}, interval={}s, handshake={}",
        args.port,
        args.poll_interval_secs,
        if args.access_token.is_some() { "skipped" } else { "oauth" }
    );

    match agent::run(args).await {
        Ok(TerminationCause::ManualStop) => info!("Stopped. Goodbye!"),
        Ok(cause) => {
            error!("Redemption poller terminated: {:?}", cause);
            process::exit(1);
        }
        Err(e) => {
            error!("Startup failed: {}", e);
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let args = Args::try_parse_from(["redeembot", "--client-id", "cid", "--reward-id", "rw1"]).unwrap();
        assert_eq!(args.port, 3000);
        assert_eq!(args.poll_interval(), Duration::from_secs(15));
        assert_eq!(args.handshake_timeout(), None);
        assert!(!args.create_reward);
    }

    #[test]
    fn client_id_is_required() {
        use clap::CommandFactory;

        let cmd = Args::command();
        let client_id = cmd
            .get_arguments()
            .find(|a| a.get_id() == "client_id")
            .expect("client_id argument");
        assert!(client_id.is_required_set());
        assert_eq!(client_id.get_env().and_then(|v| v.to_str()), Some("CLIENT_ID"));

        let secret = cmd
            .get_arguments()
            .find(|a| a.get_id() == "client_secret")
            .expect("client_secret argument");
        assert!(!secret.is_required_set());
    }
}
