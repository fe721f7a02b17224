pub mod redemption_poller;

pub use redemption_poller::{
    PollerConfig, PollerHandle, PollerState, RedemptionPoller, TerminationCause,
};
