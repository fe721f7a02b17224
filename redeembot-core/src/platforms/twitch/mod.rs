// File: src/platforms/twitch/mod.rs

pub mod auth;
pub mod client;
pub mod requests;
pub mod validation;

pub use auth::{AuthConfig, AuthSession};
pub use client::TwitchHelixClient;
pub use requests::channel_points::ChannelPointsApi;
pub use validation::OnSchemaMismatch;
