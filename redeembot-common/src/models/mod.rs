// File: redeembot-common/src/models/mod.rs
pub mod credential;

pub use credential::Credentials;
