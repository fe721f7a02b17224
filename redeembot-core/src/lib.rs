// src/lib.rs

pub mod auth;
pub mod http;
pub mod platforms;
pub mod query;
pub mod tasks;
pub mod test_utils;

pub use redeembot_common::error::Error;
pub use redeembot_common::models::Credentials;
pub use http::{HelixTransport, ReqwestTransport};
