//! Structural validation of Helix payloads.
//!
//! This is the trust boundary between the untyped JSON the platform returns and the typed
//! channel-points model. Checks are structural only: required fields must be present and have
//! the right primitive type. Values are not range-checked and fields are not cross-checked
//! (`redeemed_at` only has to be a string).
//!
//! What happens on a mismatch is decided per call through [`OnSchemaMismatch`]. Reward listing
//! is called with `Throw`, redemption listing with `Empty`; the two call sites differ on
//! purpose and the flag keeps that visible.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::info;

use crate::Error;
use crate::platforms::twitch::requests::channel_points::{CustomReward, RedemptionPage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnSchemaMismatch {
    /// Propagate `Error::SchemaMismatch` to the caller.
    Throw,
    /// Log the mismatch and hand back an empty result.
    Empty,
}

impl OnSchemaMismatch {
    /// Apply the policy to a validation result. Only schema mismatches are affected; every
    /// other error passes through untouched.
    pub fn resolve<T: Default>(self, result: Result<T, Error>, what: &str) -> Result<T, Error> {
        match (result, self) {
            (Err(e @ Error::SchemaMismatch { .. }), OnSchemaMismatch::Empty) => {
                info!("No new {} ({})", what, e);
                Ok(T::default())
            }
            (other, _) => other,
        }
    }
}

/// Validate a reward list. Accepts the Helix envelope (`{"data": [...]}`) or a bare array.
pub fn validate_reward_list(value: Value) -> Result<Vec<CustomReward>, Error> {
    let list = match value {
        Value::Object(mut map) if map.contains_key("data") => map.remove("data").unwrap_or(Value::Null),
        other => other,
    };
    decode(list)
}

/// Validate a redemption page: `{"data": [...], "pagination": {...}}`.
pub fn validate_redemption_list(value: Value) -> Result<RedemptionPage, Error> {
    decode(value)
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, Error> {
    serde_path_to_error::deserialize(value).map_err(|e| Error::SchemaMismatch {
        path: e.path().to_string(),
        message: e.inner().to_string(),
    })
}
