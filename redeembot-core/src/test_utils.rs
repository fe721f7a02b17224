// src/test_utils.rs
//
// Scripted transport and payload builders shared by unit and integration tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::Error;
use crate::http::{HelixRequest, HelixResponse, HelixTransport, RequestBody};

enum Scripted {
    Response(HelixResponse),
    Failure(String),
}

/// Replays queued responses in order and records every request it sees.
///
/// Once the queue is drained, the fallback response is returned (an empty redemption page
/// unless overridden).
pub struct ScriptedTransport {
    queue: Mutex<VecDeque<Scripted>>,
    fallback: Mutex<HelixResponse>,
    requests: Mutex<Vec<HelixRequest>>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(HelixResponse::new(
                200,
                json!({ "data": [], "pagination": {} }).to_string(),
            )),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn push_json(&self, status: u16, body: Value) -> &Self {
        self.queue
            .lock()
            .push_back(Scripted::Response(HelixResponse::new(status, body.to_string())));
        self
    }

    pub fn push_raw(&self, status: u16, body: &str) -> &Self {
        self.queue
            .lock()
            .push_back(Scripted::Response(HelixResponse::new(status, body)));
        self
    }

    /// Queue a transport-level failure (connection reset and the like).
    pub fn push_failure(&self, message: &str) -> &Self {
        self.queue.lock().push_back(Scripted::Failure(message.to_string()));
        self
    }

    pub fn set_fallback(&self, status: u16, body: Value) {
        *self.fallback.lock() = HelixResponse::new(status, body.to_string());
    }

    pub fn requests(&self) -> Vec<HelixRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Requests whose method matches, in the order they were sent.
    pub fn requests_with_method(&self, method: &reqwest::Method) -> Vec<HelixRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| &r.method == method)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl HelixTransport for ScriptedTransport {
    async fn send(&self, request: HelixRequest) -> Result<HelixResponse, Error> {
        self.requests.lock().push(request);
        let next = self.queue.lock().pop_front();
        match next {
            Some(Scripted::Response(rsp)) => Ok(rsp),
            Some(Scripted::Failure(msg)) => Err(Error::Transport(msg)),
            None => Ok(self.fallback.lock().clone()),
        }
    }
}

/// JSON body of a request, if it carried one.
pub fn json_body(request: &HelixRequest) -> Option<&Value> {
    match &request.body {
        Some(RequestBody::Json(v)) => Some(v),
        _ => None,
    }
}

/// A fully populated custom reward as Helix returns it.
pub fn reward_json(id: &str) -> Value {
    json!({
        "broadcaster_name": "Streamer",
        "broadcaster_login": "streamer",
        "broadcaster_id": "b1",
        "id": id,
        "image": null,
        "background_color": "#9147FF",
        "is_enabled": true,
        "cost": 10000000,
        "title": format!("Reward {}", id),
        "prompt": "Follows the requesting user!",
        "is_user_input_required": false,
        "max_per_stream_setting": { "is_enabled": false, "max_per_stream": 0 },
        "max_per_user_per_stream_setting": { "is_enabled": false, "max_per_user_per_stream": 0 },
        "global_cooldown_setting": { "is_enabled": false, "global_cooldown_seconds": 0 },
        "is_paused": false,
        "is_in_stock": true,
        "default_image": {
            "url_1x": "https://static-cdn.jtvnw.net/custom-reward-images/default-1.png",
            "url_2x": "https://static-cdn.jtvnw.net/custom-reward-images/default-2.png",
            "url_4x": "https://static-cdn.jtvnw.net/custom-reward-images/default-4.png"
        },
        "should_redemptions_skip_request_queue": false,
        "redemptions_redeemed_current_stream": null,
        "cooldown_expires_at": null
    })
}

/// An UNFULFILLED redemption against reward `rw1`.
pub fn redemption_json(id: &str) -> Value {
    json!({
        "broadcaster_name": "Streamer",
        "broadcaster_login": "streamer",
        "broadcaster_id": "b1",
        "id": id,
        "user_id": "u1",
        "user_login": "viewer",
        "user_name": "Viewer",
        "user_input": "",
        "status": "UNFULFILLED",
        "redeemed_at": "2024-05-01T18:20:33.312Z",
        "reward": {
            "id": "rw1",
            "title": "Sample: Follow me!",
            "prompt": "Follows the requesting user!",
            "cost": 10000000
        }
    })
}

/// `{"data": [...], "pagination": {}}` holding one redemption per id.
pub fn redemption_page_json(ids: &[&str]) -> Value {
    json!({
        "data": ids.iter().map(|id| redemption_json(id)).collect::<Vec<_>>(),
        "pagination": {}
    })
}
