// File: redeembot-core/tests/api_client_tests.rs

use std::sync::Arc;

use reqwest::Method;
use serde_json::json;

use redeembot_core::platforms::twitch::requests::channel_points::{
    ChannelPointsApi, CustomRewardBody, GetRedemptionsOptions, GetRewardsOptions,
    RedemptionStatus, ResolutionStatus,
};
use redeembot_core::platforms::twitch::{OnSchemaMismatch, TwitchHelixClient};
use redeembot_core::query::QueryString;
use redeembot_core::test_utils::{
    ScriptedTransport, json_body, redemption_page_json, reward_json,
};
use redeembot_core::{Credentials, Error};

fn client(transport: &Arc<ScriptedTransport>) -> TwitchHelixClient {
    let client = TwitchHelixClient::new("cid", transport.clone());
    client.set_credentials(Credentials::new("T", "Rr"));
    client
}

fn query_of(url: &str) -> QueryString {
    QueryString::parse(url.split_once('?').map(|(_, q)| q).unwrap_or(""))
}

#[tokio::test]
async fn fulfill_with_no_ids_makes_no_call() {
    let transport = ScriptedTransport::shared();
    let api = client(&transport);

    api.fulfill_redemptions("b1", "rw1", &[], ResolutionStatus::Fulfilled).await;
    api.fulfill_redemptions("b1", "rw1", &[], ResolutionStatus::Canceled).await;

    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn fulfill_sends_one_patch_with_repeated_ids() {
    let transport = ScriptedTransport::shared();
    let api = client(&transport);

    let ids = vec!["r1".to_string(), "r2".to_string()];
    api.fulfill_redemptions("b1", "rw1", &ids, ResolutionStatus::Fulfilled).await;

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.method, Method::PATCH);
    assert!(req.url.starts_with("https://api.twitch.tv/helix/channel_points/custom_rewards/redemptions?"));

    let q = query_of(&req.url);
    assert_eq!(q.get_all("broadcaster_id"), vec!["b1"]);
    assert_eq!(q.get_all("reward_id"), vec!["rw1"]);
    assert_eq!(q.get_all("id"), vec!["r1", "r2"]);
    assert_eq!(json_body(req), Some(&json!({ "status": "FULFILLED" })));
}

#[tokio::test]
async fn fulfill_splits_batches_over_the_helix_limit() {
    let transport = ScriptedTransport::shared();
    let api = client(&transport);

    let ids: Vec<String> = (0..120).map(|i| format!("r{}", i)).collect();
    api.fulfill_redemptions("b1", "rw1", &ids, ResolutionStatus::Canceled).await;

    let patches = transport.requests_with_method(&Method::PATCH);
    let sizes: Vec<usize> = patches.iter().map(|r| query_of(&r.url).get_all("id").len()).collect();
    assert_eq!(sizes, vec![50, 50, 20]);
    assert_eq!(json_body(&patches[0]), Some(&json!({ "status": "CANCELED" })));
}

#[tokio::test]
async fn fulfill_absorbs_transport_and_http_errors() {
    let transport = ScriptedTransport::shared();
    transport.push_failure("connection reset");
    transport.push_json(401, json!({ "error": "Unauthorized", "status": 401, "message": "bad token" }));
    let api = client(&transport);

    let ids = vec!["r1".to_string()];
    api.fulfill_redemptions("b1", "rw1", &ids, ResolutionStatus::Fulfilled).await;
    api.fulfill_redemptions("b1", "rw1", &ids, ResolutionStatus::Fulfilled).await;

    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn fulfill_without_credentials_is_absorbed_too() {
    let transport = ScriptedTransport::shared();
    let api = TwitchHelixClient::new("cid", transport.clone());

    api.fulfill_redemptions("b1", "rw1", &["r1".to_string()], ResolutionStatus::Fulfilled)
        .await;
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn list_rewards_returns_every_element() {
    let transport = ScriptedTransport::shared();
    transport.push_json(200, json!({ "data": [reward_json("a"), reward_json("b"), reward_json("c")] }));
    let api = client(&transport);

    let rewards = api
        .list_rewards(&GetRewardsOptions::new("b1"), OnSchemaMismatch::Throw)
        .await
        .unwrap();
    assert_eq!(rewards.len(), 3);
    assert_eq!(
        rewards.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
        vec!["a", "b", "c"]
    );

    let req = &transport.requests()[0];
    assert_eq!(req.method, Method::GET);
    assert!(req.url.starts_with("https://api.twitch.tv/helix/channel_points/custom_rewards?"));
    assert_eq!(query_of(&req.url).get_all("broadcaster_id"), vec!["b1"]);
}

#[tokio::test]
async fn list_rewards_fails_on_missing_field() {
    let transport = ScriptedTransport::shared();
    let mut broken = reward_json("a");
    broken.as_object_mut().unwrap().remove("title");
    transport.push_json(200, json!({ "data": [broken] }));
    let api = client(&transport);

    let err = api
        .list_rewards(&GetRewardsOptions::new("b1"), OnSchemaMismatch::Throw)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SchemaMismatch { .. }), "got {:?}", err);
}

#[tokio::test]
async fn list_redemptions_mismatch_yields_empty_page() {
    let transport = ScriptedTransport::shared();
    transport.push_json(200, json!({ "data": [{ "id": "r1" }] }));
    transport.push_json(401, json!({ "error": "Unauthorized", "status": 401, "message": "bad token" }));
    transport.push_json(200, json!([]));
    let api = client(&transport);

    let opts = GetRedemptionsOptions::new("b1", "rw1", RedemptionStatus::Unfulfilled);
    for _ in 0..3 {
        let page = api.list_redemptions(&opts, OnSchemaMismatch::Empty).await.unwrap();
        assert!(page.data.is_empty());
    }
}

#[tokio::test]
async fn list_redemptions_can_be_told_to_throw() {
    let transport = ScriptedTransport::shared();
    transport.push_json(200, json!({ "nothing": true }));
    let api = client(&transport);

    let opts = GetRedemptionsOptions::new("b1", "rw1", RedemptionStatus::Unfulfilled);
    let err = api.list_redemptions(&opts, OnSchemaMismatch::Throw).await.unwrap_err();
    assert!(err.is_schema_mismatch());
}

#[tokio::test]
async fn list_redemptions_propagates_transport_errors() {
    let transport = ScriptedTransport::shared();
    transport.push_failure("dns failure");
    let api = client(&transport);

    let opts = GetRedemptionsOptions::new("b1", "rw1", RedemptionStatus::Unfulfilled);
    let err = api.list_redemptions(&opts, OnSchemaMismatch::Empty).await.unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test]
async fn list_redemptions_sends_options_as_query() {
    let transport = ScriptedTransport::shared();
    transport.push_json(200, redemption_page_json(&["r1", "r2"]));
    let api = client(&transport);

    let opts = GetRedemptionsOptions::new("b1", "rw1", RedemptionStatus::Unfulfilled).first(5);
    let page = api.list_redemptions(&opts, OnSchemaMismatch::Empty).await.unwrap();
    assert_eq!(page.ids(), vec!["r1".to_string(), "r2".to_string()]);

    let url = &transport.requests()[0].url;
    assert!(url.ends_with("/redemptions?broadcaster_id=b1&reward_id=rw1&status=UNFULFILLED&first=5"));
}

#[tokio::test]
async fn every_call_carries_client_id_and_bearer() {
    let transport = ScriptedTransport::shared();
    let api = client(&transport);

    let opts = GetRedemptionsOptions::new("b1", "rw1", RedemptionStatus::Unfulfilled);
    api.list_redemptions(&opts, OnSchemaMismatch::Empty).await.unwrap();

    // Replacing the pair only affects later calls.
    api.set_credentials(Credentials::new("T2", "Rr2"));
    api.list_redemptions(&opts, OnSchemaMismatch::Empty).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].header_value("Client-Id"), Some("cid"));
    assert_eq!(requests[0].header_value("Authorization"), Some("Bearer T"));
    assert_eq!(requests[1].header_value("Authorization"), Some("Bearer T2"));
}

#[tokio::test]
async fn listing_without_credentials_is_an_auth_error() {
    let transport = ScriptedTransport::shared();
    let api = TwitchHelixClient::new("cid", transport.clone());

    let err = api
        .list_rewards(&GetRewardsOptions::new("b1"), OnSchemaMismatch::Throw)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn create_reward_returns_new_id() {
    let transport = ScriptedTransport::shared();
    transport.push_json(200, json!({ "data": [reward_json("new-reward")] }));
    let api = client(&transport);

    let id = api.create_reward("b1", &CustomRewardBody::sample()).await;
    assert_eq!(id.as_deref(), Some("new-reward"));

    let req = &transport.requests()[0];
    assert_eq!(req.method, Method::POST);
    assert_eq!(query_of(&req.url).get_all("broadcaster_id"), vec!["b1"]);
    assert_eq!(json_body(req).unwrap()["title"], json!("Sample: Follow me!"));
}

#[tokio::test]
async fn create_reward_failures_return_none() {
    let transport = ScriptedTransport::shared();
    transport.push_failure("timeout");
    transport.push_json(400, json!({ "error": "Bad Request", "status": 400, "message": "CREATE_CUSTOM_REWARD_DUPLICATE_REWARD" }));
    transport.push_json(200, json!({ "data": [] }));
    let api = client(&transport);

    for _ in 0..3 {
        assert_eq!(api.create_reward("b1", &CustomRewardBody::sample()).await, None);
    }
}

#[tokio::test]
async fn exchange_code_posts_form_and_reads_pair() {
    let transport = ScriptedTransport::shared();
    transport.push_json(
        200,
        json!({
            "access_token": "T",
            "refresh_token": "Rr",
            "expires_in": 14400,
            "scope": ["channel:read:redemptions", "channel:manage:redemptions"],
            "token_type": "bearer"
        }),
    );
    let api = TwitchHelixClient::new("cid", transport.clone());

    let creds = api.exchange_code("secret", "abc123", "http://localhost:3000").await.unwrap();
    assert_eq!(creds.access_token, "T");
    assert_eq!(creds.refresh_token, "Rr");
    assert_eq!(creds.scopes.len(), 2);
    assert!(creds.expires_at.is_some());
    // Not installed until the caller says so.
    assert!(!api.has_credentials());

    let req = &transport.requests()[0];
    assert_eq!(req.url, "https://id.twitch.tv/oauth2/token");
    match &req.body {
        Some(redeembot_core::http::RequestBody::Form(fields)) => {
            let q: QueryString = fields.iter().cloned().collect();
            assert_eq!(q.get_all("code"), vec!["abc123"]);
            assert_eq!(q.get_all("grant_type"), vec!["authorization_code"]);
            assert_eq!(q.get_all("client_id"), vec!["cid"]);
        }
        other => panic!("expected a form body, got {:?}", other),
    }
}

#[tokio::test]
async fn exchange_code_rejection_is_an_auth_error() {
    let transport = ScriptedTransport::shared();
    transport.push_json(400, json!({ "status": 400, "message": "Invalid authorization code" }));
    let api = TwitchHelixClient::new("cid", transport.clone());

    let err = api.exchange_code("secret", "stale", "http://localhost:3000").await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
}

#[tokio::test]
async fn exchange_code_survives_absurd_expires_in() {
    for expires_in in [1_000_000_000_000_000u64, u64::MAX] {
        let transport = ScriptedTransport::shared();
        transport.push_json(
            200,
            json!({ "access_token": "T", "refresh_token": "Rr", "expires_in": expires_in }),
        );
        let api = TwitchHelixClient::new("cid", transport.clone());

        let creds = api.exchange_code("secret", "abc123", "http://localhost:3000").await.unwrap();
        assert_eq!(creds.access_token, "T");
        assert_eq!(creds.expires_at, None, "expires_in={}", expires_in);
    }
}

#[tokio::test]
async fn list_rewards_treats_not_found_as_empty() {
    let transport = ScriptedTransport::shared();
    transport.push_json(
        404,
        json!({ "error": "Not Found", "status": 404, "message": "No custom rewards with the specified IDs were found" }),
    );
    let api = client(&transport);

    let rewards = api
        .list_rewards(&GetRewardsOptions::new("b1").with_id("gone"), OnSchemaMismatch::Throw)
        .await
        .unwrap();
    assert!(rewards.is_empty());
}

#[tokio::test]
async fn list_rewards_other_error_bodies_still_throw() {
    let transport = ScriptedTransport::shared();
    transport.push_json(403, json!({ "error": "Forbidden", "status": 403, "message": "nope" }));
    let api = client(&transport);

    let err = api
        .list_rewards(&GetRewardsOptions::new("b1"), OnSchemaMismatch::Throw)
        .await
        .unwrap_err();
    assert!(err.is_schema_mismatch());
}

#[tokio::test]
async fn validate_token_reports_user_id() {
    let transport = ScriptedTransport::shared();
    transport.push_json(
        200,
        json!({
            "client_id": "cid",
            "login": "streamer",
            "scopes": ["channel:read:redemptions"],
            "user_id": "b1",
            "expires_in": 5520838
        }),
    );
    let api = client(&transport);

    let v = api.validate_token().await.unwrap();
    assert_eq!(v.user_id.as_deref(), Some("b1"));
    assert_eq!(transport.requests()[0].header_value("Authorization"), Some("OAuth T"));
}
