// File: redeembot-core/tests/callback_server_tests.rs
//
// Drives the OAuth callback listener over real loopback HTTP.

use std::net::SocketAddr;
use std::time::Duration;

use redeembot_core::auth::{CallbackListener, CallbackResult, start_callback_server};
use redeembot_core::Error;

async fn listener() -> Result<(CallbackListener, SocketAddr), Error> {
    let listener = start_callback_server(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let addr = listener
        .local_addr()
        .await
        .expect("callback listener did not bind");
    Ok((listener, addr))
}

#[tokio::test]
async fn first_code_resolves_the_signal() -> Result<(), Error> {
    let (listener, addr) = listener().await?;
    let http = reqwest::Client::new();

    let rsp = http
        .get(format!("http://{}/?code=abc123&scope=channel%3Aread%3Aredemptions&state=s1", addr))
        .send()
        .await?;
    assert!(rsp.status().is_success());
    assert!(rsp.text().await?.contains("Authentication Successful"));

    // Later callbacks are answered but never delivered.
    let rsp = http
        .get(format!("http://{}/?code=zzz&state=s2", addr))
        .send()
        .await?;
    assert!(rsp.status().is_success());

    let got = tokio::time::timeout(Duration::from_secs(5), listener.code_rx)
        .await?
        .expect("code sender dropped");
    assert_eq!(
        got,
        CallbackResult {
            code: "abc123".into(),
            state: Some("s1".into()),
        }
    );

    let _ = listener.shutdown_tx.send(());
    Ok(())
}

#[tokio::test]
async fn oauth_error_does_not_resolve_the_signal() -> Result<(), Error> {
    let (mut listener, addr) = listener().await?;
    let http = reqwest::Client::new();

    let rsp = http
        .get(format!(
            "http://{}/?error=access_denied&error_description=The+user+denied+you+access",
            addr
        ))
        .send()
        .await?;
    assert_eq!(rsp.status().as_u16(), 400);
    assert!(rsp.text().await?.contains("access_denied"));

    let rsp = http.get(format!("http://{}/", addr)).send().await?;
    assert_eq!(rsp.status().as_u16(), 400);

    assert!(listener.code_rx.try_recv().is_err());
    let _ = listener.shutdown_tx.send(());
    Ok(())
}

#[tokio::test]
async fn oauth_error_text_is_escaped() -> Result<(), Error> {
    let (listener, addr) = listener().await?;

    let rsp = reqwest::Client::new()
        .get(format!(
            "http://{}/?error=%3Cscript%3Ealert(1)%3C%2Fscript%3E&error_description=a%26b",
            addr
        ))
        .send()
        .await?;
    assert_eq!(rsp.status().as_u16(), 400);
    let body = rsp.text().await?;
    assert!(!body.contains("<script>alert(1)</script>"), "body was {}", body);
    assert!(body.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    assert!(body.contains("a&amp;b"));

    let _ = listener.shutdown_tx.send(());
    Ok(())
}
