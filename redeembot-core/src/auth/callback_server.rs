use std::{net::SocketAddr, sync::Arc};
use tokio::sync::{oneshot, Mutex};
use axum::{
    Router,
    routing::get,
    extract::{Query, State},
    response::Html,
    http::StatusCode,
};
use axum_server::{Server, Handle};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use serde::Deserialize;
use tracing::{info, warn, error};

use crate::Error;

/// Structure to hold the final result from the OAuth callback.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackResult {
    pub code: String,
    pub state: Option<String>,
}

/// Query string we expect from Twitch: ?code=xxx&scope=...&state=...
#[derive(Debug, Deserialize)]
pub struct AuthQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Shared state for the Axum callback route.
#[derive(Clone)]
pub struct CallbackServerState {
    /// Taken on the first code received; later callbacks find `None` and are ignored.
    pub done_tx: Arc<Mutex<Option<oneshot::Sender<CallbackResult>>>>,
}

/// A running callback listener.
pub struct CallbackListener {
    /// Resolves exactly once, with the first code delivered to the redirect URI.
    pub code_rx: oneshot::Receiver<CallbackResult>,
    /// Send (or drop) to shut the listener down.
    pub shutdown_tx: oneshot::Sender<()>,
    handle: Handle,
}

impl CallbackListener {
    /// The bound address, once the listener is accepting connections.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.handle.listening().await
    }
}

/// Serves the redirect URI (`GET /`) on `addr` and hands the first authorization code to
/// the returned listener's `code_rx`.
pub async fn start_callback_server(addr: SocketAddr) -> Result<CallbackListener, Error> {
    let (done_tx, done_rx) = oneshot::channel::<CallbackResult>();
    let done_tx = Arc::new(Mutex::new(Some(done_tx)));

    let state = CallbackServerState { done_tx };

    let app = Router::new()
        .route("/", get(handle_callback))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let (shutdown_send, shutdown_recv) = oneshot::channel::<()>();
    info!("OAuth callback server listening on http://{}", addr);

    let handle = Handle::new();
    let handle_clone = handle.clone();

    tokio::spawn(async move {
        let _ = shutdown_recv.await;
        handle_clone.graceful_shutdown(None);
    });

    let server = Server::bind(addr)
        .handle(handle.clone())
        .serve(app.into_make_service());

    tokio::spawn(async move {
        if let Err(e) = server.await {
            error!("Callback server error: {}", e);
        }
        info!("Callback server shut down.");
    });

    Ok(CallbackListener {
        code_rx: done_rx,
        shutdown_tx: shutdown_send,
        handle,
    })
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

fn page(status: StatusCode, body: String) -> (StatusCode, Html<String>) {
    (status, Html(format!("<!doctype html><title>redeembot</title>{body}")))
}

async fn handle_callback(
    State(state): State<CallbackServerState>,
    Query(query): Query<AuthQuery>,
) -> (StatusCode, Html<String>) {
    if let Some(err) = query.error {
        let desc = query.error_description.unwrap_or_default();
        warn!("OAuth callback returned an error: {} ({})", err, desc);
        return page(
            StatusCode::BAD_REQUEST,
            format!("<h2>OAuth Error</h2><p>{}</p><p>{}</p>", escape_html(&err), escape_html(&desc)),
        );
    }

    let Some(code) = query.code else {
        warn!("OAuth callback without a code parameter");
        return page(
            StatusCode::BAD_REQUEST,
            "<h2>Missing 'code' query param</h2><p>Restart the authorization from the agent.</p>".into(),
        );
    };

    match state.done_tx.lock().await.take() {
        Some(tx) => {
            info!("Authorization code received.");
            let _ = tx.send(CallbackResult { code, state: query.state });
        }
        None => warn!("Ignoring authorization code: a code was already received."),
    }

    // Tries to close the tab; most browsers only allow it for script-opened windows.
    page(
        StatusCode::OK,
        concat!(
            "<h2>Authentication Successful</h2>",
            "<p>redeembot is authorized. You can close this window now.</p>",
            "<script>window.onload = () => window.close();</script>"
        )
        .into(),
    )
}

/// Fails with `Error::Config` when something already holds `127.0.0.1:port`.
pub async fn test_port_available(port: u16) -> Result<(), Error> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    tokio::net::TcpListener::bind(addr)
        .await
        .map(drop)
        .map_err(|e| Error::Config(format!("Port {} not available: {}", port, e)))
}
