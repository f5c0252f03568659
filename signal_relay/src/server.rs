//! HTTP surface: the signaling WebSocket plus liveness routes

use crate::config::Config;
use crate::connection::{ConnectionHandle, WebSocketConnection};
use crate::session::Session;
use crate::state::Registry;
use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::HeaderValue,
    response::{IntoResponse, Json},
    routing::get,
};
use futures::StreamExt;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{debug, info, warn};

/// Build the router (shared between production startup and tests).
pub fn build_app(registry: Registry, cors_origins: &[String]) -> Router {
    let router = Router::new()
        .route("/api/", get(root_handler))
        .route("/api/health", get(health_handler))
        .route("/api/ws", get(ws_upgrade_handler));

    router.layer(cors_layer(cors_origins)).with_state(registry)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|origin| origin.trim() == "*") {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(allowed))
}

/// Bind and serve until interrupted.
pub async fn serve(config: &Config) -> anyhow::Result<()> {
    let registry = Registry::new();
    let app = build_app(registry, &config.cors_origins);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!(addr = %listener.local_addr()?, "Signaling relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "Hello World" }))
}

async fn health_handler(State(registry): State<Registry>) -> impl IntoResponse {
    Json(serde_json::json!({
        "ok": true,
        "time": chrono::Utc::now().to_rfc3339(),
        "rooms": registry.room_count(),
        "peers": registry.peer_count(),
    }))
}

async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    State(registry): State<Registry>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, registry))
}

/// Drive one WebSocket until it closes, then clean up its session.
async fn handle_socket(socket: WebSocket, registry: Registry) {
    let (sink, mut stream) = socket.split();
    let connection: ConnectionHandle = Arc::new(WebSocketConnection::new(sink));
    let mut session = Session::new(registry, connection);
    info!(peer = %session.id(), "Peer connected");

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => session.handle_frame(text.as_str()).await,
            Ok(Message::Close(_)) => break,
            // Binary frames are not part of the protocol; pings are answered by axum
            Ok(_) => {}
            Err(err) => {
                debug!(peer = %session.id(), %err, "WebSocket receive failed");
                break;
            }
        }
    }

    session.disconnect().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, Request, StatusCode, header};
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_reports_registry_size() {
        let app = build_app(Registry::new(), &["*".to_string()]);
        let response = app
            .oneshot(Request::get("/api/health").body(axum::body::Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn preflight_echoes_allowed_origin() {
        let app = build_app(Registry::new(), &["http://localhost:3000".to_string()]);
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/health")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(axum::body::Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("http://localhost:3000"))
        );
    }
}
