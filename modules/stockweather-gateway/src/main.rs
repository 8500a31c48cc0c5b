use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use stockweather_common::{Config, RelayEnvelope};

mod registry;

use registry::ConnectionRegistry;

struct AppState {
    registry: ConnectionRegistry,
}

/// Ingestion endpoint for pushes from the engine process. Unknown or
/// expired connection ids are dropped with a 404 body; the engine treats
/// any failure the same way, so this never escalates.
async fn relay_handler(
    State(state): State<Arc<AppState>>,
    Json(envelope): Json<RelayEnvelope>,
) -> impl IntoResponse {
    let frame = match serde_json::to_string(&envelope.event) {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, "Unserializable relay event");
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({"delivered": false})),
            );
        }
    };

    if state.registry.deliver(&envelope.connection_id, frame).await {
        (
            StatusCode::OK,
            Json(serde_json::json!({"delivered": true})),
        )
    } else {
        warn!(
            connection_id = envelope.connection_id.as_str(),
            "Unknown connection id, dropping relayed event"
        );
        (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"delivered": false})),
        )
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4().to_string();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state.registry.register(connection_id.clone(), tx).await;

    let active = state.registry.active_connections().await;
    info!(connection_id = connection_id.as_str(), active, "Client connected");

    let (mut sender, mut receiver) = socket.split();

    // The client must learn its address before anything can be pushed
    // to it.
    let hello = serde_json::json!({
        "event": "connected",
        "connectionId": connection_id,
    })
    .to_string();
    if sender.send(Message::Text(hello.into())).await.is_err() {
        state.registry.deregister(&connection_id).await;
        return;
    }

    let mut ping_interval = tokio::time::interval(Duration::from_secs(30));

    loop {
        tokio::select! {
            frame = rx.recv() => {
                match frame {
                    Some(text) => {
                        if sender.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = ping_interval.tick() => {
                if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    // Push-only channel; inbound frames are ignored.
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.registry.deregister(&connection_id).await;
    info!(connection_id = connection_id.as_str(), "Client disconnected");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("stockweather=info".parse()?),
        )
        .init();

    let config = Config::gateway_from_env();

    let state = Arc::new(AppState {
        registry: ConnectionRegistry::default(),
    });

    let app = Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        .route("/ws", get(ws_handler))
        .route("/relay", post(relay_handler))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        );

    let addr = format!("{}:{}", config.gateway_host, config.gateway_port);
    info!("Stockweather gateway starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
