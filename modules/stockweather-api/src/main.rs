use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use stockweather_common::{AnalysisRequest, Config};
use stockweather_engine::Orchestrator;

struct AppState {
    orchestrator: Arc<Orchestrator>,
}

/// Accept an analysis request and kick off the pipeline in the
/// background. The handler's contract is "accepted", not "completed";
/// results reach the client through the gateway push channel.
async fn submit_analysis(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AnalysisRequest>,
) -> impl IntoResponse {
    if body.query.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "query is required"})),
        )
            .into_response();
    }
    if body.connection_id.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "connectionId is required"})),
        )
            .into_response();
    }

    info!(
        query = body.query.as_str(),
        connection_id = body.connection_id.as_str(),
        "Analysis accepted"
    );

    let orchestrator = Arc::clone(&state.orchestrator);
    let query = body.query.clone();
    tokio::spawn(async move {
        orchestrator.run(body).await;
    });

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({"accepted": true, "query": query})),
    )
        .into_response()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("stockweather=info".parse()?),
        )
        .init();

    let config = Config::from_env();
    let orchestrator = Arc::new(Orchestrator::from_config(&config));

    let state = Arc::new(AppState { orchestrator });

    let app = Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        .route("/analysis", post(submit_analysis))
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

    let addr = format!("{}:{}", config.api_host, config.api_port);
    info!("Stockweather API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
