pub mod config;
pub mod leaderboard;
pub mod session;

pub use session::messages;

use axum::{
    Json, Router,
    extract::{Query, State, WebSocketUpgrade, ws::WebSocket},
    http::StatusCode,
    response::Response,
    routing::get,
};
use config::Config;
use leaderboard::{DEFAULT_LIMIT, LeaderboardEntry, LeaderboardRepository};
use serde::Deserialize;
use session::SessionHub;
use session::simulation::{Simulation, StubSimulation};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

async fn health() -> &'static str {
    "ok"
}

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<SessionHub>,
    pub leaderboard: LeaderboardRepository,
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    session::run_connection(socket, state.hub).await;
}

#[derive(Debug, Deserialize)]
struct LeaderboardQuery {
    limit: Option<u32>,
}

async fn leaderboard_handler(
    Query(query): Query<LeaderboardQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<LeaderboardEntry>>, StatusCode> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    match state.leaderboard.top(limit).await {
        Ok(entries) => Ok(Json(entries)),
        Err(err) => {
            tracing::error!(error = %err, "Failed to load leaderboard");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub fn app(pool: SqlitePool) -> Router {
    app_with_config(pool, &Config::default())
}

pub fn app_with_config(pool: SqlitePool, config: &Config) -> Router {
    app_with_simulation(pool, config, Arc::new(StubSimulation))
}

/// Builds the router around a given simulation.
///
/// Starts the expiry sweeper, so it must be called from within a Tokio runtime.
pub fn app_with_simulation(
    pool: SqlitePool,
    config: &Config,
    simulation: Arc<dyn Simulation>,
) -> Router {
    let leaderboard = LeaderboardRepository::new(pool);
    let hub = Arc::new(SessionHub::new(simulation, Some(leaderboard.clone())));
    session::spawn_sweeper(&hub, config.sweep_interval, config.expiry_limits());

    let state = AppState { hub, leaderboard };
    let router = Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .route("/leaderboard", get(leaderboard_handler))
        .with_state(state)
        .layer(CorsLayer::permissive());

    match &config.static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    }
}
