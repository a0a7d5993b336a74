use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use pollroom_shared::identity::teacher_username;
use pollroom_shared::Poll;
use pollroom_store::PollStore;

use crate::config::ServerConfig;
use crate::coordinator::PollCoordinator;
use crate::error::ServerError;
use crate::hub::Hub;
use crate::ws::ws_handler;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: PollCoordinator,
    pub hub: Hub,
    pub store: Arc<dyn PollStore>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn PollStore>, config: ServerConfig) -> Self {
        let hub = Hub::new(&config);
        let coordinator = PollCoordinator::new(store.clone(), hub.clone());
        Self {
            coordinator,
            hub,
            store,
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin(state.config.frontend_url.as_deref()))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/teacher-login", post(teacher_login))
        .route("/polls/:teacher_username", get(list_polls))
        .route("/ws", get(ws_handler))
        .fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn allowed_origin(frontend_url: Option<&str>) -> AllowOrigin {
    match frontend_url {
        Some(url) => match HeaderValue::from_str(url) {
            Ok(origin) => AllowOrigin::exact(origin),
            Err(_) => {
                warn!(url, "FRONTEND_URL is not a valid origin, allowing any");
                AllowOrigin::any()
            }
        },
        None => AllowOrigin::any(),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    active_polls: usize,
    connections: usize,
}

#[derive(Serialize)]
struct LoginResponse {
    username: String,
}

#[derive(Serialize)]
struct PollListResponse {
    data: Vec<Poll>,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        active_polls: state.coordinator.registry().len().await,
        connections: state.hub.connection_count().await,
    })
}

async fn teacher_login(State(state): State<AppState>) -> Result<Json<LoginResponse>, ServerError> {
    let username = teacher_username(Utc::now());
    let teacher = state.store.ensure_teacher(&username)?;
    info!(teacher = %teacher.username, "Teacher logged in");
    Ok(Json(LoginResponse {
        username: teacher.username,
    }))
}

async fn list_polls(
    State(state): State<AppState>,
    Path(teacher_username): Path<String>,
) -> Result<Json<PollListResponse>, ServerError> {
    let username = teacher_username.trim();
    if username.is_empty() {
        return Err(ServerError::BadRequest("teacher username is required".into()));
    }
    let data = state.store.polls_for_teacher(username)?;
    Ok(Json(PollListResponse { data }))
}

async fn not_found() -> ServerError {
    ServerError::NotFound("no such route".into())
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
