//! HTTP server implementation using Axum.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{
    Json, Router,
    extract::State,
    middleware,
    routing::{get, post},
};
use starwatch_core::config::GatewayConfig;
use starwatch_scheduler::StarScheduler;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<StarScheduler>,
    /// Bearer token for `/api/v1/*`. `None` leaves the API open.
    pub trigger_token: Option<String>,
    pub interval_minutes: u64,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(scheduler: Arc<StarScheduler>, config: &GatewayConfig, interval_minutes: u64) -> Self {
        Self {
            scheduler,
            trigger_token: config.trigger_token.clone().filter(|t| !t.is_empty()),
            interval_minutes,
            start_time: std::time::Instant::now(),
        }
    }
}

/// Bearer token auth middleware. Accepts `Authorization: Bearer <token>`
/// or `X-Trigger-Token: <token>`.
async fn require_token(
    State(state): State<Arc<AppState>>,
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Response {
    let Some(expected) = &state.trigger_token else {
        return next.run(req).await;
    };

    let headers = req.headers();
    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);
    let direct = headers
        .get("X-Trigger-Token")
        .and_then(|v| v.to_str().ok())
        .map(str::trim);

    if bearer == Some(expected.as_str()) || direct == Some(expected.as_str()) {
        return next.run(req).await;
    }

    tracing::warn!("🔒 Rejected {} {} (bad or missing token)", req.method(), req.uri().path());
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({"ok": false, "error": "Unauthorized: invalid or missing token"})),
    )
        .into_response()
}

/// Build the Axum router.
pub fn build_router(state: AppState) -> Router {
    build_router_from_arc(Arc::new(state))
}

pub fn build_router_from_arc(shared: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/api/v1/status", get(super::routes::poller_status))
        .route("/api/v1/check", post(super::routes::trigger_check))
        .route_layer(middleware::from_fn_with_state(shared.clone(), require_token));

    let public = Router::new().route("/health", get(super::routes::health_check));

    protected
        .merge(public)
        .layer(
            CorsLayer::new()
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
                .allow_headers(Any)
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Start the HTTP server and run until `shutdown` resolves.
pub async fn start(
    config: &GatewayConfig,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    if state.trigger_token.is_none() {
        tracing::warn!("⚠️ Gateway has no trigger_token, /api/v1 is unauthenticated");
    }
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🌐 Gateway listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
