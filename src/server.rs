// HTTP API for usage, generation and metrics
//
// Routes:
// - GET    /api/usage              current period usage for the caller
// - POST   /api/generate           quota-gated generation
// - GET    /api/generations        the caller's generation history
// - DELETE /api/generations/{id}   delete one of the caller's generations
// - GET    /health                 liveness
// - GET    /metrics                Prometheus text format
//
// Identity comes from the `x-user-id` header set by the upstream auth layer.
// Every /api route is rate limited before any other work is done.

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::Config;
use crate::error::CoreError;
use crate::generation::{ContentGenerator, GenerationRequest, GenerationService};
use crate::metrics;
use crate::rate_limit::{RateLimitPreset, RateLimitResult, RateLimiter};
use crate::usage::{AccountStore, GenerationStore, UsageMeter};

/// Header carrying the authenticated user id
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the client address chain
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Shared state for request handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub meter: Arc<UsageMeter>,
    pub limiter: Arc<RateLimiter>,
    pub generation: Arc<GenerationService>,
    pub upgrade_url: String,
    pub metrics_enabled: bool,
}

impl AppState {
    /// Wire the meter, limiter and generation service from configuration
    pub fn new(
        config: &Config,
        generations: Arc<dyn GenerationStore>,
        accounts: Arc<dyn AccountStore>,
        generator: Arc<dyn ContentGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let meter = Arc::new(
            UsageMeter::new(generations, accounts, clock.clone())
                .with_limits(config.plans.limits)
                .with_month_boundary(config.plans.month_boundary),
        );
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone(), clock));
        let generation = Arc::new(
            GenerationService::new(meter.clone(), generator)
                .with_strict_enforcement(config.plans.strict_enforcement),
        );

        Self {
            meter,
            limiter,
            generation,
            upgrade_url: config.plans.upgrade_url.clone(),
            metrics_enabled: config.metrics.enabled,
        }
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/usage", get(usage_handler))
        .route("/api/generate", post(generate_handler))
        .route("/api/generations", get(list_generations_handler))
        .route("/api/generations/{id}", delete(delete_generation_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API until the process is stopped
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    metrics::init().context("Failed to initialize metrics")?;

    let app = router(state);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind API server")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}

/// Error response for API handlers
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    NotFound,
    RateLimited {
        result: RateLimitResult,
        limit: u32,
    },
    Core {
        error: CoreError,
        upgrade_url: String,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Authentication required", "code": "unauthorized" })),
            )
                .into_response(),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Not found", "code": "not_found" })),
            )
                .into_response(),
            ApiError::RateLimited { result, limit } => {
                let err = CoreError::RateLimited {
                    retry_after_secs: result.retry_after_secs.unwrap_or(1),
                };
                let mut response = core_error_response(err, "");
                insert_rate_limit_headers(response.headers_mut(), &result, limit);
                response
            }
            ApiError::Core { error, upgrade_url } => core_error_response(error, &upgrade_url),
        }
    }
}

fn core_error_response(err: CoreError, upgrade_url: &str) -> Response {
    let code = err.code();
    match err {
        CoreError::QuotaExceeded { plan, used, limit } => (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "Monthly generation limit reached. Upgrade your plan to keep generating.",
                "code": code,
                "plan": plan,
                "used": used,
                "limit": limit,
                "upgrade_url": upgrade_url,
            })),
        )
            .into_response(),
        CoreError::RateLimited { retry_after_secs } => {
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": "Too many requests. Please try again later.",
                    "code": code,
                    "retry_after": retry_after_secs,
                })),
            )
                .into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
            response
        }
        CoreError::PersistenceUnavailable { operation, .. } => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": format!("Failed to {}", operation), "code": code })),
        )
            .into_response(),
        CoreError::Generation(e) => {
            error!("Generation failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "Failed to generate content", "code": code })),
            )
                .into_response()
        }
        CoreError::InvalidRequest(message) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": message, "code": code })),
        )
            .into_response(),
    }
}

fn insert_rate_limit_headers(headers: &mut HeaderMap, result: &RateLimitResult, limit: u32) {
    headers.insert(
        HeaderName::from_static("x-ratelimit-limit"),
        HeaderValue::from(limit),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-remaining"),
        HeaderValue::from(result.remaining),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-reset"),
        HeaderValue::from(result.reset_at.timestamp()),
    );
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn user_id(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, USER_ID_HEADER)
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

impl AppState {
    /// Count the request against a preset; `Err` when throttled
    fn enforce_rate_limit(
        &self,
        preset: RateLimitPreset,
        headers: &HeaderMap,
    ) -> Result<(), ApiError> {
        let result = self.limiter.check_preset(
            preset,
            user_id(headers),
            header_str(headers, FORWARDED_FOR_HEADER),
        );
        if result.allowed {
            Ok(())
        } else {
            Err(ApiError::RateLimited {
                result,
                limit: self.limiter.config_for(preset).max_requests,
            })
        }
    }

    fn core_error(&self, error: CoreError) -> ApiError {
        ApiError::Core {
            error,
            upgrade_url: self.upgrade_url.clone(),
        }
    }
}

/// Current usage for the caller
async fn usage_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    state.enforce_rate_limit(RateLimitPreset::General, &headers)?;
    let owner_id = user_id(&headers).ok_or(ApiError::Unauthorized)?;

    let usage = state
        .meter
        .get_usage_summary(owner_id)
        .await
        .map_err(|e| state.core_error(e))?;
    Ok(Json(usage).into_response())
}

/// Quota-gated generation
async fn generate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<GenerationRequest>,
) -> Result<Response, ApiError> {
    state.enforce_rate_limit(RateLimitPreset::Generate, &headers)?;
    let owner_id = user_id(&headers).ok_or(ApiError::Unauthorized)?;

    let generated = state
        .generation
        .generate(owner_id, &request)
        .await
        .map_err(|e| state.core_error(e))?;
    Ok(Json(generated).into_response())
}

/// The caller's generation history
async fn list_generations_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    state.enforce_rate_limit(RateLimitPreset::General, &headers)?;
    let owner_id = user_id(&headers).ok_or(ApiError::Unauthorized)?;

    let records = state
        .meter
        .list_generations(owner_id)
        .await
        .map_err(|e| state.core_error(e))?;
    Ok(Json(records).into_response())
}

/// Delete one of the caller's generations
async fn delete_generation_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    state.enforce_rate_limit(RateLimitPreset::General, &headers)?;
    let owner_id = user_id(&headers).ok_or(ApiError::Unauthorized)?;

    let deleted = state
        .meter
        .delete_generation(owner_id, id)
        .await
        .map_err(|e| state.core_error(e))?;
    if deleted {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Err(ApiError::NotFound)
    }
}

/// Metrics endpoint handler
async fn metrics_handler(State(state): State<AppState>) -> Response {
    if !state.metrics_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }
    match metrics::gather_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text).into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error gathering metrics: {}", e),
            )
                .into_response()
        }
    }
}

/// Health check endpoint
async fn health_handler() -> impl IntoResponse {
    StatusCode::OK
}
