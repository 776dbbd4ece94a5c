use axum::{extract::{Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use comics_core::tokenizer::normalize_text;
use comics_core::{Catalog, Hit, UpdateDiff};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub const DEFAULT_MAX_RESULTS: usize = 10;

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub admin_token: Option<String>,
    pub max_results: usize,
    /// Cancels crawls started by `/update` when the server shuts down.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// State with the admin token taken from `ADMIN_TOKEN`.
    pub fn from_env(catalog: Arc<Catalog>, max_results: usize, shutdown: CancellationToken) -> Self {
        let admin_token = std::env::var("ADMIN_TOKEN").ok().filter(|t| !t.is_empty());
        Self { catalog, admin_token, max_results: max_results.max(1), shutdown }
    }
}

pub fn build_app(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/pics", get(search_handler))
        .route("/update", post(update_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Comics matching any normalized query term, at most `min(limit, max_results)`
/// of them. 404 when nothing matches.
pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Hit>>, (StatusCode, String)> {
    let start = std::time::Instant::now();
    let tokens = normalize_text(&params.search);
    let limit = params.limit.unwrap_or(state.max_results).min(state.max_results);

    let (total, hits) = state.catalog.search(&tokens, limit);
    tracing::debug!(query = %params.search, total, took_s = start.elapsed().as_secs_f64(), "search served");
    if total == 0 {
        return Err((StatusCode::NOT_FOUND, "not found".into()));
    }
    Ok(Json(hits))
}

pub async fn update_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<UpdateDiff>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    match state.catalog.update_comics(&state.shutdown).await {
        Ok(diff) => Ok(Json(diff)),
        Err(err) => {
            tracing::error!(error = %err, "updating comics failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
        }
    }
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
