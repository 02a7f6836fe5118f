//! Manual generation endpoint and rate-limit introspection

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::AppState;
use crate::constants::LLM_ENDPOINT;
use crate::domain::rate_limits::{self, LimitView};
use crate::generate::{self, GenerateError, GeneratedTweet};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/generate", post(generate_tweet))
        .route("/rate-limits", get(get_rate_limits))
}

#[derive(Deserialize)]
struct GenerateRequest {
    niche: Option<String>,
    subcategory: Option<String>,
    guidance: Option<String>,
}

/// POST /generate - generate a tweet on demand, without persisting it
async fn generate_tweet(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GeneratedTweet>, StatusCode> {
    let (Some(niche), Some(subcategory)) = (req.niche, req.subcategory) else {
        return Err(StatusCode::BAD_REQUEST);
    };
    if niche.trim().is_empty() || subcategory.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    generate::generate_manual(
        &state.db,
        &state.llm,
        &niche,
        &subcategory,
        req.guidance.as_deref(),
    )
    .await
    .map(Json)
    .map_err(|e| {
        eprintln!("Manual generation error: {}", e);
        match e {
            GenerateError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GenerateError::TooShort { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            GenerateError::Llm(_) => StatusCode::BAD_GATEWAY,
            GenerateError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    })
}

#[derive(Deserialize)]
struct RateLimitQuery {
    endpoint: Option<String>,
}

/// GET /rate-limits - current budget for an endpoint key
async fn get_rate_limits(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RateLimitQuery>,
) -> Result<Json<LimitView>, StatusCode> {
    let endpoint = query.endpoint.as_deref().unwrap_or(LLM_ENDPOINT);

    rate_limits::limit_view(&state.db, endpoint)
        .await
        .map(Json)
        .map_err(|e| {
            eprintln!("Failed to load rate limits: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}
