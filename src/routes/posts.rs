//! Post queue endpoints: feed reads, compose-and-post, delete

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;
use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::domain::posts::{self, DeleteResult, PostStats};
use crate::models::{NewPost, Post, PostSource, PostStatus};
use crate::publisher;
use crate::services::twitter::{SocialPublish, TwitterError};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/posts", get(list_posts))
        .route("/posts/queue/next", get(queue_next))
        .route("/posts/stats", get(stats))
        .route("/posts/search", get(search))
        .route("/posts/compose", post(compose))
        .route("/posts/{id}", delete(remove))
}

fn page_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

#[derive(Deserialize)]
struct ListQuery {
    status: Option<PostStatus>,
    source: Option<PostSource>,
    limit: Option<i64>,
}

/// GET /posts - recent posts, optionally filtered by status or source
async fn list_posts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Post>>, StatusCode> {
    let limit = page_limit(query.limit);

    let result = match (query.status, query.source) {
        (Some(status), _) => posts::posts_by_status(&state.db, status, limit).await,
        (None, Some(source)) => posts::posts_by_source(&state.db, source, limit).await,
        (None, None) => posts::recent_posts(&state.db, limit).await,
    };

    result.map(Json).map_err(|e| {
        eprintln!("Failed to list posts: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// GET /posts/queue/next - the post the next publish slot would pick
async fn queue_next(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Option<Post>>, StatusCode> {
    posts::oldest_pending(&state.db).await.map(Json).map_err(|e| {
        eprintln!("Failed to peek publish queue: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// GET /posts/stats - queue counters
async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<PostStats>, StatusCode> {
    posts::post_stats(&state.db).await.map(Json).map_err(|e| {
        eprintln!("Failed to load post stats: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

#[derive(Deserialize)]
struct SearchQuery {
    q: String,
    limit: Option<i64>,
}

/// GET /posts/search - substring search over recent posts
async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Post>>, StatusCode> {
    if query.q.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    posts::search_posts(&state.db, &query.q, page_limit(query.limit))
        .await
        .map(Json)
        .map_err(|e| {
            eprintln!("Failed to search posts: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

#[derive(Deserialize)]
struct ComposeRequest {
    text: String,
}

#[derive(Serialize)]
struct ComposeResponse {
    id: i64,
    tweet_id: String,
    text: String,
}

/// POST /posts/compose - publish immediately and record the posted result
///
/// A manual compose that the platform rejects leaves no record; the error is
/// surfaced to the caller instead.
async fn compose(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ComposeRequest>,
) -> Result<Json<ComposeResponse>, StatusCode> {
    if let Err(reason) = publisher::validate_for_publish(&req.text) {
        eprintln!("Compose rejected: {}", reason);
        return Err(StatusCode::BAD_REQUEST);
    }

    let published = state.twitter.publish(&req.text).await.map_err(|e| {
        eprintln!("Compose publish error: {}", e);
        match e {
            TwitterError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            TwitterError::Auth => StatusCode::FORBIDDEN,
            TwitterError::Duplicate => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    })?;

    let id = posts::insert_post(
        &state.db,
        &NewPost {
            text: published.text.clone(),
            status: PostStatus::Posted,
            source: PostSource::Compose,
            tweet_id: Some(published.id.clone()),
            ai: None,
        },
    )
    .await
    .map_err(|e| {
        eprintln!("Failed to record composed post: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(ComposeResponse {
        id,
        tweet_id: published.id,
        text: published.text,
    }))
}

/// DELETE /posts/:id - remove a post unless a publish cycle holds it
async fn remove(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    let result = posts::delete_post(&state.db, post_id, state.config.publish_lease_seconds)
        .await
        .map_err(|e| {
            eprintln!("Failed to delete post {}: {}", post_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    match result {
        DeleteResult::Deleted => Ok(StatusCode::NO_CONTENT),
        DeleteResult::NotFound => Err(StatusCode::NOT_FOUND),
        DeleteResult::Locked => Err(StatusCode::CONFLICT),
    }
}
