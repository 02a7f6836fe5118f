//! Notification history endpoints

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
use crate::domain::notifications;
use crate::models::Notification;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/notifications",
            get(list_notifications).delete(delete_all),
        )
        .route("/notifications/unread-count", get(get_unread_count))
        .route("/notifications/read-all", post(read_all))
        .route("/notifications/{id}/read", post(read_one))
        .route("/notifications/{id}", delete(delete_one))
}

#[derive(Deserialize)]
struct ListQuery {
    limit: Option<i64>,
}

/// GET /notifications - most recent first
async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Notification>>, StatusCode> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

    notifications::recent_notifications(&state.db, limit)
        .await
        .map(Json)
        .map_err(|e| {
            eprintln!("Failed to list notifications: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

#[derive(Serialize)]
struct UnreadCountResponse {
    count: i64,
}

/// GET /notifications/unread-count
async fn get_unread_count(
    State(state): State<Arc<AppState>>,
) -> Result<Json<UnreadCountResponse>, StatusCode> {
    notifications::unread_count(&state.db)
        .await
        .map(|count| Json(UnreadCountResponse { count }))
        .map_err(|e| {
            eprintln!("Failed to count unread notifications: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

/// POST /notifications/:id/read
async fn read_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    let updated = notifications::mark_read(&state.db, id).await.map_err(|e| {
        eprintln!("Failed to mark notification {} read: {}", id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    if updated {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

#[derive(Serialize)]
struct BulkResponse {
    affected: u64,
}

/// POST /notifications/read-all
async fn read_all(State(state): State<Arc<AppState>>) -> Result<Json<BulkResponse>, StatusCode> {
    notifications::mark_all_read(&state.db)
        .await
        .map(|affected| Json(BulkResponse { affected }))
        .map_err(|e| {
            eprintln!("Failed to mark all notifications read: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

/// DELETE /notifications/:id
async fn delete_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    let deleted = notifications::delete_notification(&state.db, id)
        .await
        .map_err(|e| {
            eprintln!("Failed to delete notification {}: {}", id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

/// DELETE /notifications - clear the whole history
async fn delete_all(State(state): State<Arc<AppState>>) -> Result<Json<BulkResponse>, StatusCode> {
    notifications::delete_all_notifications(&state.db)
        .await
        .map(|affected| Json(BulkResponse { affected }))
        .map_err(|e| {
            eprintln!("Failed to delete notifications: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}
