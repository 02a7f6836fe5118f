//! Notification records - DB queries
//!
//! Records are append-only from the pipeline's point of view; only the
//! read-state transitions mutate them, and a daily cleanup enforces the
//! retention window.

use sqlx::PgPool;

use crate::models::{Notification, NotificationKind};

pub async fn create_notification(
    db: &PgPool,
    title: &str,
    body: &str,
    kind: NotificationKind,
    data: Option<serde_json::Value>,
) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO notifications (title, body, kind, data)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(title)
    .bind(body)
    .bind(kind)
    .bind(data)
    .fetch_one(db)
    .await?;

    Ok(row.0)
}

pub async fn recent_notifications(
    db: &PgPool,
    limit: i64,
) -> Result<Vec<Notification>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT id, title, body, kind, data, read, sent_at, clicked_at
        FROM notifications
        ORDER BY sent_at DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(db)
    .await
}

pub async fn unread_count(db: &PgPool) -> Result<i64, sqlx::Error> {
    let row: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE read = FALSE")
            .fetch_one(db)
            .await?;
    Ok(row.0)
}

/// Mark one notification read; `clicked_at` is stamped once.
pub async fn mark_read(db: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE notifications
        SET read = TRUE, clicked_at = COALESCE(clicked_at, NOW())
        WHERE id = $1
        "#,
    )
    .bind(id)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn mark_all_read(db: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE read = FALSE")
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}

pub async fn delete_notification(db: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_all_notifications(db: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM notifications").execute(db).await?;
    Ok(result.rows_affected())
}

/// Age-based retention: delete notifications older than `days`.
pub async fn cleanup_older_than(db: &PgPool, days: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM notifications WHERE sent_at < NOW() - ($1::text || ' days')::interval",
    )
    .bind(days)
    .execute(db)
    .await?;
    Ok(result.rows_affected())
}
