//! Post queue - DB queries and status transitions
//!
//! The queue owns all post records. Status transitions are single atomic
//! UPDATEs, and the publisher takes a short lease on the row it is working on
//! so concurrent slots and user edits cannot race it. FIFO order among
//! pending posts is `created_at` ascending.

use sqlx::PgPool;

use crate::constants::SEARCH_WINDOW;
use crate::models::{NewPost, Post, PostSource, PostStatus};

const POST_COLUMNS: &str = "id, text, status, source, tweet_id, is_ai_generated, ai_model, \
     niche, subcategory, ai_guidance, ai_prompt, slot_type, error_message, error_code, \
     created_at, posted_at";

/// Insert a post. `posted_at` is set at insert time only when the record is
/// already posted (the compose-and-post path); the normal pipeline inserts
/// pending rows.
pub async fn insert_post(db: &PgPool, post: &NewPost) -> Result<i64, sqlx::Error> {
    let ai = post.ai.as_ref();

    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO posts (
            text, status, source, tweet_id,
            is_ai_generated, ai_model, niche, subcategory, ai_guidance, ai_prompt, slot_type,
            posted_at
        )
        VALUES (
            $1, $2, $3, $4,
            $5, $6, $7, $8, $9, $10, $11,
            CASE WHEN $2 = 'posted'::post_status THEN NOW() END
        )
        RETURNING id
        "#,
    )
    .bind(&post.text)
    .bind(post.status)
    .bind(post.source)
    .bind(&post.tweet_id)
    .bind(ai.is_some())
    .bind(ai.map(|a| a.model.clone()))
    .bind(ai.and_then(|a| a.niche.clone()))
    .bind(ai.and_then(|a| a.subcategory.clone()))
    .bind(ai.and_then(|a| a.guidance.clone()))
    .bind(ai.and_then(|a| a.prompt.clone()))
    .bind(ai.and_then(|a| a.slot_type))
    .fetch_one(db)
    .await?;

    Ok(row.0)
}

/// Claim the oldest pending post for publishing.
///
/// The CTE locks exactly one row (`FOR UPDATE SKIP LOCKED`) and stamps the
/// publish lease, so two overlapping publish slots can never claim the same
/// post. A lease older than `lease_seconds` counts as stale and can be
/// re-claimed (covers a crashed cycle).
pub async fn claim_oldest_pending(
    db: &PgPool,
    lease_seconds: i64,
) -> Result<Option<Post>, sqlx::Error> {
    sqlx::query_as(&format!(
        r#"
        WITH claimed AS (
            SELECT id AS claimed_id
            FROM posts
            WHERE status = 'pending'
              AND (
                  publish_lease_at IS NULL
                  OR publish_lease_at < NOW() - ($1::text || ' seconds')::interval
              )
            ORDER BY created_at ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
        )
        UPDATE posts p
        SET publish_lease_at = NOW()
        FROM claimed
        WHERE p.id = claimed.claimed_id
        RETURNING {POST_COLUMNS}
        "#
    ))
    .bind(lease_seconds)
    .fetch_optional(db)
    .await
}

/// Oldest pending post without claiming it (diagnostics / API reads).
pub async fn oldest_pending(db: &PgPool) -> Result<Option<Post>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {POST_COLUMNS} FROM posts WHERE status = 'pending' \
         ORDER BY created_at ASC LIMIT 1"
    ))
    .fetch_optional(db)
    .await
}

/// Transition a post to `posted`.
///
/// Idempotent: `posted_at` and `tweet_id` are only written on the first
/// call; repeating the call leaves the row unchanged.
pub async fn mark_posted(db: &PgPool, id: i64, tweet_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE posts
        SET status = 'posted',
            tweet_id = COALESCE(tweet_id, $2),
            posted_at = COALESCE(posted_at, NOW()),
            error_message = NULL,
            error_code = NULL,
            publish_lease_at = NULL
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(tweet_id)
    .execute(db)
    .await?;
    Ok(())
}

/// Transition a post to `failed` with a descriptive message.
///
/// Never regresses a posted row; `posted_at` stays unset.
pub async fn mark_failed(
    db: &PgPool,
    id: i64,
    message: &str,
    code: Option<i32>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE posts
        SET status = 'failed',
            error_message = $2,
            error_code = $3,
            publish_lease_at = NULL
        WHERE id = $1 AND status <> 'posted'
        "#,
    )
    .bind(id)
    .bind(message)
    .bind(code)
    .execute(db)
    .await?;
    Ok(())
}

/// Most recent posts, newest first. Feeds the daily cap and topic balancing.
pub async fn recent_posts(db: &PgPool, limit: i64) -> Result<Vec<Post>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(db)
    .await
}

/// Recent posts filtered by status, newest first.
pub async fn posts_by_status(
    db: &PgPool,
    status: PostStatus,
    limit: i64,
) -> Result<Vec<Post>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {POST_COLUMNS} FROM posts WHERE status = $1 \
         ORDER BY created_at DESC LIMIT $2"
    ))
    .bind(status)
    .bind(limit)
    .fetch_all(db)
    .await
}

/// Recent posts filtered by source, newest first.
pub async fn posts_by_source(
    db: &PgPool,
    source: PostSource,
    limit: i64,
) -> Result<Vec<Post>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {POST_COLUMNS} FROM posts WHERE source = $1 \
         ORDER BY created_at DESC LIMIT $2"
    ))
    .bind(source)
    .bind(limit)
    .fetch_all(db)
    .await
}

/// Case-insensitive substring search over the most recent posts.
pub async fn search_posts(db: &PgPool, text: &str, limit: i64) -> Result<Vec<Post>, sqlx::Error> {
    sqlx::query_as(&format!(
        r#"
        SELECT {POST_COLUMNS} FROM (
            SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC LIMIT $2
        ) recent
        WHERE position(lower($1) IN lower(text)) > 0
        ORDER BY created_at DESC
        LIMIT $3
        "#
    ))
    .bind(text)
    .bind(SEARCH_WINDOW)
    .bind(limit)
    .fetch_all(db)
    .await
}

/// Queue counters by status.
#[derive(Debug, Clone, Copy, serde::Serialize, sqlx::FromRow)]
pub struct PostStats {
    pub total: i64,
    pub pending: i64,
    pub posted: i64,
    pub failed: i64,
}

pub async fn post_stats(db: &PgPool) -> Result<PostStats, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT
            COUNT(*) AS total,
            COUNT(*) FILTER (WHERE status = 'pending') AS pending,
            COUNT(*) FILTER (WHERE status = 'posted') AS posted,
            COUNT(*) FILTER (WHERE status = 'failed') AS failed
        FROM posts
        "#,
    )
    .fetch_one(db)
    .await
}

/// Outcome of a user-initiated delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteResult {
    Deleted,
    NotFound,
    /// The row is held by a running publish cycle; retry after the lease ends
    Locked,
}

/// Delete a post unless a publish cycle currently holds its lease.
pub async fn delete_post(
    db: &PgPool,
    id: i64,
    lease_seconds: i64,
) -> Result<DeleteResult, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM posts
        WHERE id = $1
          AND (
              publish_lease_at IS NULL
              OR publish_lease_at < NOW() - ($2::text || ' seconds')::interval
          )
        "#,
    )
    .bind(id)
    .bind(lease_seconds)
    .execute(db)
    .await?;

    if result.rows_affected() > 0 {
        return Ok(DeleteResult::Deleted);
    }

    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM posts WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await?;

    Ok(match exists {
        Some(_) => DeleteResult::Locked,
        None => DeleteResult::NotFound,
    })
}
