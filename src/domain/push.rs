//! Push subscription registry - DB queries
//!
//! Single-user deployment: subscriptions are keyed by endpoint alone. An
//! endpoint that the push service reports as gone is removed by the
//! broadcast path.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSubscriptionData {
    pub endpoint: String,
    pub keys: PushSubscriptionKeys,
}

#[derive(sqlx::FromRow)]
struct PushSubscriptionRow {
    endpoint: String,
    p256dh: String,
    auth: String,
}

pub async fn upsert_subscription(
    db: &PgPool,
    payload: &PushSubscriptionData,
    user_agent: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO push_subscriptions (endpoint, p256dh, auth, user_agent)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (endpoint)
        DO UPDATE SET
            p256dh = EXCLUDED.p256dh,
            auth = EXCLUDED.auth,
            user_agent = EXCLUDED.user_agent,
            last_used = NOW()
        "#,
    )
    .bind(&payload.endpoint)
    .bind(&payload.keys.p256dh)
    .bind(&payload.keys.auth)
    .bind(user_agent)
    .execute(db)
    .await?;

    Ok(())
}

pub async fn list_subscriptions(db: &PgPool) -> Result<Vec<PushSubscriptionData>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PushSubscriptionRow>(
        r#"
        SELECT endpoint, p256dh, auth
        FROM push_subscriptions
        ORDER BY last_used DESC
        "#,
    )
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| PushSubscriptionData {
            endpoint: row.endpoint,
            keys: PushSubscriptionKeys {
                p256dh: row.p256dh,
                auth: row.auth,
            },
        })
        .collect())
}

pub async fn delete_subscription(db: &PgPool, endpoint: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM push_subscriptions WHERE endpoint = $1")
        .bind(endpoint)
        .execute(db)
        .await?;

    Ok(())
}
