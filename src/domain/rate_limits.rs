//! Persisted request budgets, one row per endpoint key
//!
//! Rate-limit state lives in the shared store, not process memory, so every
//! server instance sees the same budget and nothing is lost on restart. The
//! accept/reject decision is a pure function over a state snapshot; the
//! store applies it under a row lock so concurrent callers serialize their
//! check-and-increment.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::constants::{LLM_ENDPOINT, MANUAL_GENERATE_ENDPOINT};

/// Budget shape for one endpoint key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitPolicy {
    /// Up to `limit` accepted calls per rolling window; the window resets as
    /// a whole once `reset_time` passes.
    Window { limit: i32, window: Duration },
    /// Minimum spacing between any two accepted calls.
    Interval { min_interval: Duration },
}

impl RateLimitPolicy {
    fn limit(&self) -> i32 {
        match self {
            RateLimitPolicy::Window { limit, .. } => *limit,
            RateLimitPolicy::Interval { .. } => 1,
        }
    }

    fn window_duration(&self) -> Duration {
        match self {
            RateLimitPolicy::Window { window, .. } => *window,
            RateLimitPolicy::Interval { min_interval } => *min_interval,
        }
    }
}

/// Static policy table. Unknown endpoints get the conservative LLM policy.
pub fn policy_for(endpoint: &str) -> RateLimitPolicy {
    match endpoint {
        MANUAL_GENERATE_ENDPOINT => RateLimitPolicy::Window {
            limit: 15,
            window: Duration::seconds(60),
        },
        LLM_ENDPOINT => RateLimitPolicy::Interval {
            min_interval: Duration::seconds(5),
        },
        _ => RateLimitPolicy::Interval {
            min_interval: Duration::seconds(5),
        },
    }
}

/// Result of a check: rejection is a normal negative outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accepted { remaining: i32 },
    Rejected { retry_after: Duration },
}

/// Snapshot of one endpoint's persisted state.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LimitState {
    pub request_count: i32,
    pub limit_max: i32,
    pub reset_time: DateTime<Utc>,
    pub last_request_time: Option<DateTime<Utc>>,
}

/// Decide accept/reject and produce the state to persist.
///
/// Pure so the window and interval properties are directly testable; the
/// returned state is written back even on rejection (the row tracks every
/// attempt via `last_updated`).
pub fn decide(
    policy: &RateLimitPolicy,
    state: Option<&LimitState>,
    now: DateTime<Utc>,
) -> (Decision, LimitState) {
    match policy {
        RateLimitPolicy::Window { limit, window } => match state {
            None => accept_fresh(*limit, now, *window),
            Some(s) if now >= s.reset_time => accept_fresh(*limit, now, *window),
            Some(s) if s.request_count >= *limit => {
                let retry_after = s.reset_time - now;
                (Decision::Rejected { retry_after }, s.clone())
            }
            Some(s) => {
                let count = s.request_count + 1;
                (
                    Decision::Accepted {
                        remaining: (limit - count).max(0),
                    },
                    LimitState {
                        request_count: count,
                        last_request_time: Some(now),
                        ..s.clone()
                    },
                )
            }
        },
        RateLimitPolicy::Interval { min_interval } => {
            let last = state.and_then(|s| s.last_request_time);
            match last {
                Some(last) if now - last < *min_interval => {
                    let retry_after = *min_interval - (now - last);
                    let s = state.cloned().unwrap_or_else(|| LimitState {
                        request_count: 0,
                        limit_max: 1,
                        reset_time: now,
                        last_request_time: Some(last),
                    });
                    (Decision::Rejected { retry_after }, s)
                }
                _ => (
                    Decision::Accepted { remaining: 0 },
                    LimitState {
                        request_count: state.map(|s| s.request_count + 1).unwrap_or(1),
                        limit_max: 1,
                        reset_time: now + *min_interval,
                        last_request_time: Some(now),
                    },
                ),
            }
        }
    }
}

fn accept_fresh(limit: i32, now: DateTime<Utc>, window: Duration) -> (Decision, LimitState) {
    (
        Decision::Accepted {
            remaining: limit - 1,
        },
        LimitState {
            request_count: 1,
            limit_max: limit,
            reset_time: now + window,
            last_request_time: Some(now),
        },
    )
}

/// Atomically check and consume one slot for `endpoint`.
///
/// The row is read `FOR UPDATE` and written back in the same transaction, so
/// two simultaneous callers can never both take the last slot.
pub async fn check_and_consume(db: &PgPool, endpoint: &str) -> Result<Decision, sqlx::Error> {
    let policy = policy_for(endpoint);
    let mut tx = db.begin().await?;

    let state: Option<LimitState> = sqlx::query_as(
        r#"
        SELECT request_count, limit_max, reset_time, last_request_time
        FROM rate_limits
        WHERE endpoint = $1
        FOR UPDATE
        "#,
    )
    .bind(endpoint)
    .fetch_optional(&mut *tx)
    .await?;

    let (decision, next) = decide(&policy, state.as_ref(), Utc::now());

    sqlx::query(
        r#"
        INSERT INTO rate_limits (endpoint, request_count, limit_max, reset_time, last_request_time, last_updated)
        VALUES ($1, $2, $3, $4, $5, NOW())
        ON CONFLICT (endpoint) DO UPDATE SET
            request_count = EXCLUDED.request_count,
            limit_max = EXCLUDED.limit_max,
            reset_time = EXCLUDED.reset_time,
            last_request_time = EXCLUDED.last_request_time,
            last_updated = NOW()
        "#,
    )
    .bind(endpoint)
    .bind(next.request_count)
    .bind(next.limit_max)
    .bind(next.reset_time)
    .bind(next.last_request_time)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(decision)
}

/// Current state for display, with remaining budget computed against `now`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LimitView {
    pub endpoint: String,
    pub request_count: i32,
    pub limit: i32,
    pub reset_time: DateTime<Utc>,
    pub remaining: i32,
}

pub async fn limit_view(db: &PgPool, endpoint: &str) -> Result<LimitView, sqlx::Error> {
    let state: Option<LimitState> = sqlx::query_as(
        r#"
        SELECT request_count, limit_max, reset_time, last_request_time
        FROM rate_limits
        WHERE endpoint = $1
        "#,
    )
    .bind(endpoint)
    .fetch_optional(db)
    .await?;

    let policy = policy_for(endpoint);
    let limit = policy.limit();
    let now = Utc::now();

    Ok(match state {
        None => LimitView {
            endpoint: endpoint.to_string(),
            request_count: 0,
            limit,
            reset_time: now + policy.window_duration(),
            remaining: limit,
        },
        Some(s) if now >= s.reset_time => LimitView {
            endpoint: endpoint.to_string(),
            request_count: 0,
            limit,
            reset_time: s.reset_time,
            remaining: limit,
        },
        Some(s) => LimitView {
            endpoint: endpoint.to_string(),
            request_count: s.request_count,
            limit,
            reset_time: s.reset_time,
            remaining: (limit - s.request_count).max(0),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_policy() -> RateLimitPolicy {
        RateLimitPolicy::Window {
            limit: 3,
            window: Duration::seconds(60),
        }
    }

    fn interval_policy() -> RateLimitPolicy {
        RateLimitPolicy::Interval {
            min_interval: Duration::seconds(5),
        }
    }

    #[test]
    fn test_window_never_admits_more_than_limit() {
        let policy = window_policy();
        let now = Utc::now();
        let mut state: Option<LimitState> = None;
        let mut accepted = 0;

        for _ in 0..10 {
            let (decision, next) = decide(&policy, state.as_ref(), now);
            if matches!(decision, Decision::Accepted { .. }) {
                accepted += 1;
            }
            state = Some(next);
        }

        assert_eq!(accepted, 3);
    }

    #[test]
    fn test_window_replenishes_after_reset() {
        let policy = window_policy();
        let now = Utc::now();
        let mut state: Option<LimitState> = None;

        for _ in 0..3 {
            let (_, next) = decide(&policy, state.as_ref(), now);
            state = Some(next);
        }
        let (decision, _) = decide(&policy, state.as_ref(), now);
        assert!(matches!(decision, Decision::Rejected { .. }));

        let later = now + Duration::seconds(61);
        let (decision, next) = decide(&policy, state.as_ref(), later);
        assert!(matches!(decision, Decision::Accepted { remaining: 2 }));
        assert_eq!(next.request_count, 1);
    }

    #[test]
    fn test_window_rejection_reports_retry_after() {
        let policy = window_policy();
        let now = Utc::now();
        let mut state: Option<LimitState> = None;
        for _ in 0..3 {
            let (_, next) = decide(&policy, state.as_ref(), now);
            state = Some(next);
        }

        let at = now + Duration::seconds(20);
        let (decision, _) = decide(&policy, state.as_ref(), at);
        match decision {
            Decision::Rejected { retry_after } => {
                assert_eq!(retry_after, Duration::seconds(40));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_interval_enforces_minimum_spacing() {
        let policy = interval_policy();
        let start = Utc::now();
        let mut state: Option<LimitState> = None;
        let mut accepted_at: Vec<DateTime<Utc>> = Vec::new();

        // One attempt per second for 20 seconds.
        for i in 0..20 {
            let now = start + Duration::seconds(i);
            let (decision, next) = decide(&policy, state.as_ref(), now);
            if matches!(decision, Decision::Accepted { .. }) {
                accepted_at.push(now);
            }
            state = Some(next);
        }

        for pair in accepted_at.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::seconds(5));
        }
    }

    #[test]
    fn test_interval_rejection_reports_remaining_wait() {
        let policy = interval_policy();
        let start = Utc::now();
        let (_, state) = decide(&policy, None, start);

        let (decision, _) = decide(&policy, Some(&state), start + Duration::seconds(2));
        match decision {
            Decision::Rejected { retry_after } => {
                assert_eq!(retry_after, Duration::seconds(3));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_interval_accepts_exactly_at_boundary() {
        let policy = interval_policy();
        let start = Utc::now();
        let (_, state) = decide(&policy, None, start);

        let (decision, _) = decide(&policy, Some(&state), start + Duration::seconds(5));
        assert!(matches!(decision, Decision::Accepted { .. }));
    }
}
