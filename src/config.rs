//! Pipeline configuration from environment variables
//!
//! One timetable policy, all times UTC: drafts every two hours at odd hours
//! (so they never collide with publish slots), three fixed publish slots at
//! 14:00 / 18:00 / 22:00 UTC, a reminder every six hours, and a daily
//! notification cleanup at 03:00 UTC.

use std::env;

const DEFAULT_DAILY_DRAFT_CAP: i64 = 6;
const DEFAULT_DRAFT_SCHEDULE: &str = "0 0 1-23/2 * * *";
const DEFAULT_PUBLISH_SCHEDULE: &str = "0 0 14,18,22 * * *";
const DEFAULT_REMINDER_SCHEDULE: &str = "0 0 */6 * * *";
const DEFAULT_CLEANUP_SCHEDULE: &str = "0 0 3 * * *";
const DEFAULT_RETENTION_DAYS: i64 = 30;
const DEFAULT_LEASE_SECONDS: i64 = 300;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum posts created per trailing 24h before generation is skipped
    pub daily_draft_cap: i64,
    /// Cron expression (with seconds field) for draft generation slots
    pub draft_schedule: String,
    /// Cron expression for publish slots
    pub publish_schedule: String,
    /// Cron expression for the periodic reminder notification
    pub reminder_schedule: String,
    /// Cron expression for notification cleanup
    pub cleanup_schedule: String,
    /// Notifications older than this many days are deleted by cleanup
    pub notification_retention_days: i64,
    /// Publish claim lease; a crashed cycle releases its row after this long
    pub publish_lease_seconds: i64,
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self {
            daily_draft_cap: env_i64("DAILY_DRAFT_CAP", DEFAULT_DAILY_DRAFT_CAP),
            draft_schedule: env_string("DRAFT_SCHEDULE", DEFAULT_DRAFT_SCHEDULE),
            publish_schedule: env_string("PUBLISH_SCHEDULE", DEFAULT_PUBLISH_SCHEDULE),
            reminder_schedule: env_string("REMINDER_SCHEDULE", DEFAULT_REMINDER_SCHEDULE),
            cleanup_schedule: env_string("CLEANUP_SCHEDULE", DEFAULT_CLEANUP_SCHEDULE),
            notification_retention_days: env_i64(
                "NOTIFICATION_RETENTION_DAYS",
                DEFAULT_RETENTION_DAYS,
            ),
            publish_lease_seconds: env_i64("PUBLISH_LEASE_SECONDS", DEFAULT_LEASE_SECONDS),
        }
    }
}

fn env_i64(name: &str, default: i64) -> i64 {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}
