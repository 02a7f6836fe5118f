//! Time-driven slots for the content pipeline, built on apalis
//!
//! Four independent cron workers share one monitor: draft generation,
//! publishing, the periodic reminder, and notification cleanup. All slot
//! times are UTC. Draft and publish firings pipe through Postgres-backed job
//! storage; housekeeping runs straight off the cron stream. A slot handler
//! always returns Ok - failures are logged and absorbed so no firing can
//! crash the scheduler.

use apalis::prelude::*;
use apalis_cron::{CronStream, Schedule};
use apalis_sql::postgres::PostgresStorage;
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::str::FromStr;

use crate::config::PipelineConfig;
use crate::domain::notifications;
use crate::generate;
use crate::models::{NotificationKind, SlotType};
use crate::publisher;
use crate::services::llm::LlmClient;
use crate::services::push;
use crate::services::twitter::TwitterClient;

/// Shared context handed to every slot handler
#[derive(Clone)]
pub struct PipelineContext {
    pub db: PgPool,
    pub llm: LlmClient,
    pub twitter: TwitterClient,
    pub config: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftJob {
    pub scheduled_at: DateTime<Utc>,
}

impl From<DateTime<Utc>> for DraftJob {
    fn from(dt: DateTime<Utc>) -> Self {
        DraftJob { scheduled_at: dt }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishJob {
    pub scheduled_at: DateTime<Utc>,
}

impl From<DateTime<Utc>> for PublishJob {
    fn from(dt: DateTime<Utc>) -> Self {
        PublishJob { scheduled_at: dt }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderJob {
    pub scheduled_at: DateTime<Utc>,
}

impl From<DateTime<Utc>> for ReminderJob {
    fn from(dt: DateTime<Utc>) -> Self {
        ReminderJob { scheduled_at: dt }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupJob {
    pub scheduled_at: DateTime<Utc>,
}

impl From<DateTime<Utc>> for CleanupJob {
    fn from(dt: DateTime<Utc>) -> Self {
        CleanupJob { scheduled_at: dt }
    }
}

/// Generation slot: the prompt style follows the scheduled hour.
async fn run_draft_job(job: DraftJob, ctx: Data<PipelineContext>) -> Result<(), Error> {
    let slot = SlotType::for_hour(job.scheduled_at.hour());
    match generate::generate_draft(&ctx.db, &ctx.llm, &ctx.config, slot).await {
        Ok(outcome) => println!("[scheduler] Draft slot finished: {:?}", outcome),
        Err(e) => eprintln!("[scheduler] Draft slot error: {}", e),
    }
    Ok(())
}

/// Publish slot, including the bounded empty-queue fallback.
async fn run_publish_job(_job: PublishJob, ctx: Data<PipelineContext>) -> Result<(), Error> {
    match publisher::publish_with_fallback(&ctx.db, &ctx.twitter, &ctx.llm, &ctx.config).await {
        Ok(outcome) => println!("[scheduler] Publish slot finished: {:?}", outcome),
        Err(e) => eprintln!("[scheduler] Publish slot error: {}", e),
    }
    Ok(())
}

async fn run_reminder_job(_job: ReminderJob, ctx: Data<PipelineContext>) -> Result<(), Error> {
    push::notify(
        &ctx.db,
        "✨ Time to Create!",
        "Generate an engaging tweet with AI and grow your X presence!",
        NotificationKind::Reminder,
        Some(serde_json::json!({ "url": "/feed", "action": "compose" })),
    )
    .await;
    Ok(())
}

async fn run_cleanup_job(_job: CleanupJob, ctx: Data<PipelineContext>) -> Result<(), Error> {
    match notifications::cleanup_older_than(&ctx.db, ctx.config.notification_retention_days).await {
        Ok(deleted) if deleted > 0 => {
            println!("[scheduler] Cleaned up {} old notifications", deleted)
        }
        Ok(_) => {}
        Err(e) => eprintln!("[scheduler] Notification cleanup error: {}", e),
    }
    Ok(())
}

/// Start all cron workers. Runs until the process exits.
pub async fn run_scheduler(ctx: PipelineContext) {
    let pool = ctx.db.clone();

    // Run apalis migrations
    PostgresStorage::setup(&pool)
        .await
        .expect("Failed to set up apalis storage");

    let draft_schedule =
        Schedule::from_str(&ctx.config.draft_schedule).expect("Invalid draft schedule");
    let publish_schedule =
        Schedule::from_str(&ctx.config.publish_schedule).expect("Invalid publish schedule");
    let reminder_schedule =
        Schedule::from_str(&ctx.config.reminder_schedule).expect("Invalid reminder schedule");
    let cleanup_schedule =
        Schedule::from_str(&ctx.config.cleanup_schedule).expect("Invalid cleanup schedule");

    let draft_storage: PostgresStorage<DraftJob> = PostgresStorage::new(pool.clone());
    let draft_backend = CronStream::new(draft_schedule).pipe_to_storage(draft_storage);

    let publish_storage: PostgresStorage<PublishJob> = PostgresStorage::new(pool.clone());
    let publish_backend = CronStream::new(publish_schedule).pipe_to_storage(publish_storage);

    println!(
        "[scheduler] Workers starting (drafts '{}', publish '{}', reminder '{}', cleanup '{}')",
        ctx.config.draft_schedule,
        ctx.config.publish_schedule,
        ctx.config.reminder_schedule,
        ctx.config.cleanup_schedule
    );

    let draft_worker = WorkerBuilder::new("draft-worker")
        .data(ctx.clone())
        .backend(draft_backend)
        .build_fn(run_draft_job);

    let publish_worker = WorkerBuilder::new("publish-worker")
        .data(ctx.clone())
        .backend(publish_backend)
        .build_fn(run_publish_job);

    let reminder_worker = WorkerBuilder::new("reminder-worker")
        .data(ctx.clone())
        .backend(CronStream::new(reminder_schedule))
        .build_fn(run_reminder_job);

    let cleanup_worker = WorkerBuilder::new("cleanup-worker")
        .data(ctx.clone())
        .backend(CronStream::new(cleanup_schedule))
        .build_fn(run_cleanup_job);

    Monitor::new()
        .register(draft_worker)
        .register(publish_worker)
        .register(reminder_worker)
        .register(cleanup_worker)
        .run()
        .await
        .expect("Scheduler monitor failed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedules_parse() {
        let config = PipelineConfig::from_env();
        for expr in [
            &config.draft_schedule,
            &config.publish_schedule,
            &config.reminder_schedule,
            &config.cleanup_schedule,
        ] {
            assert!(Schedule::from_str(expr).is_ok(), "bad schedule: {}", expr);
        }
    }
}
