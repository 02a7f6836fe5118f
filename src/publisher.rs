//! Publish workflow
//!
//! Claims the oldest pending post, validates it locally, performs the
//! platform call, and records the outcome. When the queue is empty the
//! fallback path generates one draft synchronously and retries the claim
//! exactly once; it can never loop or double-post.

use chrono::{Timelike, Utc};
use sqlx::PgPool;

use crate::config::PipelineConfig;
use crate::constants::TWEET_MAX_CHARS;
use crate::domain::posts;
use crate::generate::{self, DraftOutcome};
use crate::models::{NotificationKind, Post, SlotType};
use crate::services::llm::TextCompletion;
use crate::services::push;
use crate::services::twitter::{SocialPublish, TwitterError};

/// What a publish-slot invocation did.
#[derive(Debug)]
pub enum PublishOutcome {
    Posted { post_id: i64, tweet_id: String },
    MarkedFailed { post_id: i64, reason: String },
    /// Queue empty and the fallback draft could not be claimed
    QueueEmpty,
    /// Queue empty and fallback generation produced nothing
    FallbackSkipped(DraftOutcome),
}

/// Local pre-flight check; a violation is terminal for the post and must
/// happen before any network call.
pub fn validate_for_publish(text: &str) -> Result<(), String> {
    if text.trim().is_empty() {
        return Err("Tweet text is empty".to_string());
    }
    let chars = text.chars().count();
    if chars > TWEET_MAX_CHARS {
        return Err(format!(
            "Tweet exceeds {} characters ({})",
            TWEET_MAX_CHARS, chars
        ));
    }
    Ok(())
}

/// Turn a platform error into the message and code stored on the post.
///
/// Duplicate-content gets its own message so an operator can see why a cycle
/// produced no visible post.
pub fn classify_publish_error(error: &TwitterError) -> (String, Option<i32>) {
    match error {
        TwitterError::Duplicate => (
            "Duplicate content (rejected by platform)".to_string(),
            Some(403),
        ),
        TwitterError::RateLimited => ("Platform rate limit exceeded".to_string(), Some(429)),
        TwitterError::Auth => (
            "Platform authentication failed; check API credentials".to_string(),
            Some(401),
        ),
        TwitterError::Http(e) => (format!("Network error while posting: {}", e), None),
        TwitterError::Api { status, detail } => (
            format!("Posting failed (status {}): {}", status, detail),
            Some(*status as i32),
        ),
    }
}

async fn notify_failure(db: &PgPool, reason: &str) {
    push::notify(
        db,
        "❌ Post Failed",
        &format!("Could not auto-post tweet: {}", reason),
        NotificationKind::Error,
        Some(serde_json::json!({ "url": "/feed?filter=failed" })),
    )
    .await;
}

/// Publish a claimed post and record the result.
async fn publish_claimed(
    db: &PgPool,
    publisher: &impl SocialPublish,
    post: &Post,
) -> Result<PublishOutcome, sqlx::Error> {
    if let Err(reason) = validate_for_publish(&post.text) {
        eprintln!("[publish] Post {} failed validation: {}", post.id, reason);
        posts::mark_failed(db, post.id, &reason, None).await?;
        notify_failure(db, &reason).await;
        return Ok(PublishOutcome::MarkedFailed {
            post_id: post.id,
            reason,
        });
    }

    println!("[publish] Attempting to post {}...", post.id);
    match publisher.publish(&post.text).await {
        Ok(published) => {
            posts::mark_posted(db, post.id, &published.id).await?;
            println!("[publish] Posted {} as tweet {}", post.id, published.id);

            let preview: String = post.text.chars().take(40).collect();
            push::notify(
                db,
                "Tweet Posted! 🚀",
                &format!("Sent to X: {}...", preview),
                NotificationKind::Success,
                Some(serde_json::json!({ "url": "/feed" })),
            )
            .await;

            Ok(PublishOutcome::Posted {
                post_id: post.id,
                tweet_id: published.id,
            })
        }
        Err(error) => {
            eprintln!("[publish] Failed to post {}: {}", post.id, error);
            let (reason, code) = classify_publish_error(&error);
            posts::mark_failed(db, post.id, &reason, code).await?;
            notify_failure(db, &reason).await;

            Ok(PublishOutcome::MarkedFailed {
                post_id: post.id,
                reason,
            })
        }
    }
}

/// Run one publish slot: claim and publish the oldest pending post, falling
/// back to a single synchronous generation when the queue is empty.
pub async fn publish_with_fallback(
    db: &PgPool,
    publisher: &impl SocialPublish,
    llm_client: &impl TextCompletion,
    config: &PipelineConfig,
) -> Result<PublishOutcome, sqlx::Error> {
    if let Some(post) = posts::claim_oldest_pending(db, config.publish_lease_seconds).await? {
        return publish_claimed(db, publisher, &post).await;
    }

    println!("[publish] No pending posts; running fallback generation");
    let slot = SlotType::for_hour(Utc::now().hour());
    match generate::generate_draft(db, llm_client, config, slot).await? {
        DraftOutcome::Created { .. } => {}
        other => {
            println!("[publish] Fallback generation produced no draft, ending cycle");
            return Ok(PublishOutcome::FallbackSkipped(other));
        }
    }

    // One retry against the freshly created draft, then give up for this slot.
    match posts::claim_oldest_pending(db, config.publish_lease_seconds).await? {
        Some(post) => publish_claimed(db, publisher, &post).await,
        None => {
            eprintln!("[publish] Fallback draft was not claimable; ending cycle");
            Ok(PublishOutcome::QueueEmpty)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlong_text_is_rejected_before_any_call() {
        let text = "x".repeat(310);
        let reason = validate_for_publish(&text).unwrap_err();
        assert!(reason.contains("280"));
        assert!(reason.contains("310"));
    }

    #[test]
    fn test_exact_limit_passes_validation() {
        let text = "x".repeat(280);
        assert!(validate_for_publish(&text).is_ok());
    }

    #[test]
    fn test_empty_text_is_rejected() {
        assert!(validate_for_publish("   ").is_err());
    }

    #[test]
    fn test_duplicate_error_has_distinguishing_message() {
        let (reason, code) = classify_publish_error(&TwitterError::Duplicate);
        assert!(reason.contains("Duplicate content"));
        assert_eq!(code, Some(403));

        let (generic, _) = classify_publish_error(&TwitterError::Api {
            status: 500,
            detail: "boom".to_string(),
        });
        assert_ne!(reason, generic);
    }

    #[test]
    fn test_rate_limit_and_auth_messages_differ() {
        let (rate, _) = classify_publish_error(&TwitterError::RateLimited);
        let (auth, _) = classify_publish_error(&TwitterError::Auth);
        assert!(rate.to_lowercase().contains("rate limit"));
        assert!(auth.to_lowercase().contains("authentication"));
    }
}
