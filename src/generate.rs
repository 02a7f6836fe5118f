//! Draft generation workflow
//!
//! Each invocation: daily cap check, topic selection, rate-limit gate, the
//! retried completion call, post-processing, then a pending post plus a
//! draft-ready notification. Any failure aborts only the current cycle; the
//! scheduler never sees an error from here.

use chrono::{Duration, Utc};
use sqlx::PgPool;

use crate::config::PipelineConfig;
use crate::constants::{
    AI_MODEL_NAME, LLM_ENDPOINT, MANUAL_GENERATE_ENDPOINT, RECENT_WINDOW, TWEET_MAX_CHARS,
};
use crate::domain::{posts, rate_limits};
use crate::models::{AiMetadata, NewPost, NotificationKind, Post, PostSource, PostStatus, SlotType};
use crate::services::llm::{self, LlmError, TextCompletion};
use crate::services::push;
use crate::topics::{self, Topic};

/// Minimum words the strict (manual) validator accepts
const MIN_WORDS: usize = 15;
/// Content-quality regeneration attempts for the strict path; this budget is
/// separate from the transport retries inside each completion call
const QUALITY_MAX_ATTEMPTS: usize = 3;
const QUALITY_RETRY_PAUSE: std::time::Duration = std::time::Duration::from_millis(500);

const BASE_RULES: &str = "\
Rules:\n\
1. Length: STRICTLY between 100-150 characters. Concise, punchy text only.\n\
2. Hashtags: include 1-3 targeted hashtags from the niche.\n\
3. Hooks: use 1-2 relevant emojis as visual hooks.\n\
4. Variety: tie into current trends and vary phrasing to keep content fresh.\n\
5. Engagement: end with a question or call to action to encourage replies.";

/// Build the slot-specific prompt. Template choice is a pure function of the
/// slot type.
pub fn build_prompt(slot: SlotType, topic: &Topic) -> String {
    match slot {
        SlotType::Morning => format!(
            "Write a viral, high-engagement POLL-STYLE tweet about {} in the {} niche.\n\n\
             Ask a controversial or trending question to spark debate, phrased as the text \
             that precedes a poll. The goal is to get people to vote, reply, or share.\n\n{}",
            topic.subcategory, topic.niche, BASE_RULES
        ),
        SlotType::Afternoon => format!(
            "Write a viral, high-engagement CURIOSITY-HOOK tweet about {} in the {} niche.\n\n\
             Open with a counter-intuitive hook that creates a curiosity gap, and hint at a \
             thread for depth. The goal is to stop the scroll.\n\n{}",
            topic.subcategory, topic.niche, BASE_RULES
        ),
        SlotType::Evening => format!(
            "Write a viral, high-engagement EDUCATIONAL-TIP tweet about {} in the {} niche.\n\n\
             Share a valuable tip or quick win with proof or data, giving upfront value while \
             teasing more. The goal is to educate and build authority.\n\n{}",
            topic.subcategory, topic.niche, BASE_RULES
        ),
        SlotType::Growth => format!(
            "Write a short, engaging tweet about {} in the {} niche.\n\n\
             Keep it conversational and valuable, something followers would want to share.\n\n{}",
            topic.subcategory, topic.niche, BASE_RULES
        ),
    }
}

/// Prompt for user-triggered generation with optional free-form guidance.
pub fn build_manual_prompt(niche: &str, subcategory: &str, guidance: Option<&str>) -> String {
    let mut prompt = format!(
        "Write a short, engaging tweet about {} in the {} niche.",
        subcategory, niche
    );
    if let Some(guidance) = guidance {
        prompt.push_str(&format!(" Guidance: {}.", guidance));
    }
    prompt.push_str(" Include 2 relevant hashtags. Do not include quotes.");
    prompt
}

/// Clean up raw model output: strip wrapping quotes, drop any echoed
/// commentary after the first line, and enforce the platform ceiling by
/// trimming at a word boundary with an ellipsis.
pub fn postprocess_tweet(raw: &str) -> String {
    let mut text = raw.trim();
    if let Some(stripped) = text.strip_prefix(['"', '\'']) {
        text = stripped;
    }
    if let Some(stripped) = text.strip_suffix(['"', '\'']) {
        text = stripped;
    }
    let text = text.lines().next().unwrap_or("").trim();

    if text.chars().count() <= TWEET_MAX_CHARS {
        return text.to_string();
    }

    // Leave room for the ellipsis.
    let mut trimmed = String::new();
    for word in text.split(' ') {
        let candidate_len = trimmed.chars().count() + word.chars().count() + 1;
        if candidate_len > TWEET_MAX_CHARS - 3 {
            break;
        }
        if !trimmed.is_empty() {
            trimmed.push(' ');
        }
        trimmed.push_str(word);
    }
    trimmed.push_str("...");
    trimmed
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Posts created within the trailing 24 hours.
pub fn count_last_24h(recent: &[Post], now: chrono::DateTime<Utc>) -> usize {
    let cutoff = now - Duration::hours(24);
    recent.iter().filter(|p| p.created_at > cutoff).count()
}

/// What a scheduled generation invocation did.
#[derive(Debug)]
pub enum DraftOutcome {
    Created { post_id: i64, topic: Topic },
    /// Daily cap reached; nothing was attempted
    CapReached,
    /// The internal budget rejected the call; try again next slot
    RateLimited { retry_after_secs: i64 },
    /// Completion retries exhausted; no post was created
    Exhausted,
}

/// Run one scheduled draft-generation cycle.
pub async fn generate_draft(
    db: &PgPool,
    llm_client: &impl TextCompletion,
    config: &PipelineConfig,
    slot: SlotType,
) -> Result<DraftOutcome, sqlx::Error> {
    // Cap counts every post created today, pending or posted, so a stuck
    // queue cannot cause runaway generation.
    let recent = posts::recent_posts(db, RECENT_WINDOW).await?;
    let created_today = count_last_24h(&recent, Utc::now());
    if created_today as i64 >= config.daily_draft_cap {
        println!(
            "[generate] Daily draft cap ({}) reached, skipping",
            config.daily_draft_cap
        );
        return Ok(DraftOutcome::CapReached);
    }

    let Some(topic) = topics::select_topic(&recent) else {
        eprintln!("[generate] Topic catalog is empty, skipping");
        return Ok(DraftOutcome::Exhausted);
    };
    println!(
        "[generate] Generating {} draft for {} / {}",
        slot.as_str(),
        topic.niche,
        topic.subcategory
    );

    match rate_limits::check_and_consume(db, LLM_ENDPOINT).await? {
        rate_limits::Decision::Accepted { .. } => {}
        rate_limits::Decision::Rejected { retry_after } => {
            let secs = retry_after.num_seconds().max(0);
            println!(
                "[generate] Rate limit exceeded for {}, retry in {}s",
                LLM_ENDPOINT, secs
            );
            return Ok(DraftOutcome::RateLimited {
                retry_after_secs: secs,
            });
        }
    }

    let prompt = build_prompt(slot, &topic);
    let raw = match llm::complete_with_retries(llm_client, &prompt, llm::MAX_ATTEMPTS).await {
        Ok(text) => text,
        Err(e) => {
            eprintln!("[generate] Completion retries exhausted: {}", e);
            return Ok(DraftOutcome::Exhausted);
        }
    };

    let text = topics::add_hashtags(&postprocess_tweet(&raw), topic.niche, topic.subcategory);
    if text.is_empty() {
        eprintln!("[generate] Completion produced empty text, skipping");
        return Ok(DraftOutcome::Exhausted);
    }

    let post_id = posts::insert_post(
        db,
        &NewPost {
            text,
            status: PostStatus::Pending,
            source: PostSource::Timeline,
            tweet_id: None,
            ai: Some(AiMetadata {
                model: AI_MODEL_NAME.to_string(),
                niche: Some(topic.niche.to_string()),
                subcategory: Some(topic.subcategory.to_string()),
                guidance: None,
                prompt: Some(prompt),
                slot_type: Some(slot),
            }),
        },
    )
    .await?;

    let (title, body) = draft_notification(slot, &topic);
    push::notify(
        db,
        &title,
        &body,
        NotificationKind::Info,
        Some(serde_json::json!({ "url": "/feed?filter=pending" })),
    )
    .await;

    Ok(DraftOutcome::Created { post_id, topic })
}

/// Slot-aware draft-ready notification copy.
fn draft_notification(slot: SlotType, topic: &Topic) -> (String, String) {
    match slot {
        SlotType::Morning => (
            "Morning Poll Draft Ready! ☀️".to_string(),
            format!("Review your poll about {}.", topic.subcategory),
        ),
        SlotType::Afternoon => (
            "Afternoon Hook Draft Ready! 🎣".to_string(),
            format!("Review your hook about {}.", topic.subcategory),
        ),
        SlotType::Evening => (
            "Evening Value Draft Ready! 📚".to_string(),
            format!("Review your educational post about {}.", topic.subcategory),
        ),
        SlotType::Growth => (
            "New Draft Ready! 📝".to_string(),
            format!("Draft about {} generated.", topic.subcategory),
        ),
    }
}

/// Errors from the user-triggered generation path.
#[derive(Debug)]
pub enum GenerateError {
    RateLimited { retry_after_secs: i64 },
    /// The model never produced enough words within the quality budget
    TooShort { words: usize },
    Llm(LlmError),
    Db(sqlx::Error),
}

impl From<sqlx::Error> for GenerateError {
    fn from(e: sqlx::Error) -> Self {
        GenerateError::Db(e)
    }
}

impl std::fmt::Display for GenerateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerateError::RateLimited { retry_after_secs } => {
                write!(f, "rate limit exceeded, retry in {}s", retry_after_secs)
            }
            GenerateError::TooShort { words } => {
                write!(
                    f,
                    "generated tweet is too short ({} words, minimum {})",
                    words, MIN_WORDS
                )
            }
            GenerateError::Llm(e) => write!(f, "generation failed: {}", e),
            GenerateError::Db(e) => write!(f, "database error: {}", e),
        }
    }
}

impl std::error::Error for GenerateError {}

/// A generated tweet that has not been persisted.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GeneratedTweet {
    pub text: String,
    pub prompt: String,
    pub model: &'static str,
    pub niche: String,
    pub subcategory: String,
    pub guidance: Option<String>,
}

/// User-triggered generation with the strict validator: at least
/// `MIN_WORDS` words, regenerating (not just reformatting) when the output
/// is too short. No post record is created here; that is the caller's call.
pub async fn generate_manual(
    db: &PgPool,
    llm_client: &impl TextCompletion,
    niche: &str,
    subcategory: &str,
    guidance: Option<&str>,
) -> Result<GeneratedTweet, GenerateError> {
    match rate_limits::check_and_consume(db, MANUAL_GENERATE_ENDPOINT).await? {
        rate_limits::Decision::Accepted { .. } => {}
        rate_limits::Decision::Rejected { retry_after } => {
            return Err(GenerateError::RateLimited {
                retry_after_secs: retry_after.num_seconds().max(0),
            });
        }
    }

    let prompt = build_manual_prompt(niche, subcategory, guidance);
    let mut last_words = 0;

    for attempt in 1..=QUALITY_MAX_ATTEMPTS {
        let raw = llm::complete_with_retries(llm_client, &prompt, llm::MAX_ATTEMPTS)
            .await
            .map_err(GenerateError::Llm)?;

        let text = postprocess_tweet(&raw);
        let words = word_count(&text);
        if words >= MIN_WORDS {
            return Ok(GeneratedTweet {
                text,
                prompt,
                model: AI_MODEL_NAME,
                niche: niche.to_string(),
                subcategory: subcategory.to_string(),
                guidance: guidance.map(|g| g.to_string()),
            });
        }

        last_words = words;
        eprintln!(
            "[generate] Attempt {}/{}: tweet too short ({} words), regenerating",
            attempt, QUALITY_MAX_ATTEMPTS, words
        );
        if attempt < QUALITY_MAX_ATTEMPTS {
            tokio::time::sleep(QUALITY_RETRY_PAUSE).await;
        }
    }

    Err(GenerateError::TooShort { words: last_words })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn topic() -> Topic {
        Topic {
            niche: "Technology",
            subcategory: "Web Development",
        }
    }

    #[test]
    fn test_template_is_a_function_of_slot() {
        let t = topic();
        assert!(build_prompt(SlotType::Morning, &t).contains("POLL-STYLE"));
        assert!(build_prompt(SlotType::Afternoon, &t).contains("CURIOSITY-HOOK"));
        assert!(build_prompt(SlotType::Evening, &t).contains("EDUCATIONAL-TIP"));
        assert!(build_prompt(SlotType::Growth, &t).contains("short, engaging"));
    }

    #[test]
    fn test_manual_prompt_includes_guidance() {
        let prompt = build_manual_prompt("Technology", "DevOps", Some("mention GitOps"));
        assert!(prompt.contains("Guidance: mention GitOps."));
        assert!(build_manual_prompt("Technology", "DevOps", None).contains("2 relevant hashtags"));
    }

    #[test]
    fn test_postprocess_strips_wrapping_quotes() {
        assert_eq!(postprocess_tweet("\"Ship early.\""), "Ship early.");
        assert_eq!(postprocess_tweet("'Ship early.'"), "Ship early.");
    }

    #[test]
    fn test_postprocess_keeps_first_line_only() {
        let raw = "The actual tweet text here.\nSure! Here is why I wrote it this way...";
        assert_eq!(postprocess_tweet(raw), "The actual tweet text here.");
    }

    #[test]
    fn test_postprocess_trims_at_word_boundary() {
        let raw = "word ".repeat(100);
        let result = postprocess_tweet(&raw);
        assert!(result.chars().count() <= TWEET_MAX_CHARS);
        assert!(result.ends_with("..."));
        assert!(!result.contains("wor..."), "must not cut inside a word");
    }

    #[test]
    fn test_postprocess_short_text_unchanged() {
        assert_eq!(postprocess_tweet("Fine as is."), "Fine as is.");
    }

    #[test]
    fn test_count_last_24h_ignores_older_posts() {
        let now = Utc::now();
        let mut posts = Vec::new();
        for hours_ago in [1_i64, 5, 23, 25, 48] {
            let mut p = sample_post();
            p.created_at = now - Duration::hours(hours_ago);
            posts.push(p);
        }
        assert_eq!(count_last_24h(&posts, now), 3);
    }

    fn sample_post() -> Post {
        Post {
            id: 0,
            text: "t".to_string(),
            status: PostStatus::Pending,
            source: PostSource::Timeline,
            tweet_id: None,
            is_ai_generated: true,
            ai_model: None,
            niche: None,
            subcategory: None,
            ai_guidance: None,
            ai_prompt: None,
            slot_type: None,
            error_message: None,
            error_code: None,
            created_at: Utc::now(),
            posted_at: None,
        }
    }
}
