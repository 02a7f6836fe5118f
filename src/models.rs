//! Shared data models used across modules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a post moving through the queue.
///
/// `Pending` is the initial state; `Posted` and `Failed` are terminal for a
/// given attempt. Failed posts are left in place for manual action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "post_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Pending,
    Posted,
    Failed,
}

/// Where a post came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "post_source", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PostSource {
    /// Manually authored and posted through the compose endpoint
    Compose,
    /// Auto-generated for the scheduled timeline
    Timeline,
    /// Fetched from platform search
    Search,
}

/// Daily schedule slot, which decides the prompt style used for generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "slot_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SlotType {
    Morning,
    Afternoon,
    Evening,
    Growth,
}

impl SlotType {
    /// Map a UTC hour to the slot whose style fits that time of day.
    ///
    /// Late-night hours fall back to the generic growth style.
    pub fn for_hour(hour: u32) -> Self {
        match hour {
            5..=12 => SlotType::Morning,
            13..=16 => SlotType::Afternoon,
            17..=22 => SlotType::Evening,
            _ => SlotType::Growth,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotType::Morning => "morning",
            SlotType::Afternoon => "afternoon",
            SlotType::Evening => "evening",
            SlotType::Growth => "growth",
        }
    }
}

/// Category of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Reminder,
    Info,
    Success,
    Error,
}

/// A post record as stored in the queue.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub text: String,
    pub status: PostStatus,
    pub source: PostSource,
    pub tweet_id: Option<String>,
    pub is_ai_generated: bool,
    pub ai_model: Option<String>,
    pub niche: Option<String>,
    pub subcategory: Option<String>,
    pub ai_guidance: Option<String>,
    pub ai_prompt: Option<String>,
    pub slot_type: Option<SlotType>,
    pub error_message: Option<String>,
    pub error_code: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub posted_at: Option<DateTime<Utc>>,
}

/// AI provenance recorded alongside a generated post.
#[derive(Debug, Clone, Default)]
pub struct AiMetadata {
    pub model: String,
    pub niche: Option<String>,
    pub subcategory: Option<String>,
    pub guidance: Option<String>,
    pub prompt: Option<String>,
    pub slot_type: Option<SlotType>,
}

/// Input for inserting a post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub text: String,
    pub status: PostStatus,
    pub source: PostSource,
    /// Platform id, only meaningful when inserting an already-posted record
    pub tweet_id: Option<String>,
    pub ai: Option<AiMetadata>,
}

/// A user-facing notification record.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Notification {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub kind: NotificationKind,
    pub data: Option<serde_json::Value>,
    pub read: bool,
    pub sent_at: DateTime<Utc>,
    pub clicked_at: Option<DateTime<Utc>>,
}

/// Result of a push broadcast over all registered endpoints.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DeliveryReport {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_for_hour_covers_publish_slots() {
        assert_eq!(SlotType::for_hour(14), SlotType::Afternoon);
        assert_eq!(SlotType::for_hour(18), SlotType::Evening);
        assert_eq!(SlotType::for_hour(22), SlotType::Evening);
    }

    #[test]
    fn test_slot_for_hour_late_night_is_growth() {
        for hour in [23, 0, 1, 2, 3, 4] {
            assert_eq!(SlotType::for_hour(hour), SlotType::Growth);
        }
        assert_eq!(SlotType::for_hour(5), SlotType::Morning);
    }
}
