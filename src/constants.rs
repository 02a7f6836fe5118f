//! Application constants

/// Platform hard ceiling on post length, in characters
pub const TWEET_MAX_CHARS: usize = 280;

/// Rate-limit endpoint key for scheduled LLM generation (fixed-interval policy)
pub const LLM_ENDPOINT: &str = "llm-generate";

/// Rate-limit endpoint key for user-triggered generation (window policy)
pub const MANUAL_GENERATE_ENDPOINT: &str = "generate-tweet";

/// Model identifier recorded on AI-generated posts
pub const AI_MODEL_NAME: &str = "apifreellm-free";

/// Default page size for paginated list endpoints
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Maximum page size for paginated list endpoints
pub const MAX_PAGE_SIZE: i64 = 100;

/// How many recent posts feed the daily-cap and topic-balancing checks
pub const RECENT_WINDOW: i64 = 50;

/// Search scans at most this many recent posts
pub const SEARCH_WINDOW: i64 = 200;
