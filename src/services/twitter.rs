//! Social platform publish client
//!
//! Posts text to the platform's v2 tweets endpoint with a bearer token and
//! classifies failures so the publisher can record a distinguishing message
//! for each kind of rejection.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const TWEETS_URL: &str = "https://api.x.com/2/tweets";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub enum TwitterError {
    Http(reqwest::Error),
    /// Too many requests; the cycle must not retry
    RateLimited,
    /// Credentials rejected
    Auth,
    /// The platform refused a duplicate or near-duplicate post
    Duplicate,
    Api { status: u16, detail: String },
}

impl From<reqwest::Error> for TwitterError {
    fn from(e: reqwest::Error) -> Self {
        TwitterError::Http(e)
    }
}

impl std::fmt::Display for TwitterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TwitterError::Http(e) => write!(f, "HTTP error: {}", e),
            TwitterError::RateLimited => write!(f, "platform rate limit exceeded"),
            TwitterError::Auth => write!(f, "platform authentication failed"),
            TwitterError::Duplicate => write!(f, "platform rejected duplicate content"),
            TwitterError::Api { status, detail } => {
                write!(f, "platform API error (status {}): {}", status, detail)
            }
        }
    }
}

impl std::error::Error for TwitterError {}

#[derive(Debug, Clone)]
pub struct PublishedPost {
    pub id: String,
    pub text: String,
}

/// The publish capability the pipeline depends on.
#[async_trait]
pub trait SocialPublish: Send + Sync {
    async fn publish(&self, text: &str) -> Result<PublishedPost, TwitterError>;
}

#[derive(Debug, Deserialize)]
struct TweetResponseWrapper {
    data: TweetResponseData,
}

#[derive(Debug, Deserialize)]
struct TweetResponseData {
    id: String,
    text: String,
}

#[derive(Clone)]
pub struct TwitterClient {
    bearer_token: String,
    http: Client,
}

impl TwitterClient {
    pub fn new(bearer_token: &str) -> Self {
        Self {
            bearer_token: bearer_token.to_string(),
            http: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to build Twitter HTTP client"),
        }
    }

    pub fn from_env() -> Self {
        let token =
            std::env::var("TWITTER_BEARER_TOKEN").expect("TWITTER_BEARER_TOKEN must be set");
        Self::new(&token)
    }
}

#[async_trait]
impl SocialPublish for TwitterClient {
    async fn publish(&self, text: &str) -> Result<PublishedPost, TwitterError> {
        let resp = self
            .http
            .post(TWEETS_URL)
            .header("Authorization", format!("Bearer {}", self.bearer_token))
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_response(status.as_u16(), &body));
        }

        let wrapper: TweetResponseWrapper = resp.json().await?;
        Ok(PublishedPost {
            id: wrapper.data.id,
            text: wrapper.data.text,
        })
    }
}

/// Map a non-2xx platform response to a classified error.
///
/// Duplicate-content rejections come back as 403 with a detail string; they
/// must not be folded into the generic auth case.
pub fn classify_response(status: u16, body: &str) -> TwitterError {
    match status {
        429 => TwitterError::RateLimited,
        403 if body.to_lowercase().contains("duplicate") => TwitterError::Duplicate,
        401 | 403 => TwitterError::Auth,
        _ => TwitterError::Api {
            status,
            detail: body.chars().take(200).collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rate_limited() {
        assert!(matches!(
            classify_response(429, "Too Many Requests"),
            TwitterError::RateLimited
        ));
    }

    #[test]
    fn test_classify_duplicate_content() {
        let body = r#"{"detail":"You are not allowed to create a Tweet with duplicate content."}"#;
        assert!(matches!(
            classify_response(403, body),
            TwitterError::Duplicate
        ));
    }

    #[test]
    fn test_classify_auth_failures() {
        assert!(matches!(
            classify_response(401, "Unauthorized"),
            TwitterError::Auth
        ));
        assert!(matches!(
            classify_response(403, "Forbidden"),
            TwitterError::Auth
        ));
    }

    #[test]
    fn test_classify_generic_error_keeps_detail() {
        match classify_response(500, "Internal Server Error") {
            TwitterError::Api { status, detail } => {
                assert_eq!(status, 500);
                assert_eq!(detail, "Internal Server Error");
            }
            other => panic!("expected Api, got {:?}", other),
        }
    }
}
