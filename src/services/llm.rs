//! External text-completion client
//!
//! Thin JSON client over the free-tier completion API, plus the bounded
//! retry loop the generation workflow runs every call through. The service
//! is unreliable; timeouts, non-2xx responses and error-flagged payloads are
//! all treated as failed attempts.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_API_URL: &str = "https://apifreellm.com/api/chat";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// Transport attempts per completion call
pub const MAX_ATTEMPTS: usize = 3;

#[derive(Debug)]
pub enum LlmError {
    Http(reqwest::Error),
    Api { status: u16, detail: String },
    Empty,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        LlmError::Http(e)
    }
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmError::Http(e) => write!(f, "HTTP error: {}", e),
            LlmError::Api { status, detail } => {
                write!(f, "completion API error (status {}): {}", status, detail)
            }
            LlmError::Empty => write!(f, "completion API returned no text"),
        }
    }
}

impl std::error::Error for LlmError {}

/// The text-generation capability the pipeline depends on.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    message: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    response: Option<String>,
    error: Option<String>,
}

#[derive(Clone)]
pub struct LlmClient {
    api_url: String,
    http: Client,
}

impl LlmClient {
    pub fn new(api_url: &str) -> Self {
        Self {
            api_url: api_url.to_string(),
            http: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to build LLM HTTP client"),
        }
    }

    pub fn from_env() -> Self {
        let api_url =
            std::env::var("APIFREELLM_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Self::new(&api_url)
    }
}

#[async_trait]
impl TextCompletion for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let resp = self
            .http
            .post(&self.api_url)
            .header("Accept", "application/json")
            .json(&CompletionRequest { message: prompt })
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let detail: String = resp
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(200)
                .collect();
            return Err(LlmError::Api { status, detail });
        }

        let body: CompletionResponse = resp.json().await?;
        if let Some(error) = body.error {
            return Err(LlmError::Api {
                status: 200,
                detail: error,
            });
        }

        match body.response {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(LlmError::Empty),
        }
    }
}

/// Call the completion service with a bounded retry budget and fixed backoff.
///
/// Exhausting the budget returns the last error; the caller skips its cycle,
/// it never panics the slot.
pub async fn complete_with_retries(
    client: &impl TextCompletion,
    prompt: &str,
    max_attempts: usize,
) -> Result<String, LlmError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match client.complete(prompt).await {
            Ok(text) => return Ok(text),
            Err(e) => {
                eprintln!(
                    "[generate] Completion attempt {}/{} failed: {}",
                    attempt, max_attempts, e
                );
                if attempt >= max_attempts {
                    return Err(e);
                }
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays a fixed sequence of results, counting calls.
    struct ScriptedCompletion {
        script: Mutex<VecDeque<Result<String, LlmError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedCompletion {
        fn new(script: Vec<Result<String, LlmError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TextCompletion for ScriptedCompletion {
        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LlmError::Empty))
        }
    }

    fn transient() -> Result<String, LlmError> {
        Err(LlmError::Api {
            status: 503,
            detail: "unavailable".to_string(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt() {
        let client = ScriptedCompletion::new(vec![
            transient(),
            transient(),
            Ok("draft text".to_string()),
        ]);

        let result = complete_with_retries(&client, "p", MAX_ATTEMPTS).await;
        assert_eq!(result.unwrap(), "draft text");
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_budget_after_three_failures() {
        let client = ScriptedCompletion::new(vec![transient(), transient(), transient()]);

        let result = complete_with_retries(&client, "p", MAX_ATTEMPTS).await;
        assert!(result.is_err());
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_success_makes_one_call() {
        let client = ScriptedCompletion::new(vec![Ok("ok".to_string())]);

        let result = complete_with_retries(&client, "p", MAX_ATTEMPTS).await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }
}
