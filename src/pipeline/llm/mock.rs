use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{ChatRequest, LlmClient, LlmError};

/// Scripted model client for tests. Replies are consumed in
/// order; the last one repeats once the script runs out.
pub struct MockLlmClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    last: Mutex<Option<Result<String, LlmError>>>,
    calls: AtomicUsize,
    user_prompts: Mutex<Vec<String>>,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self::scripted(vec![Ok(response.to_string())])
    }

    pub fn failing(error: LlmError) -> Self {
        Self::scripted(vec![Err(error)])
    }

    pub fn scripted(replies: Vec<Result<String, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
            user_prompts: Mutex::new(Vec::new()),
        }
    }

    /// Number of `complete` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// User prompts received, in call order.
    pub fn user_prompts(&self) -> Vec<String> {
        self.user_prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }
}

impl LlmClient for MockLlmClient {
    fn complete(&self, request: &ChatRequest<'_>) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.user_prompts.lock() {
            prompts.push(request.user.to_string());
        }
        let mut replies = self.replies.lock().map_err(|_| LlmError::EmptyResponse)?;
        let mut last = self.last.lock().map_err(|_| LlmError::EmptyResponse)?;
        if let Some(next) = replies.pop_front() {
            *last = Some(next.clone());
            return next;
        }
        last.clone().unwrap_or(Err(LlmError::EmptyResponse))
    }

    fn deployment(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ChatRequest<'static> {
        ChatRequest {
            system: "s",
            user: "u",
            temperature: 0.2,
            json_response: true,
        }
    }

    #[test]
    fn mock_client_returns_configured_response() {
        let client = MockLlmClient::new("test response");
        assert_eq!(client.complete(&request()).unwrap(), "test response");
        assert_eq!(client.complete(&request()).unwrap(), "test response");
        assert_eq!(client.calls(), 2);
        assert_eq!(client.user_prompts(), vec!["u".to_string(), "u".to_string()]);
    }

    #[test]
    fn scripted_replies_in_order() {
        let client = MockLlmClient::scripted(vec![Err(LlmError::Timeout(5)), Ok("{}".into())]);
        assert_eq!(client.complete(&request()).unwrap_err(), LlmError::Timeout(5));
        assert_eq!(client.complete(&request()).unwrap(), "{}");
        assert_eq!(client.complete(&request()).unwrap(), "{}");
    }
}
