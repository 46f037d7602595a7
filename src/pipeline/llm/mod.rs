pub mod azure;
pub mod generator;
#[cfg(test)]
pub mod mock;
pub mod validation;

pub use azure::*;
pub use generator::*;
#[cfg(test)]
pub use mock::*;
pub use validation::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("Model service unreachable at {0}")]
    Connection(String),

    #[error("Model call timed out after {0}s")]
    Timeout(u64),

    #[error("Model service returned error (status {status}): {body}")]
    Service { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed model service response: {0}")]
    ResponseParsing(String),

    #[error("Model returned no content")]
    EmptyResponse,

    #[error("Model output was blocked by the content filter")]
    ContentFiltered,
}

impl LlmError {
    /// Worth retrying on a later run without changing the input.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) | Self::EmptyResponse => true,
            Self::Service { status, .. } => *status == 429 || *status >= 500,
            Self::HttpClient(_) | Self::ResponseParsing(_) | Self::ContentFiltered => false,
        }
    }
}

/// One chat-completion call.
#[derive(Debug, Clone)]
pub struct ChatRequest<'a> {
    pub system: &'a str,
    pub user: &'a str,
    pub temperature: f32,
    pub json_response: bool,
}

/// A chat-completion model service. Implementations are blocking; async
/// callers run them on a blocking task.
pub trait LlmClient: Send + Sync {
    fn complete(&self, request: &ChatRequest<'_>) -> Result<String, LlmError>;

    /// Deployment or model name, for logging and letter metadata.
    fn deployment(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_classification() {
        assert!(LlmError::Timeout(120).is_retryable());
        assert!(LlmError::Service { status: 429, body: String::new() }.is_retryable());
        assert!(LlmError::Service { status: 503, body: String::new() }.is_retryable());
        assert!(!LlmError::Service { status: 400, body: String::new() }.is_retryable());
        assert!(!LlmError::ContentFiltered.is_retryable());
    }
}
