//! Token counting for the prompt budget.
//!
//! The deployments use the `cl100k_base` encoding. The character-ratio
//! estimate only stands in when that encoding cannot be loaded.

use std::sync::{Arc, LazyLock};

use tiktoken_rs::CoreBPE;

/// Dutch clinical text tokenizes denser than English prose; 3 chars per
/// token keeps the estimate on the conservative side.
pub const CHARS_PER_TOKEN: usize = 3;

/// Context lengths of the model deployments in use.
const DEPLOYMENT_CONTEXT: &[(&str, usize)] = &[
    ("aiva-gpt", 16_384),
    ("aiva-gpt4", 120_000),
    ("aiva-gpt4-new", 120_000),
];

pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Exact count with the `cl100k_base` byte-pair encoding.
#[derive(Clone)]
pub struct Cl100kCounter {
    bpe: Arc<CoreBPE>,
}

static CL100K: LazyLock<Result<Arc<CoreBPE>, String>> =
    LazyLock::new(|| tiktoken_rs::cl100k_base().map(Arc::new).map_err(|e| e.to_string()));

impl Cl100kCounter {
    /// Shares one encoder per process; loading the ranks is not cheap.
    pub fn shared() -> Result<Self, String> {
        CL100K.clone().map(|bpe| Self { bpe })
    }
}

impl TokenCounter for Cl100kCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

/// The encoder the deployments use, or the character estimate when it
/// cannot be loaded.
pub fn default_counter() -> Arc<dyn TokenCounter> {
    match Cl100kCounter::shared() {
        Ok(counter) => Arc::new(counter),
        Err(e) => {
            tracing::warn!(error = %e, "cl100k_base unavailable, estimating tokens from characters");
            Arc::new(CharRatioCounter::default())
        }
    }
}

/// Character-ratio estimate, rounded up.
#[derive(Debug, Clone, Copy)]
pub struct CharRatioCounter {
    chars_per_token: usize,
}

impl CharRatioCounter {
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }
}

impl Default for CharRatioCounter {
    fn default() -> Self {
        Self::new(CHARS_PER_TOKEN)
    }
}

impl TokenCounter for CharRatioCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token)
    }
}

/// Known context length for a deployment name.
pub fn context_length_for_deployment(deployment: &str) -> Option<usize> {
    DEPLOYMENT_CONTEXT
        .iter()
        .find(|(name, _)| *name == deployment)
        .map(|(_, len)| *len)
}
