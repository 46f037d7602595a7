//! Shared state for the HTTP API layer.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::pipeline::{AdmissionProcessor, SqliteLetterStore};

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub config: Arc<AppConfig>,
    pub processor: Arc<AdmissionProcessor>,
    pub store: Arc<SqliteLetterStore>,
    /// SHA-256 of the configured API key. `None` disables the key check.
    api_key_hash: Option<[u8; 32]>,
}

impl ApiContext {
    pub fn new(config: Arc<AppConfig>, processor: Arc<AdmissionProcessor>, store: Arc<SqliteLetterStore>) -> Self {
        let api_key_hash = config.api_key.as_deref().map(hash_key);
        Self {
            config,
            processor,
            store,
            api_key_hash,
        }
    }

    pub fn api_key_hash(&self) -> Option<&[u8; 32]> {
        self.api_key_hash.as_ref()
    }
}

/// Hash an API key using SHA-256.
pub fn hash_key(key: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_and_distinct() {
        assert_eq!(hash_key("secret"), hash_key("secret"));
        assert_ne!(hash_key("secret"), hash_key("Secret"));
    }
}
