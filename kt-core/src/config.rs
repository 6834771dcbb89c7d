//! Configuration for retrieval and request handling.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{KtError, Result};

/// Limits and deadlines for the answer pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoreConfig {
    /// Passages requested from vector search.
    pub vector_top_k: usize,
    /// Keyword-ranked passages kept by hybrid search.
    pub keyword_top_k: usize,
    /// Upper bound on sub-queries in decomposition mode.
    pub max_sub_queries: usize,
    /// Passages returned with an answer.
    pub max_answer_chunks: usize,
    /// Deadline for the external work of one request.
    pub request_timeout: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            vector_top_k: 40,
            keyword_top_k: 20,
            max_sub_queries: 3,
            max_answer_chunks: 10,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }
}

/// Builder for a validated [`CoreConfig`].
#[derive(Debug, Clone, Default)]
pub struct CoreConfigBuilder {
    config: CoreConfig,
}

impl CoreConfigBuilder {
    pub fn vector_top_k(mut self, k: usize) -> Self {
        self.config.vector_top_k = k;
        self
    }

    pub fn keyword_top_k(mut self, k: usize) -> Self {
        self.config.keyword_top_k = k;
        self
    }

    pub fn max_sub_queries(mut self, n: usize) -> Self {
        self.config.max_sub_queries = n;
        self
    }

    pub fn max_answer_chunks(mut self, n: usize) -> Self {
        self.config.max_answer_chunks = n;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Build the config.
    ///
    /// # Errors
    ///
    /// Returns [`KtError::Config`] if any limit or the timeout is zero.
    pub fn build(self) -> Result<CoreConfig> {
        let c = &self.config;
        let limits = [
            ("vector_top_k", c.vector_top_k),
            ("keyword_top_k", c.keyword_top_k),
            ("max_sub_queries", c.max_sub_queries),
            ("max_answer_chunks", c.max_answer_chunks),
        ];
        if let Some((name, _)) = limits.iter().find(|(_, value)| *value == 0) {
            return Err(KtError::Config(format!("{name} must be greater than zero")));
        }
        if c.request_timeout.is_zero() {
            return Err(KtError::Config("request_timeout must be greater than zero".to_string()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CoreConfig::builder().build().unwrap();
        assert_eq!(config.vector_top_k, 40);
        assert_eq!(config.keyword_top_k, 20);
        assert_eq!(config.max_sub_queries, 3);
        assert_eq!(config.max_answer_chunks, 10);
        assert_eq!(config.request_timeout, Duration::from_secs(60));
    }

    #[test]
    fn rejects_zero_values() {
        let err = CoreConfig::builder().keyword_top_k(0).build().unwrap_err();
        assert!(err.to_string().contains("keyword_top_k"));
        assert!(CoreConfig::builder().request_timeout(Duration::ZERO).build().is_err());
    }
}
