//! The embedding-provider capability and its retry envelope.

use cie_core::config::CieConfig;
use cie_core::error::{CieError, CieResult};
use std::sync::Arc;
use std::time::Duration;

/// Text-to-vector capability consumed by the pipeline. Providers
/// must produce vectors of a fixed dimensionality for every input text, or
/// an error for the whole batch.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts into fixed-dimension vectors, one per input,
    /// in input order.
    fn embed(&self, texts: &[String]) -> CieResult<Vec<Vec<f32>>>;

    /// Dimensionality of every vector this provider produces.
    fn dimensions(&self) -> usize;

    /// Human-readable provider name for logs and the CLI.
    fn name(&self) -> &'static str;

    /// How many attempts a transient failure is worth, and how long to back
    /// off between them.
    fn retry_envelope(&self) -> RetryEnvelope {
        RetryEnvelope::default()
    }
}

/// Per-provider retry policy for transient failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryEnvelope {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryEnvelope {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(200),
        }
    }
}

/// Run one batch through the provider, retrying per its envelope. Backoff is
/// linear in the attempt number.
pub fn embed_with_retry(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
) -> CieResult<Vec<Vec<f32>>> {
    let envelope = provider.retry_envelope();
    let mut attempt = 0;
    loop {
        attempt += 1;
        match provider.embed(texts) {
            Ok(vectors) => return Ok(vectors),
            Err(err) if attempt < envelope.max_attempts => {
                tracing::warn!(
                    attempt,
                    max_attempts = envelope.max_attempts,
                    error = %err,
                    "embedding batch failed, retrying"
                );
                std::thread::sleep(envelope.backoff * attempt);
            }
            Err(err) => return Err(err),
        }
    }
}

/// Provider that embeds nothing: every text maps to an empty vector, which
/// downstream stages treat as "no embedding" and skip when writing the
/// vector relation. Used for tests and for indexing without semantic search.
pub struct NoopProvider {
    dimensions: usize,
}

impl NoopProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl EmbeddingProvider for NoopProvider {
    fn embed(&self, texts: &[String]) -> CieResult<Vec<Vec<f32>>> {
        Ok(vec![Vec::new(); texts.len()])
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &'static str {
        "noop"
    }

    fn retry_envelope(&self) -> RetryEnvelope {
        RetryEnvelope {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }
}

/// Construct the provider named by the configuration.
pub fn provider_from_config(config: &CieConfig) -> CieResult<Arc<dyn EmbeddingProvider>> {
    match config.embedding_provider.as_str() {
        "local" => Ok(Arc::new(crate::local::LocalProvider::new(
            config.embedding_dimensions,
        )?)),
        "noop" => Ok(Arc::new(NoopProvider::new(config.embedding_dimensions))),
        other => Err(CieError::Embedding(format!(
            "unknown embedding provider: {other} (expected \"local\" or \"noop\")"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyProvider {
        failures_left: AtomicU32,
    }

    impl EmbeddingProvider for FlakyProvider {
        fn embed(&self, texts: &[String]) -> CieResult<Vec<Vec<f32>>> {
            if self.failures_left.fetch_sub(1, Ordering::SeqCst) > 0 {
                return Err(CieError::Embedding("transient".to_string()));
            }
            Ok(vec![vec![1.0]; texts.len()])
        }

        fn dimensions(&self) -> usize {
            1
        }

        fn name(&self) -> &'static str {
            "flaky"
        }

        fn retry_envelope(&self) -> RetryEnvelope {
            RetryEnvelope {
                max_attempts: 3,
                backoff: Duration::ZERO,
            }
        }
    }

    #[test]
    fn retry_recovers_from_transient_failures_within_envelope() {
        let provider = FlakyProvider { failures_left: AtomicU32::new(2) };
        let out = embed_with_retry(&provider, &["a".to_string()]).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn retry_gives_up_when_envelope_is_exhausted() {
        let provider = FlakyProvider { failures_left: AtomicU32::new(10) };
        assert!(embed_with_retry(&provider, &["a".to_string()]).is_err());
    }

    #[test]
    fn noop_provider_yields_empty_vectors() {
        let provider = NoopProvider::new(768);
        let out = provider.embed(&["x".to_string(), "y".to_string()]).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(Vec::is_empty));
    }

    #[test]
    fn unknown_provider_name_is_rejected() {
        let config = CieConfig {
            embedding_provider: "cloud9".to_string(),
            ..CieConfig::default()
        };
        assert!(provider_from_config(&config).is_err());
    }
}
