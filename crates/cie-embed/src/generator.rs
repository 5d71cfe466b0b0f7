//! Parallel text→vector generation over a provider.
//!
//! Batches are distributed across a bounded worker pool; each batch goes
//! through the provider's retry envelope. A failed batch is counted, not
//! fatal: its texts keep an empty vector and the entities are still stored.

use crate::provider::{EmbeddingProvider, embed_with_retry};
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Texts per provider call. The providers batch internally too; this bound
/// keeps a single failed call from voiding more than one chunk of work.
const TEXTS_PER_BATCH: usize = 32;

pub struct EmbedOutcome {
    /// One vector per input text, in input order. Empty where the provider
    /// failed or declined.
    pub vectors: Vec<Vec<f32>>,
    /// Number of texts whose batch exhausted the retry envelope.
    pub errors: u64,
}

pub struct EmbeddingGenerator {
    provider: Arc<dyn EmbeddingProvider>,
    workers: usize,
}

impl EmbeddingGenerator {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, workers: usize) -> Self {
        Self {
            provider,
            workers: workers.max(1),
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Embed every text, firing `progress(completed_so_far)` per item.
    pub fn embed_texts(
        &self,
        texts: &[String],
        progress: &(dyn Fn(u64) + Sync),
    ) -> EmbedOutcome {
        if texts.is_empty() {
            return EmbedOutcome { vectors: Vec::new(), errors: 0 };
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .expect("thread pool construction cannot fail with a valid thread count");

        let completed = AtomicU64::new(0);
        let errors = AtomicU64::new(0);

        let batches: Vec<&[String]> = texts.chunks(TEXTS_PER_BATCH).collect();
        let per_batch: Vec<Vec<Vec<f32>>> = pool.install(|| {
            batches
                .par_iter()
                .map(|batch| {
                    let vectors = match embed_with_retry(self.provider.as_ref(), batch) {
                        Ok(vectors) => vectors,
                        Err(err) => {
                            tracing::warn!(
                                batch_len = batch.len(),
                                error = %err,
                                "embedding batch exhausted its retry envelope"
                            );
                            errors.fetch_add(batch.len() as u64, Ordering::Relaxed);
                            vec![Vec::new(); batch.len()]
                        }
                    };
                    for _ in 0..batch.len() {
                        let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                        progress(done);
                    }
                    vectors
                })
                .collect()
        });

        EmbedOutcome {
            vectors: per_batch.into_iter().flatten().collect(),
            errors: errors.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{NoopProvider, RetryEnvelope};
    use cie_core::error::{CieError, CieResult};
    use std::sync::Mutex;

    #[test]
    fn output_order_matches_input_order_across_batches() {
        struct EchoLen;
        impl EmbeddingProvider for EchoLen {
            fn embed(&self, texts: &[String]) -> CieResult<Vec<Vec<f32>>> {
                Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
            }
            fn dimensions(&self) -> usize {
                1
            }
            fn name(&self) -> &'static str {
                "echo"
            }
        }

        let texts: Vec<String> = (0..100).map(|i| "x".repeat(i + 1)).collect();
        let generator = EmbeddingGenerator::new(Arc::new(EchoLen), 4);
        let out = generator.embed_texts(&texts, &|_| {});
        assert_eq!(out.errors, 0);
        for (i, v) in out.vectors.iter().enumerate() {
            assert_eq!(v[0] as usize, i + 1);
        }
    }

    #[test]
    fn failed_batches_are_counted_and_yield_empty_vectors() {
        struct AlwaysFails;
        impl EmbeddingProvider for AlwaysFails {
            fn embed(&self, _texts: &[String]) -> CieResult<Vec<Vec<f32>>> {
                Err(CieError::Embedding("down".to_string()))
            }
            fn dimensions(&self) -> usize {
                1
            }
            fn name(&self) -> &'static str {
                "down"
            }
            fn retry_envelope(&self) -> RetryEnvelope {
                RetryEnvelope { max_attempts: 1, backoff: std::time::Duration::ZERO }
            }
        }

        let texts: Vec<String> = (0..5).map(|i| format!("t{i}")).collect();
        let generator = EmbeddingGenerator::new(Arc::new(AlwaysFails), 2);
        let out = generator.embed_texts(&texts, &|_| {});
        assert_eq!(out.errors, 5);
        assert_eq!(out.vectors.len(), 5);
        assert!(out.vectors.iter().all(Vec::is_empty));
    }

    #[test]
    fn progress_fires_once_per_item() {
        let texts: Vec<String> = (0..40).map(|i| format!("t{i}")).collect();
        let generator = EmbeddingGenerator::new(Arc::new(NoopProvider::new(4)), 4);
        let ticks = Mutex::new(0u64);
        let out = generator.embed_texts(&texts, &|_| {
            *ticks.lock().unwrap() += 1;
        });
        assert_eq!(out.vectors.len(), 40);
        assert_eq!(*ticks.lock().unwrap(), 40);
    }
}
