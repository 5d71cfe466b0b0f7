//! Embedding generation for semantic search over code entities.
//!
//! The core consumes a provider *capability*, `embed(batch) → vectors` with a
//! per-provider retry envelope, not a concrete backend. Two providers ship:
//! an offline ONNX-based one (fastembed) and a no-op one for environments
//! where semantic search is not wanted.

pub mod generator;
pub mod local;
pub mod provider;

pub use generator::{EmbedOutcome, EmbeddingGenerator};
pub use provider::{EmbeddingProvider, NoopProvider, RetryEnvelope, provider_from_config};
