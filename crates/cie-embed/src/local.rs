//! Offline ONNX-based embeddings via fastembed (no network at query time).

use crate::provider::EmbeddingProvider;
use cie_core::error::{CieError, CieResult};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Mutex;

/// Local fastembed provider. The model is selected by the configured vector
/// dimensionality so the stored vectors always match the HNSW index schema.
pub struct LocalProvider {
    // fastembed batches internally; serializing calls through the mutex costs
    // nothing in practice and keeps the ONNX session single-entrant.
    model: Mutex<TextEmbedding>,
    dimensions: usize,
}

fn model_for_dimensions(dimensions: usize) -> CieResult<EmbeddingModel> {
    match dimensions {
        384 => Ok(EmbeddingModel::AllMiniLML6V2),
        768 => Ok(EmbeddingModel::NomicEmbedTextV15),
        other => Err(CieError::Embedding(format!(
            "no local embedding model for {other} dimensions (supported: 384, 768)"
        ))),
    }
}

impl LocalProvider {
    pub fn new(dimensions: usize) -> CieResult<Self> {
        let model_name = model_for_dimensions(dimensions)?;
        let model = TextEmbedding::try_new(
            InitOptions::new(model_name).with_show_download_progress(false),
        )
        .map_err(|e| CieError::Embedding(format!("failed to initialize fastembed model: {e}")))?;
        Ok(Self {
            model: Mutex::new(model),
            dimensions,
        })
    }
}

impl EmbeddingProvider for LocalProvider {
    fn embed(&self, texts: &[String]) -> CieResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let mut vectors = self
            .model
            .lock()
            .map_err(|_| CieError::Embedding("embedding model mutex poisoned".to_string()))?
            .embed(refs, None)
            .map_err(|e| CieError::Embedding(format!("fastembed inference failed: {e}")))?;

        if vectors.len() != texts.len() {
            return Err(CieError::Embedding(format!(
                "embedding count mismatch: expected {}, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        for v in &mut vectors {
            normalize_l2(v);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &'static str {
        "local (fastembed)"
    }
}

/// L2-normalize a vector in place.
pub fn normalize_l2(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity of two L2-normalized vectors (reduces to a dot product).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_l2_scales_to_unit_length() {
        let mut v = vec![3.0, 4.0];
        normalize_l2(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn normalize_l2_leaves_zero_vector_alone() {
        let mut v = vec![0.0, 0.0];
        normalize_l2(&mut v);
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[test]
    fn cosine_similarity_identical_is_one() {
        let a = vec![0.6, 0.8];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn unsupported_dimensionality_is_rejected_without_model_download() {
        assert!(model_for_dimensions(512).is_err());
        assert!(model_for_dimensions(384).is_ok());
    }
}
