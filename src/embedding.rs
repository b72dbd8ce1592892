use crate::session::{Inference, OnnxModel};
use crate::utils::{l2_normalize, normalize_peak};
use eyre::Result;
use std::path::Path;
use tracing::debug;

/// Audio fed to the embedding model per segment, in seconds.
const TARGET_SECS: f32 = 3.0;

/// Maps one audio segment to one unit-length speaker embedding.
pub struct EmbeddingExtractor {
    model: Box<dyn Inference>,
    target_length: usize,
    embedding_dim: usize,
}

impl EmbeddingExtractor {
    pub fn new<P: AsRef<Path>>(model_path: P, sample_rate: u32) -> Result<Self> {
        Self::from_model(Box::new(OnnxModel::from_file(model_path)?), sample_rate)
    }

    /// Wraps an already-loaded model. The embedding dimension is
    /// model-specific, so it is discovered here by probing the model once
    /// with a silent buffer and flattening the output.
    pub fn from_model(mut model: Box<dyn Inference>, sample_rate: u32) -> Result<Self> {
        let target_length = (TARGET_SECS * sample_rate as f32) as usize;
        let (_, probe) = model.run(&[1, target_length as i64], vec![0.0; target_length])?;
        let embedding_dim = probe.len();
        debug!(embedding_dim, target_length, "embedding model ready");
        Ok(Self {
            model,
            target_length,
            embedding_dim,
        })
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    /// Computes the L2-normalized embedding for a segment. Effectively
    /// silent segments produce an all-zero vector instead of dividing by a
    /// vanishing norm.
    pub fn compute(&mut self, samples: &[f32]) -> Result<Vec<f32>> {
        let prepared = self.prepare(samples);
        let (_, raw) = self
            .model
            .run(&[1, self.target_length as i64], prepared)?;

        let mut embedding = raw;
        embedding.truncate(self.embedding_dim);
        l2_normalize(&mut embedding);
        Ok(embedding)
    }

    /// Pads or truncates to the fixed model input length, then normalizes to
    /// unit peak.
    fn prepare(&self, samples: &[f32]) -> Vec<f32> {
        let mut prepared = vec![0.0f32; self.target_length];
        let copy_len = samples.len().min(self.target_length);
        prepared[..copy_len].copy_from_slice(&samples[..copy_len]);
        normalize_peak(&mut prepared);
        prepared
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Returns the first four prepared samples as the "embedding".
    struct HeadEcho;

    impl Inference for HeadEcho {
        fn run(&mut self, _shape: &[i64], data: Vec<f32>) -> Result<(Vec<i64>, Vec<f32>)> {
            Ok((vec![1, 4], data[..4].to_vec()))
        }
    }

    #[test]
    fn dimension_is_probed_at_load() {
        let extractor = EmbeddingExtractor::from_model(Box::new(HeadEcho), 16_000).unwrap();
        assert_eq!(extractor.embedding_dim(), 4);
    }

    #[test]
    fn embeddings_are_unit_length() {
        let mut extractor = EmbeddingExtractor::from_model(Box::new(HeadEcho), 16_000).unwrap();
        let embedding = extractor.compute(&[3.0, 4.0, 0.0, 0.0]).unwrap();
        let norm: f32 = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        // Peak normalization maps [3, 4] to [0.75, 1]; L2 to [0.6, 0.8].
        assert!((embedding[0] - 0.6).abs() < 1e-6);
        assert!((embedding[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn silent_segments_stay_zero() {
        let mut extractor = EmbeddingExtractor::from_model(Box::new(HeadEcho), 16_000).unwrap();
        let embedding = extractor.compute(&[0.0; 128]).unwrap();
        assert_eq!(embedding, vec![0.0; 4]);
    }

    #[test]
    fn compute_is_bit_reproducible() {
        let mut extractor = EmbeddingExtractor::from_model(Box::new(HeadEcho), 16_000).unwrap();
        let samples: Vec<f32> = (0..48_000).map(|i| ((i % 37) as f32 - 18.0) / 18.0).collect();
        let first = extractor.compute(&samples).unwrap();
        let second = extractor.compute(&samples).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn long_segments_are_truncated_to_target_length() {
        let mut extractor = EmbeddingExtractor::from_model(Box::new(HeadEcho), 16_000).unwrap();
        // 10 s of audio against a 3 s target; only the head is seen.
        let mut samples = vec![0.5f32; 160_000];
        samples[0] = 1.0;
        let embedding = extractor.compute(&samples).unwrap();
        assert_eq!(embedding.len(), 4);
    }
}
