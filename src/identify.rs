use crate::utils::l2_normalize;
use tracing::debug;

/// Running mean of the embeddings assigned to one speaker, renormalized to
/// unit length after every update.
#[derive(Debug, Clone)]
pub struct SpeakerCentroid {
    vector: Vec<f32>,
    count: usize,
}

impl SpeakerCentroid {
    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

/// Owns the set of discovered speakers for one diarization run.
///
/// Speaker ids are indices into the centroid list and grow monotonically.
/// Assignment is greedy nearest-centroid: O(segments x speakers) instead of
/// full pairwise clustering, at the cost of being order-sensitive.
#[derive(Debug, Default)]
pub struct SpeakerManager {
    centroids: Vec<SpeakerCentroid>,
}

impl SpeakerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns `embedding` to an existing speaker or creates a new one.
    ///
    /// Above `threshold` the best-matching centroid absorbs the embedding.
    /// Below it a new speaker is created while under `max_speakers`; at the
    /// cap the closest existing speaker wins regardless of similarity.
    pub fn assign(&mut self, embedding: &[f32], threshold: f32, max_speakers: usize) -> usize {
        let mut best_similarity = -1.0f32;
        let mut best_speaker: Option<usize> = None;

        for (id, centroid) in self.centroids.iter().enumerate() {
            let similarity = cosine_similarity(embedding, &centroid.vector);
            if similarity > best_similarity {
                best_similarity = similarity;
                best_speaker = Some(id);
            }
        }

        if let Some(id) = best_speaker {
            if best_similarity > threshold {
                self.update_centroid(id, embedding);
                return id;
            }
        }

        if self.centroids.len() < max_speakers {
            self.centroids.push(SpeakerCentroid {
                vector: embedding.to_vec(),
                count: 1,
            });
            let id = self.centroids.len() - 1;
            debug!(
                speaker = id,
                similarity = best_similarity,
                "created new speaker"
            );
            return id;
        }

        if let Some(id) = best_speaker {
            self.update_centroid(id, embedding);
            return id;
        }

        // No centroids and a zero cap; callers treat 0 as unassigned.
        0
    }

    /// Similarity of `embedding` to its speaker's centroid, rescaled from
    /// [-1, 1] to [0, 1]. Out-of-range ids get a neutral 0.5.
    pub fn confidence(&self, embedding: &[f32], speaker: usize) -> f32 {
        match self.centroids.get(speaker) {
            Some(centroid) => (cosine_similarity(embedding, &centroid.vector) + 1.0) / 2.0,
            None => 0.5,
        }
    }

    pub fn speaker_count(&self) -> usize {
        self.centroids.len()
    }

    pub fn centroids(&self) -> &[SpeakerCentroid] {
        &self.centroids
    }

    /// Clears all discovered speakers, for reuse across independent runs.
    pub fn reset(&mut self) {
        self.centroids.clear();
    }

    fn update_centroid(&mut self, speaker: usize, embedding: &[f32]) {
        let centroid = &mut self.centroids[speaker];
        let count = centroid.count as f32;
        for (value, observed) in centroid.vector.iter_mut().zip(embedding) {
            *value = (*value * count + observed) / (count + 1.0);
        }
        l2_normalize(&mut centroid.vector);
        centroid.count += 1;
    }
}

/// Dot product of two unit-length vectors, clamped to [-1, 1]. Mismatched or
/// empty operands score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot.clamp(-1.0, 1.0)
}
