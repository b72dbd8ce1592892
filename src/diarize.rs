use crate::detect::ChangePointDetector;
use crate::embedding::EmbeddingExtractor;
use crate::identify::SpeakerManager;
use crate::segment::{build_segments, Segment};
use crate::session::{Inference, OnnxModel};
use eyre::Result;
use std::path::Path;
use tracing::{info, warn};

const THRESHOLD_FLOOR: f32 = 0.01;
const THRESHOLD_CEIL: f32 = 0.7;
/// Speaker matching uses its own similarity floor, independent of how low
/// the detection threshold goes.
const ASSIGN_THRESHOLD_FLOOR: f32 = 0.3;

/// Pipeline configuration, snapshotted once per `process` call.
#[derive(Debug, Clone)]
pub struct DiarizeOptions {
    /// Detection/matching threshold; clamped to [0.01, 0.7] at entry.
    pub threshold: f32,
    /// Hard cap on discovered speakers.
    pub max_speakers: usize,
    pub sample_rate: u32,
}

impl Default for DiarizeOptions {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            max_speakers: 10,
            sample_rate: 16_000,
        }
    }
}

impl DiarizeOptions {
    /// The snapshot every stage actually sees. An out-of-range threshold is
    /// a warning, never an error.
    pub fn clamped(&self) -> Self {
        let mut snapshot = self.clone();
        if snapshot.threshold < THRESHOLD_FLOOR || snapshot.threshold > THRESHOLD_CEIL {
            let clamped = snapshot.threshold.clamp(THRESHOLD_FLOOR, THRESHOLD_CEIL);
            warn!(
                requested = snapshot.threshold,
                clamped, "threshold out of range"
            );
            snapshot.threshold = clamped;
        }
        snapshot
    }
}

/// Composes change-point detection, segment building, embedding and speaker
/// assignment into the full pipeline.
///
/// Phases run strictly in sequence; a single `Diarizer` reused across files
/// keeps a shared speaker identity space until `reset_speakers` is called.
pub struct Diarizer {
    detector: ChangePointDetector,
    extractor: EmbeddingExtractor,
    speakers: SpeakerManager,
}

impl Diarizer {
    /// Loads the segmentation and embedding models. Failure here is fatal;
    /// nothing is processed without both models.
    pub fn new<P: AsRef<Path>>(
        segmentation_model: P,
        embedding_model: P,
        sample_rate: u32,
    ) -> Result<Self> {
        let segmentation = Box::new(OnnxModel::from_file(segmentation_model)?);
        let embedding = Box::new(OnnxModel::from_file(embedding_model)?);
        Self::from_models(segmentation, embedding, sample_rate)
    }

    /// Builds the pipeline over already-loaded models. Tests substitute
    /// deterministic models through this seam.
    pub fn from_models(
        segmentation: Box<dyn Inference>,
        embedding: Box<dyn Inference>,
        sample_rate: u32,
    ) -> Result<Self> {
        Ok(Self {
            detector: ChangePointDetector::new(segmentation),
            extractor: EmbeddingExtractor::from_model(embedding, sample_rate)?,
            speakers: SpeakerManager::new(),
        })
    }

    /// Runs the full pipeline over one waveform and returns segments in
    /// timeline order with speakers assigned.
    pub fn process(&mut self, samples: &[f32], options: &DiarizeOptions) -> Result<Vec<Segment>> {
        let options = options.clamped();
        info!(
            samples = samples.len(),
            seconds = samples.len() as f32 / options.sample_rate as f32,
            "processing audio"
        );

        let change_points = self
            .detector
            .detect(samples, options.threshold, options.sample_rate);
        if change_points.synthetic {
            info!(
                count = change_points.points.len(),
                "falling back to synthesized change points"
            );
        }

        let mut segments = build_segments(samples, &change_points.points, options.sample_rate);
        info!(
            change_points = change_points.points.len(),
            segments = segments.len(),
            "built segments"
        );

        let assign_threshold = f32::max(ASSIGN_THRESHOLD_FLOOR, options.threshold);
        for (index, segment) in segments.iter_mut().enumerate() {
            if let Err(err) = self.assign_segment(segment, assign_threshold, options.max_speakers)
            {
                // One bad segment must not sink the run; it gets a
                // deterministic fallback identity instead.
                warn!(segment = index, "speaker assignment failed: {err:#}");
                segment.speaker = Some(index % options.max_speakers.max(1));
                segment.confidence = 0.5;
            }
        }

        info!(
            speakers = self.speakers.speaker_count(),
            "diarization complete"
        );
        Ok(segments)
    }

    fn assign_segment(
        &mut self,
        segment: &mut Segment,
        threshold: f32,
        max_speakers: usize,
    ) -> Result<()> {
        let embedding = self.extractor.compute(&segment.samples)?;
        let speaker = self.speakers.assign(&embedding, threshold, max_speakers);
        segment.speaker = Some(speaker);
        segment.confidence = self.speakers.confidence(&embedding, speaker);
        Ok(())
    }

    /// Discards all discovered speakers so the next run starts fresh.
    pub fn reset_speakers(&mut self) {
        self.speakers.reset();
    }

    pub fn speaker_count(&self) -> usize {
        self.speakers.speaker_count()
    }
}
