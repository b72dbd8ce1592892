use crate::session::{Inference, OnnxModel};
use crate::utils::normalize_peak;
use eyre::{ensure, Result};
use ndarray::{Array2, ArrayView1};
use std::path::Path;
use tracing::{debug, warn};

/// Sliding-window length in samples fed to the segmentation model
/// (3.2 s at 16 kHz).
pub const WINDOW_SIZE: usize = 51_200;
/// Hop between consecutive windows (50% overlap).
pub const HOP_SIZE: usize = 25_600;

/// Change points closer together than this are collapsed into one.
const MIN_CHANGE_GAP_SECS: f32 = 1.0;
const PRE_EMPHASIS: f32 = 0.97;
/// Spacing of synthesized change points when detection comes up empty.
const SYNTHETIC_INTERVAL_SECS: f32 = 30.0;
/// No synthesized point is placed within this distance of the end.
const SYNTHETIC_TAIL_SECS: f32 = 10.0;

/// Change points detected over one waveform.
#[derive(Debug, Clone)]
pub struct ChangePoints {
    /// Timestamps in seconds, ascending, pairwise at least 1 s apart.
    pub points: Vec<f32>,
    /// True when the points were synthesized on a fixed 30 s grid because the
    /// model signal produced none. Callers can audit such results as
    /// heuristic rather than detected.
    pub synthetic: bool,
}

/// Detects speaker change points by sliding the segmentation model over the
/// waveform and extracting peaks from the concatenated per-frame change
/// probability signal.
pub struct ChangePointDetector {
    model: Box<dyn Inference>,
}

impl ChangePointDetector {
    pub fn new(model: Box<dyn Inference>) -> Self {
        Self { model }
    }

    pub fn from_file<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        Ok(Self::new(Box::new(OnnxModel::from_file(model_path)?)))
    }

    /// Returns a deduplicated list of change-point timestamps.
    ///
    /// A single failed window is skipped and logged; the remaining windows
    /// still contribute to the global signal.
    pub fn detect(&mut self, audio: &[f32], threshold: f32, sample_rate: u32) -> ChangePoints {
        if audio.is_empty() {
            return ChangePoints {
                points: Vec::new(),
                synthetic: false,
            };
        }

        // Raw model probabilities are not calibrated against the requested
        // threshold, so detection starts from a much lower floor and the
        // final cut is made against the observed distribution below.
        let floor = f32::max(0.01, threshold * 0.1);

        let mut probabilities: Vec<f32> = Vec::new();
        let mut timestamps: Vec<f32> = Vec::new();
        let mut skipped = 0usize;

        let mut start = 0usize;
        loop {
            let end = (start + WINDOW_SIZE).min(audio.len());
            match self.process_window(&audio[start..end]) {
                Ok(probs) => {
                    let samples_per_frame = WINDOW_SIZE / probs.len().max(1);
                    for (frame, prob) in probs.into_iter().enumerate() {
                        let timestamp =
                            (start + frame * samples_per_frame) as f32 / sample_rate as f32;
                        timestamps.push(timestamp);
                        probabilities.push(prob);
                    }
                }
                Err(err) => {
                    warn!("window at sample {start} skipped: {err:#}");
                    skipped += 1;
                }
            }
            if start + WINDOW_SIZE >= audio.len() {
                break;
            }
            start += HOP_SIZE;
        }
        if skipped > 0 {
            warn!(skipped, "windows dropped from change-point signal");
        }

        let mut points = Vec::new();
        if !probabilities.is_empty() {
            let max = probabilities.iter().copied().fold(f32::MIN, f32::max);
            let mean = probabilities.iter().sum::<f32>() / probabilities.len() as f32;
            let adaptive = f32::max(floor, mean + 0.2 * (max - mean));
            debug!(max, mean, adaptive, "change probability statistics");

            for i in 1..probabilities.len().saturating_sub(1) {
                if probabilities[i] > adaptive
                    && probabilities[i] > probabilities[i - 1]
                    && probabilities[i] > probabilities[i + 1]
                {
                    points.push(timestamps[i]);
                }
            }
        }

        points.sort_by(|a, b| a.total_cmp(b));
        let mut points = dedupe_points(points);

        let mut synthetic = false;
        if points.is_empty() && audio.len() > (sample_rate * 10) as usize {
            let duration = audio.len() as f32 / sample_rate as f32;
            points = synthesize_points(duration);
            synthetic = !points.is_empty();
            if synthetic {
                warn!(
                    count = points.len(),
                    "no change points detected, synthesized at {SYNTHETIC_INTERVAL_SECS} s intervals"
                );
            }
        }

        debug!(count = points.len(), synthetic, "change points");
        ChangePoints { points, synthetic }
    }

    /// Runs the model over one window and interprets the per-frame class
    /// logits into change probabilities.
    fn process_window(&mut self, audio_window: &[f32]) -> Result<Vec<f32>> {
        let mut window = vec![0.0f32; WINDOW_SIZE];
        let copy_len = audio_window.len().min(WINDOW_SIZE);
        window[..copy_len].copy_from_slice(&audio_window[..copy_len]);

        normalize_peak(&mut window);
        pre_emphasize(&mut window);

        let (shape, data) = self.model.run(&[1, 1, WINDOW_SIZE as i64], window)?;
        ensure!(
            shape.len() >= 2,
            "segmentation output must be at least 2-D, got {shape:?}"
        );
        let num_classes = shape[shape.len() - 1] as usize;
        let time_steps = shape[shape.len() - 2] as usize;
        ensure!(
            num_classes >= 2 && time_steps >= 1 && time_steps * num_classes <= data.len(),
            "unexpected segmentation output shape {shape:?} for {} values",
            data.len()
        );

        let logits = Array2::from_shape_vec(
            (time_steps, num_classes),
            data[..time_steps * num_classes].to_vec(),
        )?;
        let log_classes = (num_classes as f32).ln();

        let mut change_probabilities = Vec::with_capacity(time_steps);
        let mut prev_dominant: Option<usize> = None;

        for row in logits.rows() {
            let (dominant, max_logit) = arg_max(row);
            let mut change_prob = 0.0f32;
            if let Some(prev) = prev_dominant {
                if prev != dominant {
                    // High entropy means the model is uncertain which class
                    // holds, which is where turnovers live; differing
                    // dominant classes double it.
                    let entropy = softmax_entropy(row, max_logit);
                    change_prob = f32::min(1.0, entropy / log_classes);
                    change_prob = f32::min(1.0, change_prob * 2.0);
                }
            }
            change_probabilities.push(change_prob);
            prev_dominant = Some(dominant);
        }

        Ok(change_probabilities)
    }
}

fn arg_max(row: ArrayView1<'_, f32>) -> (usize, f32) {
    let mut dominant = 0usize;
    let mut max_logit = row[0];
    for (class, &logit) in row.iter().enumerate().skip(1) {
        if logit > max_logit {
            max_logit = logit;
            dominant = class;
        }
    }
    (dominant, max_logit)
}

fn softmax_entropy(row: ArrayView1<'_, f32>, max_logit: f32) -> f32 {
    let sum_exp: f32 = row.iter().map(|&logit| (logit - max_logit).exp()).sum();
    let mut entropy = 0.0f32;
    for &logit in row.iter() {
        let prob = (logit - max_logit).exp() / sum_exp;
        if prob > 1e-6 {
            entropy -= prob * prob.ln();
        }
    }
    entropy
}

/// First-order pre-emphasis, applied right-to-left so each sample sees the
/// original value of its predecessor.
fn pre_emphasize(samples: &mut [f32]) {
    for i in (1..samples.len()).rev() {
        samples[i] -= PRE_EMPHASIS * samples[i - 1];
    }
}

/// Collapses sorted points closer than 1 s, keeping the first of each run.
fn dedupe_points(points: Vec<f32>) -> Vec<f32> {
    let mut deduped: Vec<f32> = Vec::with_capacity(points.len());
    for point in points {
        match deduped.last() {
            Some(&last) if point - last < MIN_CHANGE_GAP_SECS => {}
            _ => deduped.push(point),
        }
    }
    deduped
}

fn synthesize_points(duration: f32) -> Vec<f32> {
    let mut points = Vec::new();
    let mut t = SYNTHETIC_INTERVAL_SECS;
    while t < duration - SYNTHETIC_TAIL_SECS {
        points.push(t);
        t += SYNTHETIC_INTERVAL_SECS;
    }
    points
}
