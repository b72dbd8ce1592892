use tracing::debug;

/// Candidates between change points shorter than this are dropped outright.
const MIN_SEGMENT_SECS: f64 = 2.0;
/// Fixed segment length used when no change points were found.
const FALLBACK_SEGMENT_SECS: f64 = 25.0;
/// Audio longer than this is chopped into fixed segments when no change
/// points were found; shorter audio becomes a single segment.
const FALLBACK_SPLIT_SECS: f64 = 30.0;
/// A trailing fallback segment shorter than this is dropped.
const FALLBACK_TAIL_SECS: f64 = 5.0;

/// One diarized stretch of audio.
///
/// Created by the segment builder with no speaker; the orchestrator fills in
/// `speaker` and `confidence`. Never resized after creation.
#[derive(Debug, Clone)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub samples: Vec<f32>,
    pub speaker: Option<usize>,
    pub confidence: f32,
    /// Transcript slot for downstream transcription integration.
    pub text: Option<String>,
}

impl Segment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Converts change points into bounded, non-overlapping segments.
///
/// With change points, boundaries are `[0, cp.., duration]` and candidates
/// shorter than 2 s are dropped, not merged. Without change points, audio
/// over 30 s is chopped into 25 s pieces (trailing piece dropped under 5 s)
/// and shorter audio becomes one whole-waveform segment. The asymmetric
/// constants are load-bearing: downstream speaker assignment needs segments
/// long enough for a stable embedding.
pub fn build_segments(audio: &[f32], change_points: &[f32], sample_rate: u32) -> Vec<Segment> {
    let total_duration = audio.len() as f64 / sample_rate as f64;

    if change_points.is_empty() {
        return fallback_segments(audio, total_duration, sample_rate);
    }

    let mut boundaries = Vec::with_capacity(change_points.len() + 2);
    boundaries.push(0.0f64);
    boundaries.extend(change_points.iter().map(|&cp| cp as f64));
    boundaries.push(total_duration);

    let mut segments = Vec::new();
    for pair in boundaries.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        if end - start < MIN_SEGMENT_SECS {
            continue;
        }
        if let Some(segment) = slice_segment(audio, start, end, sample_rate) {
            segments.push(segment);
        }
    }
    debug!(
        count = segments.len(),
        boundaries = boundaries.len(),
        "built segments from change points"
    );
    segments
}

fn fallback_segments(audio: &[f32], total_duration: f64, sample_rate: u32) -> Vec<Segment> {
    if total_duration > FALLBACK_SPLIT_SECS {
        let mut segments = Vec::new();
        let mut start = 0.0f64;
        while start < total_duration - FALLBACK_TAIL_SECS {
            let end = (start + FALLBACK_SEGMENT_SECS).min(total_duration);
            if let Some(segment) = slice_segment(audio, start, end, sample_rate) {
                segments.push(segment);
            }
            start += FALLBACK_SEGMENT_SECS;
        }
        debug!(count = segments.len(), "built fixed-duration segments");
        segments
    } else if audio.is_empty() {
        Vec::new()
    } else {
        vec![Segment {
            start: 0.0,
            end: total_duration,
            samples: audio.to_vec(),
            speaker: None,
            confidence: 0.0,
            text: None,
        }]
    }
}

fn slice_segment(audio: &[f32], start: f64, end: f64, sample_rate: u32) -> Option<Segment> {
    let start_sample = (start * sample_rate as f64) as usize;
    let end_sample = ((end * sample_rate as f64) as usize).min(audio.len());
    if start_sample >= end_sample {
        return None;
    }
    Some(Segment {
        start,
        end,
        samples: audio[start_sample..end_sample].to_vec(),
        speaker: None,
        confidence: 0.0,
        text: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16_000;

    fn audio(seconds: f64) -> Vec<f32> {
        vec![0.1f32; (seconds * RATE as f64) as usize]
    }

    #[test]
    fn change_points_split_into_adjacent_segments() {
        let segments = build_segments(&audio(10.0), &[5.0], RATE);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].start, 0.0);
        assert_eq!(segments[0].end, 5.0);
        assert_eq!(segments[1].start, 5.0);
        assert_eq!(segments[1].end, 10.0);
        assert_eq!(segments[0].samples.len(), 5 * RATE as usize);
    }

    #[test]
    fn short_candidates_are_dropped_not_merged() {
        let segments = build_segments(&audio(10.0), &[1.0], RATE);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start, 1.0);
        assert_eq!(segments[0].end, 10.0);
    }

    #[test]
    fn no_segment_ends_before_it_starts() {
        let segments = build_segments(&audio(120.0), &[2.5, 30.0, 30.4, 90.0], RATE);
        for segment in &segments {
            assert!(segment.end > segment.start);
            assert!(segment.duration() >= MIN_SEGMENT_SECS);
        }
    }

    #[test]
    fn sixty_one_seconds_without_change_points_gets_three_pieces() {
        let segments = build_segments(&audio(61.0), &[], RATE);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].end, 25.0);
        assert_eq!(segments[1].end, 50.0);
        assert!((segments[2].end - 61.0).abs() < 1e-9);
        assert!((segments[2].duration() - 11.0).abs() < 1e-9);
    }

    #[test]
    fn tiny_fallback_tail_is_dropped() {
        // 52 s: pieces at 0-25 and 25-50; the 2 s remainder is under the
        // 5 s floor.
        let segments = build_segments(&audio(52.0), &[], RATE);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].end, 50.0);
    }

    #[test]
    fn short_audio_without_change_points_is_one_segment() {
        let segments = build_segments(&audio(5.0), &[], RATE);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start, 0.0);
        assert!((segments[0].end - 5.0).abs() < 1e-9);
    }

    #[test]
    fn empty_audio_yields_no_segments() {
        let segments = build_segments(&[], &[], RATE);
        assert!(segments.is_empty());
    }
}
