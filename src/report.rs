use crate::segment::Segment;
use serde::Serialize;
use std::collections::BTreeMap;

/// One segment as rendered to consumers: timing, identity and confidence,
/// with the transcript carried through when present.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentRecord {
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub speaker_id: usize,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeakerStats {
    pub speaker_id: usize,
    pub segment_count: usize,
    pub total_duration: f64,
    pub average_confidence: f32,
}

/// Full result document for JSON rendering.
#[derive(Debug, Clone, Serialize)]
pub struct DiarizationReport {
    pub segments: Vec<SegmentRecord>,
    pub speakers: Vec<SpeakerStats>,
    pub total_speakers: usize,
    pub total_duration: f64,
}

impl DiarizationReport {
    pub fn from_segments(segments: &[Segment]) -> Self {
        let records: Vec<SegmentRecord> = segments
            .iter()
            .map(|segment| SegmentRecord {
                start_time: segment.start,
                end_time: segment.end,
                duration: segment.duration(),
                speaker_id: segment.speaker.unwrap_or(0),
                confidence: segment.confidence,
                text: segment.text.clone(),
            })
            .collect();

        let mut by_speaker: BTreeMap<usize, (usize, f64, f32)> = BTreeMap::new();
        for record in &records {
            let entry = by_speaker.entry(record.speaker_id).or_insert((0, 0.0, 0.0));
            entry.0 += 1;
            entry.1 += record.duration;
            entry.2 += record.confidence;
        }

        let speakers: Vec<SpeakerStats> = by_speaker
            .into_iter()
            .map(|(speaker_id, (count, duration, confidence_sum))| SpeakerStats {
                speaker_id,
                segment_count: count,
                total_duration: duration,
                average_confidence: confidence_sum / count as f32,
            })
            .collect();

        let total_duration = records.last().map(|r| r.end_time).unwrap_or(0.0);
        DiarizationReport {
            total_speakers: speakers.len(),
            segments: records,
            speakers,
            total_duration,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(start: f64, end: f64, speaker: usize, confidence: f32) -> Segment {
        Segment {
            start,
            end,
            samples: Vec::new(),
            speaker: Some(speaker),
            confidence,
            text: None,
        }
    }

    #[test]
    fn stats_aggregate_per_speaker() {
        let segments = vec![
            segment(0.0, 10.0, 0, 0.9),
            segment(10.0, 15.0, 1, 0.6),
            segment(15.0, 30.0, 0, 0.7),
        ];
        let report = DiarizationReport::from_segments(&segments);

        assert_eq!(report.total_speakers, 2);
        assert_eq!(report.total_duration, 30.0);
        assert_eq!(report.segments.len(), 3);

        let speaker0 = &report.speakers[0];
        assert_eq!(speaker0.speaker_id, 0);
        assert_eq!(speaker0.segment_count, 2);
        assert!((speaker0.total_duration - 25.0).abs() < 1e-9);
        assert!((speaker0.average_confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn empty_run_renders_an_empty_report() {
        let report = DiarizationReport::from_segments(&[]);
        assert_eq!(report.total_speakers, 0);
        assert_eq!(report.total_duration, 0.0);
        assert!(report.segments.is_empty());
    }

    #[test]
    fn text_is_omitted_from_json_when_absent() {
        let report = DiarizationReport::from_segments(&[segment(0.0, 5.0, 0, 0.5)]);
        let json = report.to_json().unwrap();
        assert!(!json.contains("\"text\""));
        assert!(json.contains("\"speaker_id\": 0"));
    }
}
