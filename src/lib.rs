//! Online speaker diarization: change-point detection, segment building and
//! greedy centroid clustering over two ONNX models (segmentation and
//! speaker embedding).

mod detect;
mod diarize;
mod embedding;
mod identify;
mod report;
mod segment;
mod session;
mod utils;
mod wav;

pub use detect::{ChangePointDetector, ChangePoints};
pub use diarize::{DiarizeOptions, Diarizer};
pub use embedding::EmbeddingExtractor;
pub use identify::{cosine_similarity, SpeakerCentroid, SpeakerManager};
pub use report::{DiarizationReport, SegmentRecord, SpeakerStats};
pub use segment::{build_segments, Segment};
pub use session::{create_session, Inference, OnnxModel};
pub use wav::{read_wav, resample};
