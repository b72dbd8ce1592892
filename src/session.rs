use eyre::{Context, ContextCompat, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;

pub fn create_session(model_path: &Path) -> Result<Session> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(4)?
        .with_inter_threads(1)?
        .commit_from_file(model_path)
        .with_context(|| format!("failed to load model {}", model_path.display()))?;
    Ok(session)
}

/// A single-input, single-output model: one tensor in, one tensor out.
///
/// `ChangePointDetector` and `EmbeddingExtractor` depend on this seam rather
/// than on a concrete runtime type, so deterministic stand-ins can be swapped
/// in for tests.
pub trait Inference: Send {
    /// Run the model on one tensor, returning the output shape and its
    /// flattened data. Failure is a hard error; recovery policy belongs to
    /// the caller.
    fn run(&mut self, shape: &[i64], data: Vec<f32>) -> Result<(Vec<i64>, Vec<f32>)>;
}

/// ONNX model whose input/output tensor names are read from session metadata.
///
/// The segmentation and embedding models declare different tensor names, so
/// they are discovered at load time instead of being hard-coded.
pub struct OnnxModel {
    session: Session,
    input_name: String,
    output_name: String,
}

impl OnnxModel {
    pub fn from_file<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let session = create_session(model_path.as_ref())?;
        let input_name = session
            .inputs
            .first()
            .context("model declares no inputs")?
            .name
            .to_string();
        let output_name = session
            .outputs
            .first()
            .context("model declares no outputs")?
            .name
            .to_string();
        Ok(Self {
            session,
            input_name,
            output_name,
        })
    }
}

impl Inference for OnnxModel {
    fn run(&mut self, shape: &[i64], data: Vec<f32>) -> Result<(Vec<i64>, Vec<f32>)> {
        let tensor = ort::value::Tensor::from_array((shape.to_vec(), data))?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => tensor])?;
        let (out_shape, out_data) = outputs
            .get(self.output_name.as_str())
            .context("output tensor not found")?
            .try_extract_tensor::<f32>()
            .context("failed to extract output tensor")?;
        Ok((out_shape.as_ref().to_vec(), out_data.to_vec()))
    }
}
