use crate::preprocess::TargetSize;
use ndarray::ArrayView4;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("ONNX runtime error: {0}")]
    Runtime(#[from] ort::Error),
    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),
    #[error("Invalid model output: {0}")]
    InvalidOutput(String),
    #[error("Session mutex poisoned: {0}")]
    Poisoned(String),
}

/// A loaded image classifier producing one probability per resin label.
///
/// Implementations are shared read-only across requests and must not carry
/// per-request state.
pub trait Classifier: Send + Sync + 'static {
    /// Spatial input size read from the loaded model.
    fn input_size(&self) -> TargetSize;

    /// Runs a forward pass on an NHWC batch of one image.
    fn predict(&self, input: ArrayView4<'_, f32>) -> Result<Vec<f32>, ClassifierError>;
}
