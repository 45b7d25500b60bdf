use crate::{
    catalog::ResinLabel,
    config::{ModelConfig, StorageConfig},
    model_service::{Classifier, ClassifierError},
    preprocess::TargetSize,
    storage::GcsArtifactStore,
};
use ndarray::ArrayView4;
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

/// Pool of ONNX Runtime sessions over the same model.
///
/// `Session::run` needs exclusive access, so each session sits behind its own
/// mutex and requests are spread round-robin.
pub struct OrtClassifier {
    sessions: Vec<Mutex<Session>>,
    counter: AtomicUsize,
    input_size: TargetSize,
    output_name: String,
}

impl OrtClassifier {
    pub fn from_memory(model_bytes: &[u8], num_instances: usize) -> Result<Self, ClassifierError> {
        let sessions = (0..num_instances.max(1))
            .map(|_| {
                Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_memory(model_bytes)
            })
            .collect::<Result<Vec<_>, ort::Error>>()?;

        Self::from_sessions(sessions)
    }

    fn from_sessions(sessions: Vec<Session>) -> Result<Self, ClassifierError> {
        let first = sessions.first().ok_or_else(|| {
            ClassifierError::UnsupportedModel("no session was created".to_string())
        })?;

        let input = first
            .inputs
            .first()
            .ok_or_else(|| ClassifierError::UnsupportedModel("model has no inputs".to_string()))?;
        let input_dims = input.input_type.tensor_shape().ok_or_else(|| {
            ClassifierError::UnsupportedModel(format!("input {} is not a tensor", input.name))
        })?;
        let input_size = spatial_size(input_dims)?;

        let output = first
            .outputs
            .first()
            .ok_or_else(|| ClassifierError::UnsupportedModel("model has no outputs".to_string()))?;
        if let Some(output_dims) = output.output_type.tensor_shape() {
            check_class_count(output_dims)?;
        }
        let output_name = output.name.clone();

        tracing::info!(
            "Created {} ONNX sessions, input {}x{}, output {}",
            sessions.len(),
            input_size.width,
            input_size.height,
            output_name
        );

        Ok(Self {
            sessions: sessions.into_iter().map(Mutex::new).collect(),
            counter: AtomicUsize::new(0),
            input_size,
            output_name,
        })
    }
}

/// Reads `(width, height)` from an NHWC input shape `(batch, h, w, 3)`.
fn spatial_size(dims: &[i64]) -> Result<TargetSize, ClassifierError> {
    match dims {
        [_, height, width, 3] if *height > 0 && *width > 0 => {
            Ok(TargetSize::new(*width as u32, *height as u32))
        }
        other => Err(ClassifierError::UnsupportedModel(format!(
            "expected a fixed (batch, height, width, 3) input, got {:?}",
            other
        ))),
    }
}

/// A dynamic class dimension is accepted here and checked per prediction.
fn check_class_count(dims: &[i64]) -> Result<(), ClassifierError> {
    match dims.last() {
        Some(&classes) if classes > 0 && classes as usize != ResinLabel::ALL.len() => {
            Err(ClassifierError::UnsupportedModel(format!(
                "model emits {} classes, expected {}",
                classes,
                ResinLabel::ALL.len()
            )))
        }
        _ => Ok(()),
    }
}

impl Classifier for OrtClassifier {
    fn input_size(&self) -> TargetSize {
        self.input_size
    }

    fn predict(&self, input: ArrayView4<'_, f32>) -> Result<Vec<f32>, ClassifierError> {
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| ClassifierError::Poisoned(e.to_string()))?;

        tracing::debug!("Handling request with session {}", index);
        let owned_buffer;
        let input_view = if input.is_standard_layout() {
            input.view()
        } else {
            owned_buffer = input.as_standard_layout().into_owned();
            owned_buffer.view()
        };

        let tensor_ref = TensorRef::from_array_view(input_view)?;
        let outputs = session.run(ort::inputs![tensor_ref])?;

        let (_, data) = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;

        Ok(data.to_vec())
    }
}

/// Fetches the model artifact and builds the session pool.
///
/// A configured `model.local_path` takes precedence over object storage.
pub async fn load_classifier(
    storage: &StorageConfig,
    model: &ModelConfig,
) -> anyhow::Result<OrtClassifier> {
    let model_bytes = match &model.local_path {
        Some(path) => {
            tracing::info!("Loading model from {:?}", path);
            tokio::fs::read(path).await?
        }
        None => {
            GcsArtifactStore::new(storage)?
                .fetch(&storage.bucket_name, &model.object_path)
                .await?
        }
    };

    let num_instances = model.num_instances;
    let classifier = tokio::task::spawn_blocking(move || {
        OrtClassifier::from_memory(&model_bytes, num_instances)
    })
    .await??;

    Ok(classifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spatial_size_from_nhwc() {
        let size = spatial_size(&[-1, 224, 160, 3]).unwrap();
        assert_eq!(size, TargetSize::new(160, 224));
    }

    #[test]
    fn test_spatial_size_rejects_nchw() {
        assert!(spatial_size(&[1, 3, 224, 224]).is_err());
    }

    #[test]
    fn test_spatial_size_rejects_dynamic_dims() {
        assert!(spatial_size(&[-1, -1, -1, 3]).is_err());
        assert!(spatial_size(&[224, 224, 3]).is_err());
    }

    #[test]
    fn test_class_count() {
        assert!(check_class_count(&[-1, 6]).is_ok());
        assert!(check_class_count(&[-1, -1]).is_ok());
        assert!(check_class_count(&[1, 1000]).is_err());
    }

    #[test]
    fn test_from_memory_rejects_garbage() {
        let result = OrtClassifier::from_memory(b"not an onnx model", 1);
        assert!(result.is_err());
    }
}
