use crate::{
    catalog::{CatalogError, ResinCatalog, ResinLabel, ResinRecord},
    model_service::{Classifier, ClassifierError},
    preprocess::{self, PreprocessError},
};
use std::{sync::Arc, time::Instant};
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("Invalid image: {0}")]
    InvalidImage(#[from] PreprocessError),
    #[error("Inference failed: {0}")]
    Inference(#[from] ClassifierError),
    #[error("Catalog lookup failed: {0}")]
    Catalog(#[from] CatalogError),
    #[error("Inference task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Top class of one prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceResult {
    pub label: ResinLabel,
    pub confidence: f32,
}

impl InferenceResult {
    /// Argmax over the model output; the first maximum wins on ties.
    pub fn from_probabilities(probabilities: &[f32]) -> Result<Self, ClassifierError> {
        if probabilities.len() != ResinLabel::ALL.len() {
            return Err(ClassifierError::InvalidOutput(format!(
                "expected {} probabilities, got {}",
                ResinLabel::ALL.len(),
                probabilities.len()
            )));
        }
        if let Some(bad) = probabilities.iter().find(|p| !p.is_finite()) {
            return Err(ClassifierError::InvalidOutput(format!(
                "non-finite probability {}",
                bad
            )));
        }

        let (index, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .fold((0, probabilities[0]), |best, (index, value)| {
                if value > best.1 {
                    (index, value)
                } else {
                    best
                }
            });

        let label = ResinLabel::from_index(index).ok_or_else(|| {
            ClassifierError::InvalidOutput(format!("class index {} has no label", index))
        })?;

        Ok(Self {
            label,
            confidence: confidence.clamp(0.0, 1.0),
        })
    }

    /// Confidence as a percentage with two decimals, e.g. `97.31%`.
    pub fn confidence_percent(&self) -> String {
        format!("{:.2}%", f64::from(self.confidence) * 100.0)
    }
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub result: InferenceResult,
    pub record: ResinRecord,
    pub inference_ms: u64,
}

/// Decode, preprocess, infer and look up the resin record for one upload.
pub struct InferenceService<C: Classifier> {
    classifier: Arc<C>,
    catalog: Arc<ResinCatalog>,
}

impl<C: Classifier> Clone for InferenceService<C> {
    fn clone(&self) -> Self {
        Self {
            classifier: self.classifier.clone(),
            catalog: self.catalog.clone(),
        }
    }
}

impl<C: Classifier> InferenceService<C> {
    pub fn new(classifier: C, catalog: ResinCatalog) -> Result<Self, CatalogError> {
        catalog.validate(&ResinLabel::ALL)?;
        Ok(Self {
            classifier: Arc::new(classifier),
            catalog: Arc::new(catalog),
        })
    }

    /// Decoding, resizing and the forward pass run on the blocking pool.
    #[instrument(skip(self, image_data), fields(bytes = image_data.len()))]
    pub async fn classify(&self, image_data: Vec<u8>) -> Result<Classification, ClassifyError> {
        let classifier = self.classifier.clone();

        let (probabilities, inference_ms) = tokio::task::spawn_blocking(
            move || -> Result<(Vec<f32>, u64), ClassifyError> {
                let image = preprocess::decode(&image_data)?;
                let input = preprocess::prepare(&image, classifier.input_size());

                let started = Instant::now();
                let probabilities = classifier.predict(input.view())?;
                Ok((probabilities, started.elapsed().as_millis() as u64))
            },
        )
        .await??;

        let result = InferenceResult::from_probabilities(&probabilities)?;
        let record = self.catalog.lookup(result.label)?.clone();

        tracing::debug!(
            "Prediction {} ({:.3}) in {} ms",
            result.label,
            result.confidence,
            inference_ms
        );

        Ok(Classification {
            result,
            record,
            inference_ms,
        })
    }
}
