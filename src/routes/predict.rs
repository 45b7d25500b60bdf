use crate::{
    catalog::ResinRecord,
    inference_service::ClassifyError,
    model_service::{Classifier, ClassifierError},
    preprocess::PreprocessError,
    server::SharedState,
};
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

const FILE_FIELD: &str = "file";

#[derive(Error, Debug)]
pub enum PredictError {
    #[error("No file uploaded")]
    MissingFile,
    #[error("Upload could not be read: {0}")]
    Upload(#[from] MultipartError),
    #[error("Invalid image format: {0}")]
    InvalidImage(PreprocessError),
    #[error("Inference error: {0}")]
    Inference(ClassifierError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ClassifyError> for PredictError {
    fn from(err: ClassifyError) -> Self {
        match err {
            ClassifyError::InvalidImage(e) => PredictError::InvalidImage(e),
            ClassifyError::Inference(e) => PredictError::Inference(e),
            other => PredictError::Internal(other.to_string()),
        }
    }
}

impl PredictError {
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::MissingFile => "missing_file",
            PredictError::Upload(_) => "upload",
            PredictError::InvalidImage(_) => "invalid_image",
            PredictError::Inference(_) => "inference",
            PredictError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            PredictError::MissingFile | PredictError::InvalidImage(_) => StatusCode::BAD_REQUEST,
            PredictError::Upload(e) => e.status(),
            PredictError::Inference(_) | PredictError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message returned to the client; server-side detail stays in the logs.
    fn public_message(&self) -> &'static str {
        match self {
            PredictError::MissingFile => "No file uploaded",
            PredictError::InvalidImage(_) => "Invalid image format",
            PredictError::Upload(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                "File too large"
            }
            PredictError::Upload(_) => "Invalid upload",
            PredictError::Inference(_) | PredictError::Internal(_) => "Internal server error",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Error during prediction: {}", self);
        } else {
            tracing::warn!("Rejected prediction request: {}", self);
        }

        (
            status,
            Json(ErrorBody {
                error: self.public_message(),
            }),
        )
            .into_response()
    }
}

#[derive(Serialize, Debug)]
pub struct PredictResponse {
    pub predicted_class: &'static str,
    pub confidence: String,
    pub plastic_info: ResinRecord,
}

async fn read_file_field(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Vec<u8>, PredictError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!("Request is not a readable multipart form: {}", e);
        PredictError::MissingFile
    })?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FILE_FIELD) {
            let data = field.bytes().await?;
            return Ok(data.to_vec());
        }
    }

    Err(PredictError::MissingFile)
}

#[instrument(skip(state, multipart))]
pub async fn predict<C: Classifier>(
    State(state): State<SharedState<C>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>, PredictError> {
    let result = run_prediction(&state, multipart).await;
    if let Err(e) = &result {
        state.metrics.record_error(e.kind());
    }
    result
}

async fn run_prediction<C: Classifier>(
    state: &SharedState<C>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>, PredictError> {
    let image_data = read_file_field(multipart).await?;

    let classification = state.inference_service.classify(image_data).await?;
    let result = classification.result;
    let confidence = result.confidence_percent();

    state.metrics.record_prediction(result.label.as_str());
    state
        .metrics
        .record_inference_duration(classification.inference_ms);

    tracing::info!(
        "Successful prediction: {} with confidence {}",
        result.label,
        confidence
    );

    Ok(Json(PredictResponse {
        predicted_class: result.label.as_str(),
        confidence,
        plastic_info: classification.record,
    }))
}
