use resin_prediction::{
    catalog::{ResinCatalog, ResinLabel},
    inference_service::InferenceService,
    ort_service::OrtClassifier,
};
use std::path::PathBuf;

fn env_path(name: &str) -> PathBuf {
    PathBuf::from(std::env::var(name).unwrap_or_else(|_| panic!("{} must be set", name)))
}

/// Needs the exported model and a photo of a PET bottle:
/// `RESIN_MODEL_FILE=model1.onnx RESIN_REFERENCE_IMAGE=pet.jpg cargo test -- --ignored`
#[tokio::test]
#[ignore]
async fn test_reference_pet_bottle() -> Result<(), Box<dyn std::error::Error>> {
    let model_bytes = std::fs::read(env_path("RESIN_MODEL_FILE"))?;
    let image_data = std::fs::read(env_path("RESIN_REFERENCE_IMAGE"))?;

    let classifier = OrtClassifier::from_memory(&model_bytes, 1)?;
    let service = InferenceService::new(classifier, ResinCatalog::new())?;

    let first = service.classify(image_data.clone()).await?;
    let second = service.classify(image_data).await?;

    assert_eq!(first.result.label, ResinLabel::Pet);
    assert_eq!(first.record.recycling_symbol, "1");
    assert!((0.0..=1.0).contains(&first.result.confidence));
    assert!(first.result.confidence_percent().ends_with('%'));

    assert_eq!(first.result, second.result);
    assert_eq!(first.record, second.record);

    Ok(())
}
