use crate::{
    catalog::ResinCatalog, config::Config, inference_service::InferenceService,
    ort_service::load_classifier, server::HttpServer, telemetry::Metrics,
};
use std::sync::Arc;
use tokio::signal;

pub async fn start_app(config: Config) -> anyhow::Result<()> {
    let classifier = match load_classifier(&config.storage, &config.model).await {
        Ok(classifier) => classifier,
        Err(e) => {
            tracing::error!("Failed to load classifier: {:?}", e);
            return Err(e);
        }
    };

    let inference_service = InferenceService::new(classifier, ResinCatalog::new())?;
    let metrics = Arc::new(Metrics::new()?);

    let server = HttpServer::new(inference_service, metrics, &config.server).await?;

    server
        .run(async {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, starting graceful shutdown.");
        })
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
