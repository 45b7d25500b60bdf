mod health;
mod metrics;
mod predict;

use crate::{model_service::Classifier, server::SharedState};
use axum::{
    routing::{get, post},
    Router,
};

pub fn api_routes<C: Classifier>() -> Router<SharedState<C>> {
    Router::new()
        .route("/predict", post(predict::predict::<C>))
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler::<C>))
}
