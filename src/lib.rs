mod routes;
mod server;
mod storage;
mod telemetry;

pub mod app;
pub mod catalog;
pub mod config;
pub mod inference_service;
pub mod model_service;
pub mod ort_service;
pub mod preprocess;

pub use app::start_app;
