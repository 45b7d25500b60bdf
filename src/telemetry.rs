use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::collections::HashSet;

pub struct Metrics {
    predictions: IntCounterVec,
    prediction_errors: IntCounterVec,
    inference_duration: Histogram,
    registry: Registry,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let predictions = IntCounterVec::new(
            Opts::new("predictions_total", "Successful predictions by resin label"),
            &["label"],
        )?;

        let prediction_errors = IntCounterVec::new(
            Opts::new("prediction_errors_total", "Failed predictions by error kind"),
            &["kind"],
        )?;

        let boundaries = generate_boundaries((5, 25, 50, 250, 1000));
        let inference_duration = Histogram::with_opts(
            HistogramOpts::new(
                "inference_duration_ms",
                "Duration of model forward passes in milliseconds",
            )
            .buckets(boundaries),
        )?;

        registry.register(Box::new(predictions.clone()))?;
        registry.register(Box::new(prediction_errors.clone()))?;
        registry.register(Box::new(inference_duration.clone()))?;

        Ok(Metrics {
            predictions,
            prediction_errors,
            inference_duration,
            registry,
        })
    }

    pub fn record_prediction(&self, label: &str) {
        self.predictions.with_label_values(&[label]).inc();
    }

    pub fn record_error(&self, kind: &str) {
        self.prediction_errors.with_label_values(&[kind]).inc();
    }

    pub fn record_inference_duration(&self, duration_ms: u64) {
        self.inference_duration.observe(duration_ms as f64);
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;

        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn generate_boundaries(parts: (i32, i32, i32, i32, i32)) -> Vec<f64> {
    let first_step: usize = 5;
    let middle_step: usize = 5;
    let end_step: usize = 50;
    let tail_step: usize = 250;
    let first_part = (parts.0..=parts.1).step_by(first_step);
    let middle_part = (parts.1..=parts.2).step_by(middle_step);
    let end_part = (parts.2..=parts.3).step_by(end_step);
    let tail_part = (parts.3..=parts.4).step_by(tail_step);

    let mut seen = HashSet::new();
    first_part
        .chain(middle_part)
        .chain(end_part)
        .chain(tail_part)
        .filter(|&x| seen.insert(x))
        .map(|x| x as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_boundaries() {
        let parts = (5, 25, 50, 250, 1000);
        let get = generate_boundaries(parts);
        let expected = vec![
            5.0, 10.0, 15.0, 20.0, 25.0, 30.0, 35.0, 40.0, 45.0, 50.0, 100.0, 150.0, 200.0,
            250.0, 500.0, 750.0, 1000.0,
        ];

        assert_eq!(get, expected);
    }

    #[test]
    fn test_render_contains_recorded_metrics() {
        let metrics = Metrics::new().unwrap();
        metrics.record_prediction("PET");
        metrics.record_prediction("PET");
        metrics.record_error("invalid_image");
        metrics.record_inference_duration(12);

        let text = metrics.render().unwrap();

        assert!(text.contains("predictions_total{label=\"PET\"} 2"));
        assert!(text.contains("prediction_errors_total{kind=\"invalid_image\"} 1"));
        assert!(text.contains("inference_duration_ms_count 1"));
        assert!(!text.contains("route="));
    }
}
