// Prometheus metrics for the API
use codegrade_engine::Phase;
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, IntCounterVec, IntGauge, Registry,
    TextEncoder,
};
use std::time::Duration;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref JOBS_TOTAL: IntCounterVec = register_int_counter_vec_with_registry!(
        "codegrade_jobs_total",
        "Jobs processed, by terminal phase",
        &["phase"],
        REGISTRY
    )
    .expect("metric can be registered");
    pub static ref JOB_DURATION: Histogram = register_histogram_with_registry!(
        "codegrade_job_duration_seconds",
        "Wall-clock time from request to result",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0],
        REGISTRY
    )
    .expect("metric can be registered");
    pub static ref JOBS_IN_FLIGHT: IntGauge = register_int_gauge_with_registry!(
        "codegrade_jobs_in_flight",
        "Jobs currently compiling or running",
        REGISTRY
    )
    .expect("metric can be registered");
}

pub fn record_job(phase: Phase, elapsed: Duration) {
    JOBS_TOTAL.with_label_values(&[phase.as_str()]).inc();
    JOB_DURATION.observe(elapsed.as_secs_f64());
}

/// Decrements the in-flight gauge when dropped, including on cancellation.
pub struct InFlight;

impl InFlight {
    pub fn start() -> Self {
        JOBS_IN_FLIGHT.inc();
        InFlight
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        JOBS_IN_FLIGHT.dec();
    }
}

/// Render every registered metric in the text exposition format.
pub fn render() -> anyhow::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_jobs_show_up() {
        record_job(Phase::CompileFailed, Duration::from_millis(20));
        let text = render().unwrap();
        assert!(text.contains("codegrade_jobs_total{phase=\"compile_failed\"}"));
        assert!(text.contains("codegrade_job_duration_seconds_bucket"));
    }
}
