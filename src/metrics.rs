// Prometheus metrics for the Postgen service
//
// Exposed on the /metrics HTTP endpoint:
// - Rate limit decisions (counter, by preset and outcome)
// - Quota checks (counter, by plan and outcome)
// - Generations recorded (counter, by kind)
// - Generation provider latency (histogram)
// - Tracked rate limit entries (gauge)
// - Persistence failures (counter)

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::{Arc, Once};

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    pub static ref RATE_LIMIT_DECISIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rate_limit_decisions_total", "Rate limit decisions by preset and outcome"),
        &["preset", "outcome"]
    ).expect("Failed to create rate limit decisions metric");

    pub static ref RATE_LIMIT_ENTRIES: IntGauge = IntGauge::new(
        "rate_limit_entries",
        "Number of rate limit windows currently tracked"
    ).expect("Failed to create rate limit entries metric");

    pub static ref QUOTA_CHECKS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("quota_checks_total", "Quota checks by plan and outcome"),
        &["plan", "outcome"]
    ).expect("Failed to create quota checks metric");

    pub static ref GENERATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("generations_total", "Generations recorded by kind"),
        &["kind"]
    ).expect("Failed to create generations metric");

    pub static ref GENERATION_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("generation_duration_seconds", "Language-model call duration in seconds"),
    ).expect("Failed to create generation duration metric");

    pub static ref PERSISTENCE_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("persistence_errors_total", "Usage store failures by operation"),
        &["operation"]
    ).expect("Failed to create persistence errors metric");
}

static INIT: Once = Once::new();

/// Register all metrics with the registry
///
/// Safe to call more than once; registration happens on the first call.
pub fn init() -> prometheus::Result<()> {
    let mut result = Ok(());
    INIT.call_once(|| {
        result = register_all();
    });
    result
}

fn register_all() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(RATE_LIMIT_DECISIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RATE_LIMIT_ENTRIES.clone()))?;
    REGISTRY.register(Box::new(QUOTA_CHECKS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(GENERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(GENERATION_DURATION_SECONDS.clone()))?;
    REGISTRY.register(Box::new(PERSISTENCE_ERRORS_TOTAL.clone()))?;
    Ok(())
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        assert!(init().is_ok());
        assert!(init().is_ok());
    }

    #[test]
    fn test_gather_includes_counters() {
        init().unwrap();
        GENERATIONS_TOTAL.with_label_values(&["thread"]).inc();
        QUOTA_CHECKS_TOTAL.with_label_values(&["free", "allowed"]).inc();

        let text = gather_metrics().unwrap();
        assert!(text.contains("generations_total"));
        assert!(text.contains("quota_checks_total"));
    }
}
