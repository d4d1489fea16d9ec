// src/metrics/collector.rs
use crate::health::ServiceId;
use anyhow::{Context, Result};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    /// Render all registered metrics in the Prometheus text format.
    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("Failed to encode metrics")?;
        Ok(buffer)
    }
}

pub struct MetricsCollector {
    // Cycle metrics
    pub check_cycles_total: IntCounter,

    // Probe metrics
    pub probes_total: IntCounterVec,
    pub probe_duration_seconds: HistogramVec,

    // Service state
    pub service_health_status: IntGaugeVec,
    pub consecutive_failures: IntGaugeVec,

    // Recommendation
    pub recommendation: IntGauge,
    pub recommendation_changes_total: IntCounterVec,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let check_cycles_total =
            IntCounter::new("hc_check_cycles_total", "Completed health check cycles")?;
        registry.register(Box::new(check_cycles_total.clone()))?;

        let probes_total = IntCounterVec::new(
            Opts::new("hc_probes_total", "Health probes by service and outcome"),
            &["service", "outcome"],
        )?;
        registry.register(Box::new(probes_total.clone()))?;

        let probe_duration_seconds = HistogramVec::new(
            HistogramOpts::new("hc_probe_duration_seconds", "Health probe duration")
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["service"],
        )?;
        registry.register(Box::new(probe_duration_seconds.clone()))?;

        let service_health_status = IntGaugeVec::new(
            Opts::new(
                "hc_service_health_status",
                "Service health status (1=healthy, 0=unhealthy)",
            ),
            &["service"],
        )?;
        registry.register(Box::new(service_health_status.clone()))?;

        let consecutive_failures = IntGaugeVec::new(
            Opts::new(
                "hc_consecutive_failures",
                "Consecutive failed probes per service",
            ),
            &["service"],
        )?;
        registry.register(Box::new(consecutive_failures.clone()))?;

        let recommendation = IntGauge::new(
            "hc_recommendation",
            "Current recommendation (0=primary, 1=backup)",
        )?;
        registry.register(Box::new(recommendation.clone()))?;

        let recommendation_changes_total = IntCounterVec::new(
            Opts::new(
                "hc_recommendation_changes_total",
                "Recommendation changes by kind (failover, failback, manual)",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(recommendation_changes_total.clone()))?;

        Ok(Self {
            check_cycles_total,
            probes_total,
            probe_duration_seconds,
            service_health_status,
            consecutive_failures,
            recommendation,
            recommendation_changes_total,
        })
    }

    pub fn record_probe(&self, service: ServiceId, healthy: bool, duration: Duration) {
        let outcome = if healthy { "success" } else { "failure" };
        self.probes_total
            .with_label_values(&[service.as_str(), outcome])
            .inc();

        self.probe_duration_seconds
            .with_label_values(&[service.as_str()])
            .observe(duration.as_secs_f64());
    }

    pub fn update_service_health(&self, service: ServiceId, healthy: bool, failures: u32) {
        let value = if healthy { 1 } else { 0 };
        self.service_health_status
            .with_label_values(&[service.as_str()])
            .set(value);
        self.consecutive_failures
            .with_label_values(&[service.as_str()])
            .set(i64::from(failures));
    }

    pub fn record_cycle(&self) {
        self.check_cycles_total.inc();
    }

    pub fn update_recommendation(&self, recommendation: ServiceId) {
        let value = match recommendation {
            ServiceId::Primary => 0,
            ServiceId::Backup => 1,
        };
        self.recommendation.set(value);
    }

    pub fn record_recommendation_change(&self, kind: &str) {
        self.recommendation_changes_total
            .with_label_values(&[kind])
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gathers_recorded_values() {
        let registry = MetricsRegistry::new().unwrap();
        let metrics = registry.collector();

        metrics.record_cycle();
        metrics.record_probe(ServiceId::Primary, true, Duration::from_millis(30));
        metrics.record_probe(ServiceId::Backup, false, Duration::from_secs(5));
        metrics.update_service_health(ServiceId::Backup, false, 3);
        metrics.update_recommendation(ServiceId::Backup);
        metrics.record_recommendation_change("failover");

        let text = String::from_utf8(registry.gather().unwrap()).unwrap();
        assert!(text.contains("hc_check_cycles_total 1"));
        assert!(text.contains(r#"hc_probes_total{outcome="failure",service="backup"} 1"#));
        assert!(text.contains(r#"hc_consecutive_failures{service="backup"} 3"#));
        assert!(text.contains("hc_recommendation 1"));
        assert!(text.contains(r#"hc_recommendation_changes_total{kind="failover"} 1"#));
    }
}
