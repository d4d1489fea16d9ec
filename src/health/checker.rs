// src/health/checker.rs
use super::probe::{Probe, ProbeResult};
use super::status::{CheckerState, ServiceId};
use crate::config::{HealthCheckConfig, TargetsConfig};
use crate::metrics::MetricsCollector;
use crate::recommendation::{Evaluation, Transition};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Drives check cycles against the primary and backup services and owns the
/// shared `CheckerState`.
///
/// Cycles are serialized by `cycle_lock`: a forced check that arrives while
/// a periodic cycle is running waits for it and then runs its own cycle.
/// All of a cycle's writes land under a single write lock, so readers see
/// either the previous cycle or the complete new one.
pub struct HealthChecker {
    config: HealthCheckConfig,
    targets: TargetsConfig,
    probe: Arc<dyn Probe>,
    state: RwLock<CheckerState>,
    cycle_lock: Mutex<()>,
    metrics: Option<Arc<MetricsCollector>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

/// Summary of one completed check cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub check_count: u64,
    pub evaluation: Evaluation,
    pub results: Vec<(ServiceId, ProbeResult)>,
}

impl HealthChecker {
    pub fn new(
        config: HealthCheckConfig,
        targets: TargetsConfig,
        probe: Arc<dyn Probe>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        if let Some(metrics) = &metrics {
            metrics.update_recommendation(ServiceId::Primary);
        }

        Self {
            config,
            targets,
            probe,
            state: RwLock::new(CheckerState::new(Utc::now())),
            cycle_lock: Mutex::new(()),
            metrics,
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn config(&self) -> &HealthCheckConfig {
        &self.config
    }

    pub fn targets(&self) -> &TargetsConfig {
        &self.targets
    }

    /// Run a cycle immediately, then one per interval until `shutdown`.
    ///
    /// Ticks are laid on a fixed grid from the start time. A cycle that
    /// outlasts the interval makes the loop skip the missed ticks instead
    /// of bursting to catch up.
    pub async fn start(self: Arc<Self>) {
        let mut ticker = interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut shutdown_rx = self.shutdown_rx.clone();

        info!(
            primary = %self.targets.primary,
            backup = %self.targets.backup,
            "Starting health checker with interval: {:?}",
            self.config.interval()
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once().await;
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Health checker shutting down");
                        break;
                    }
                }
            }
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Probe both services concurrently, fold the results into the state
    /// and re-derive the recommendation. Returns once the cycle is complete.
    pub async fn run_once(&self) -> CycleReport {
        let _cycle = self.cycle_lock.lock().await;

        let check_number = self.state.read().await.check_count() + 1;
        info!("Health check #{} starting", check_number);

        // Each result is stamped when its own check finishes.
        let probes = ServiceId::ALL.into_iter().map(|service| {
            let url = self.targets.url(service);
            async move {
                let result = self.probe.probe(url).await;
                (service, result, Utc::now())
            }
        });
        let checked = futures::future::join_all(probes).await;

        let (evaluation, check_count, snapshot) = {
            let mut state = self.state.write().await;
            for (service, result, checked_at) in &checked {
                state.apply(*service, result, *checked_at);
            }
            let evaluation = state.finish_cycle();
            (evaluation, state.check_count(), state.clone())
        };
        let results: Vec<(ServiceId, ProbeResult)> = checked
            .into_iter()
            .map(|(service, result, _)| (service, result))
            .collect();

        for (service, result) in &results {
            let health = snapshot.service(*service);
            match &result.outcome {
                Ok(_) => debug!(
                    "{} is healthy ({}ms)",
                    service,
                    result.response_time.as_millis()
                ),
                Err(error) => warn!(
                    "{} is unhealthy: {} ({} consecutive failures)",
                    service, error, health.consecutive_failures
                ),
            }

            if let Some(metrics) = &self.metrics {
                metrics.record_probe(*service, result.is_healthy(), result.response_time);
                metrics.update_service_health(
                    *service,
                    health.is_healthy,
                    health.consecutive_failures,
                );
            }
        }

        self.report_transition(&evaluation);

        if let Some(metrics) = &self.metrics {
            metrics.record_cycle();
            metrics.update_recommendation(evaluation.recommendation);
        }

        CycleReport {
            check_count,
            evaluation,
            results,
        }
    }

    fn report_transition(&self, evaluation: &Evaluation) {
        match evaluation.transition {
            Transition::Failover => warn!("Recommending failover to BACKUP"),
            Transition::Failback => info!("Recommending failback to PRIMARY"),
            Transition::Degraded => warn!(
                "Both services are unhealthy, keeping recommendation {}",
                evaluation.recommendation
            ),
            Transition::Unchanged => {
                debug!("Recommendation unchanged: {}", evaluation.recommendation)
            }
        }

        if evaluation.changed() {
            if let Some(metrics) = &self.metrics {
                metrics.record_recommendation_change(evaluation.transition.as_str());
            }
        }
    }

    /// Consistent copy of the current state. Never triggers a probe.
    pub async fn snapshot(&self) -> CheckerState {
        self.state.read().await.clone()
    }

    /// Manual override, valid until the next completed cycle recomputes the
    /// recommendation. Returns the previous value.
    pub async fn set_recommendation(&self, recommendation: ServiceId) -> ServiceId {
        let previous = self
            .state
            .write()
            .await
            .override_recommendation(recommendation);

        info!(
            "Manual recommendation change: {} -> {}",
            previous, recommendation
        );

        if let Some(metrics) = &self.metrics {
            metrics.update_recommendation(recommendation);
            if previous != recommendation {
                metrics.record_recommendation_change("manual");
            }
        }

        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::testing::{check_config, targets, FakeProbe};
    use std::time::Duration;

    fn checker(probe: Arc<FakeProbe>, interval_ms: u64) -> Arc<HealthChecker> {
        Arc::new(HealthChecker::new(
            check_config(interval_ms),
            targets(),
            probe,
            None,
        ))
    }

    #[tokio::test]
    async fn cycle_probes_both_services_and_counts_once() {
        let probe = Arc::new(FakeProbe::new(true, false));
        let checker = checker(probe.clone(), 1000);

        let report = checker.run_once().await;

        assert_eq!(report.check_count, 1);
        assert_eq!(probe.calls(), 2);
        let state = checker.snapshot().await;
        assert_eq!(state.check_count(), 1);
        assert!(state.service(ServiceId::Primary).is_healthy);
        assert!(!state.service(ServiceId::Backup).is_healthy);
        assert_eq!(state.service(ServiceId::Backup).consecutive_failures, 1);
        assert_eq!(state.recommendation(), ServiceId::Primary);
    }

    #[tokio::test]
    async fn primary_failing_three_cycles_fails_over() {
        let probe = Arc::new(FakeProbe::new(true, true));
        let checker = checker(probe.clone(), 1000);
        checker.run_once().await;

        probe.set(ServiceId::Primary, false);
        let mut transitions = Vec::new();
        for _ in 0..3 {
            transitions.push(checker.run_once().await.evaluation.transition);
        }

        let state = checker.snapshot().await;
        assert_eq!(state.service(ServiceId::Primary).consecutive_failures, 3);
        assert_eq!(state.recommendation(), ServiceId::Backup);
        assert_eq!(
            transitions,
            vec![Transition::Failover, Transition::Unchanged, Transition::Unchanged]
        );
    }

    #[tokio::test]
    async fn recovering_primary_reclaims_recommendation() {
        let probe = Arc::new(FakeProbe::new(false, true));
        let checker = checker(probe.clone(), 1000);
        checker.run_once().await;
        assert_eq!(checker.snapshot().await.recommendation(), ServiceId::Backup);

        probe.set(ServiceId::Primary, true);
        let report = checker.run_once().await;

        assert_eq!(report.evaluation.transition, Transition::Failback);
        assert_eq!(checker.snapshot().await.recommendation(), ServiceId::Primary);
    }

    #[tokio::test]
    async fn both_down_keeps_recommendation_and_still_counts() {
        let probe = Arc::new(FakeProbe::new(false, true));
        let checker = checker(probe.clone(), 1000);
        checker.run_once().await;

        probe.set(ServiceId::Backup, false);
        let report = checker.run_once().await;

        assert_eq!(report.evaluation.transition, Transition::Degraded);
        let state = checker.snapshot().await;
        assert_eq!(state.recommendation(), ServiceId::Backup);
        assert_eq!(state.check_count(), 2);
    }

    #[tokio::test]
    async fn override_lasts_until_next_cycle() {
        let probe = Arc::new(FakeProbe::new(true, true));
        let checker = checker(probe, 1000);
        checker.run_once().await;

        let previous = checker.set_recommendation(ServiceId::Backup).await;
        assert_eq!(previous, ServiceId::Primary);
        assert_eq!(checker.snapshot().await.recommendation(), ServiceId::Backup);

        checker.run_once().await;
        assert_eq!(checker.snapshot().await.recommendation(), ServiceId::Primary);
    }

    #[tokio::test]
    async fn each_service_keeps_its_own_check_time() {
        let fake = Arc::new(FakeProbe::new(true, true));
        fake.slow_down(ServiceId::Backup, Duration::from_millis(200));
        let checker = checker(fake, 1000);

        let before = Utc::now();
        checker.run_once().await;

        let state = checker.snapshot().await;
        let primary_at = state.service(ServiceId::Primary).last_check.unwrap();
        let backup_at = state.service(ServiceId::Backup).last_check.unwrap();
        assert!(primary_at >= before);
        assert!(backup_at - primary_at >= chrono::Duration::milliseconds(150));
    }

    #[tokio::test(start_paused = true)]
    async fn probes_within_a_cycle_run_concurrently() {
        let probe = Arc::new(FakeProbe::new(true, true));
        probe.set_delay(Duration::from_millis(300));
        let checker = checker(probe.clone(), 1000);

        let started = tokio::time::Instant::now();
        checker.run_once().await;

        assert!(started.elapsed() < Duration::from_millis(600));
        assert_eq!(probe.max_in_flight(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_forced_checks_are_serialized() {
        let probe = Arc::new(FakeProbe::new(true, false));
        probe.set_delay(Duration::from_millis(300));
        let checker = checker(probe.clone(), 1000);

        let (first, second) = tokio::join!(checker.run_once(), checker.run_once());

        let mut counts = vec![first.check_count, second.check_count];
        counts.sort_unstable();
        assert_eq!(counts, vec![1, 2]);
        assert_eq!(probe.max_in_flight(), 2);
        assert_eq!(probe.calls(), 4);
        assert_eq!(
            checker
                .snapshot()
                .await
                .service(ServiceId::Backup)
                .consecutive_failures,
            2
        );
    }

    #[tokio::test(start_paused = true)]
    async fn loop_checks_immediately_then_every_interval() {
        let probe = Arc::new(FakeProbe::new(true, true));
        let checker = checker(probe, 1000);
        let handle = tokio::spawn(checker.clone().start());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(checker.snapshot().await.check_count(), 1);

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(checker.snapshot().await.check_count(), 3);

        checker.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn slow_cycles_never_overlap() {
        let probe = Arc::new(FakeProbe::new(true, true));
        probe.set_delay(Duration::from_millis(1500));
        let checker = checker(probe.clone(), 1000);
        let handle = tokio::spawn(checker.clone().start());

        // Cycles start at 0ms, 1500ms (late tick) and 3000ms.
        tokio::time::sleep(Duration::from_millis(3600)).await;
        assert_eq!(checker.snapshot().await.check_count(), 2);
        assert_eq!(probe.max_in_flight(), 2);

        checker.shutdown();
        handle.await.unwrap();
    }
}
