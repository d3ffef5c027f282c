//! Posture service: the per-broker correlation/polling pipeline
//!
//! One logical owner per broker key. Tracking a key starts its refresh
//! loop and metrics poller; untracking is the explicit removal signal
//! that stops both and drops the snapshot. In-flight work for an
//! untracked key completes, but its results are discarded before writing.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use brokerscope_api::registry;
use brokerscope_api::traits::{BrokerStatusSource, InstalledGroupResolver, ResourceFetcher};
use brokerscope_api::{BrokerKey, FetchOutcome, PostureSnapshot};
use brokerscope_common::CorrelationError;

use crate::correlate::{CorrelatedPosture, CorrelationConfig, correlate};
use crate::poller::{MetricsPoller, PollerConfig, PollerStatus};
use crate::store::SnapshotStore;

/// Posture service tuning
#[derive(Clone, Debug)]
pub struct PostureServiceConfig {
    /// Interval between correlation cycles (default: 30s)
    pub refresh_interval: Duration,
    pub correlation: CorrelationConfig,
    pub poller: PollerConfig,
}

impl Default for PostureServiceConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(30),
            correlation: CorrelationConfig::default(),
            poller: PollerConfig::default(),
        }
    }
}

struct TrackedBroker {
    running: Arc<AtomicBool>,
    poller: MetricsPoller,
}

/// Runs the fetch → correlate → store pipeline per tracked broker
pub struct PostureService {
    fetchers: Vec<Arc<dyn ResourceFetcher>>,
    resolver: Arc<dyn InstalledGroupResolver>,
    status_source: Arc<dyn BrokerStatusSource>,
    store: Arc<SnapshotStore>,
    config: PostureServiceConfig,
    tracked: DashMap<BrokerKey, TrackedBroker>,
}

/// Backoff for failed correlation cycles, capped at eight base intervals
fn cycle_backoff(base: Duration, failures: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(failures.min(3)))
}

impl PostureService {
    pub fn new(
        fetchers: Vec<Arc<dyn ResourceFetcher>>,
        resolver: Arc<dyn InstalledGroupResolver>,
        status_source: Arc<dyn BrokerStatusSource>,
        store: Arc<SnapshotStore>,
        config: PostureServiceConfig,
    ) -> Self {
        Self {
            fetchers,
            resolver,
            status_source,
            store,
            config,
            tracked: DashMap::new(),
        }
    }

    pub fn store(&self) -> Arc<SnapshotStore> {
        self.store.clone()
    }

    pub fn is_tracked(&self, key: &BrokerKey) -> bool {
        self.tracked.contains_key(key)
    }

    pub fn tracked_keys(&self) -> Vec<BrokerKey> {
        self.tracked.iter().map(|e| e.key().clone()).collect()
    }

    pub fn poller_status(&self, key: &BrokerKey) -> Option<PollerStatus> {
        self.tracked.get(key).map(|t| t.poller.status())
    }

    /// Start the per-key pipeline: refresh loop plus metrics poller.
    /// Tracking an already-tracked key is a no-op.
    pub fn track(self: &Arc<Self>, key: BrokerKey) {
        if self.tracked.contains_key(&key) {
            return;
        }

        let running = Arc::new(AtomicBool::new(true));
        let poller = MetricsPoller::new(
            key.clone(),
            self.config.poller.clone(),
            self.status_source.clone(),
            self.store.clone(),
        );
        poller.start();

        let service = self.clone();
        let loop_key = key.clone();
        let flag = running.clone();
        tokio::spawn(async move {
            service.refresh_loop(loop_key, flag).await;
        });

        self.tracked.insert(key.clone(), TrackedBroker { running, poller });
        info!(broker = %key, "Tracking broker");
    }

    /// The explicit removal signal: stop the pipeline and drop the
    /// snapshot. Subscribers observe their channel closing.
    pub fn untrack(&self, key: &BrokerKey) {
        if let Some((_, tracked)) = self.tracked.remove(key) {
            tracked.running.store(false, Ordering::SeqCst);
            tracked.poller.stop();
            self.store.remove(key);
            info!(broker = %key, "Untracked broker");
        }
    }

    pub fn stop_all(&self) {
        for key in self.tracked_keys() {
            self.untrack(&key);
        }
    }

    async fn refresh_loop(self: Arc<Self>, key: BrokerKey, running: Arc<AtomicBool>) {
        let mut failures = 0u32;

        while running.load(Ordering::SeqCst) {
            let delay = match self.refresh_guarded(&key, Some(&running)).await {
                Ok(snapshot) => {
                    failures = 0;
                    debug!(
                        broker = %key,
                        generation = snapshot.generation,
                        health = %snapshot.overall_health,
                        "Correlation cycle complete"
                    );
                    self.config.refresh_interval
                }
                Err(e) => {
                    failures += 1;
                    warn!(broker = %key, error = %e, "Correlation cycle failed");
                    cycle_backoff(self.config.refresh_interval, failures)
                }
            };
            tokio::time::sleep(delay).await;
        }
    }

    /// Run one correlation cycle and write the result.
    ///
    /// A manual cycle; loop-driven cycles go through the guarded variant
    /// so results for an untracked key are discarded.
    pub async fn refresh(&self, key: &BrokerKey) -> Result<PostureSnapshot, CorrelationError> {
        self.refresh_guarded(key, None).await
    }

    async fn refresh_guarded(
        &self,
        key: &BrokerKey,
        guard: Option<&AtomicBool>,
    ) -> Result<PostureSnapshot, CorrelationError> {
        // Gate optional fetchers on the groups actually installed; a
        // resolution failure skips them for this cycle only.
        let installed = match self.resolver.resolve_installed_groups().await {
            Ok(groups) => Some(groups),
            Err(e) => {
                warn!(error = %e, "Group resolution failed, skipping optional kinds this cycle");
                None
            }
        };

        let mut required = Vec::new();
        let mut optional = Vec::new();
        for fetcher in &self.fetchers {
            let descriptor = fetcher.descriptor();
            if registry::is_optional(&descriptor) {
                match &installed {
                    Some(groups) if groups.contains(descriptor.api_group) => {
                        optional.push(fetcher.clone());
                    }
                    _ => {
                        debug!(kind = descriptor.kind, "API group not installed, skipping");
                    }
                }
            } else {
                required.push(fetcher.clone());
            }
        }

        let spawn_fetch = |fetcher: Arc<dyn ResourceFetcher>| {
            let key = key.clone();
            tokio::spawn(async move { fetcher.fetch(&key).await })
        };
        let required_handles: Vec<_> = required.into_iter().map(spawn_fetch).collect();
        let optional_handles: Vec<_> = optional.into_iter().map(spawn_fetch).collect();

        let mut outcomes: Vec<FetchOutcome> = Vec::new();
        for handle in required_handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!(error = %e, "Fetch task failed"),
            }
        }

        // First write waits only for the required outcomes, so one slow
        // optional kind never delays the cycle.
        let posture = correlate(key, &outcomes, &self.config.correlation, Utc::now())?;
        let first = self.apply(key, &posture, guard);

        if optional_handles.is_empty() {
            return Ok(Self::written_or_detached(first, key, &posture));
        }

        for handle in optional_handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!(error = %e, "Fetch task failed"),
            }
        }

        // Supplementary pass folding the late optional outcomes in
        match correlate(key, &outcomes, &self.config.correlation, Utc::now()) {
            Ok(full) => {
                let second = self.apply(key, &full, guard);
                Ok(Self::written_or_detached(second.or(first), key, &full))
            }
            Err(e) => {
                warn!(broker = %key, error = %e, "Supplementary correlation failed");
                Ok(Self::written_or_detached(first, key, &posture))
            }
        }
    }

    /// Write the posture through the store unless the key was untracked
    /// while the cycle was in flight
    fn apply(
        &self,
        key: &BrokerKey,
        posture: &CorrelatedPosture,
        guard: Option<&AtomicBool>,
    ) -> Option<PostureSnapshot> {
        if let Some(flag) = guard
            && !flag.load(Ordering::SeqCst)
        {
            debug!(broker = %key, "Discarding cycle result for untracked broker");
            return None;
        }
        Some(self.store.upsert(key, |prev| {
            let mut snapshot = prev
                .cloned()
                .unwrap_or_else(|| PostureSnapshot::new(key.clone()));
            posture.apply_to(&mut snapshot);
            snapshot
        }))
    }

    fn written_or_detached(
        written: Option<PostureSnapshot>,
        key: &BrokerKey,
        posture: &CorrelatedPosture,
    ) -> PostureSnapshot {
        written.unwrap_or_else(|| {
            let mut snapshot = PostureSnapshot::new(key.clone());
            posture.apply_to(&mut snapshot);
            snapshot.refresh_health();
            snapshot
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use brokerscope_api::{BrokerStatusResponse, OverallHealth, RawResource, ResourceDescriptor};
    use brokerscope_common::FetchErrorKind;
    use serde_json::json;
    use std::collections::HashSet;

    fn key() -> BrokerKey {
        BrokerKey::new("messaging", "ex-aao")
    }

    struct StubFetcher {
        descriptor: ResourceDescriptor,
        items: Vec<RawResource>,
    }

    #[async_trait]
    impl ResourceFetcher for StubFetcher {
        fn descriptor(&self) -> ResourceDescriptor {
            self.descriptor
        }

        async fn fetch(&self, fetch_key: &BrokerKey) -> FetchOutcome {
            FetchOutcome::success(self.descriptor, fetch_key.clone(), self.items.clone())
        }
    }

    struct StubResolver {
        groups: HashSet<String>,
    }

    #[async_trait]
    impl InstalledGroupResolver for StubResolver {
        async fn resolve_installed_groups(&self) -> anyhow::Result<HashSet<String>> {
            Ok(self.groups.clone())
        }
    }

    struct StubStatusSource;

    #[async_trait]
    impl BrokerStatusSource for StubStatusSource {
        async fn fetch_status(
            &self,
            _key: &BrokerKey,
        ) -> Result<BrokerStatusResponse, FetchErrorKind> {
            Err(FetchErrorKind::Unavailable)
        }
    }

    fn broker_fetcher(present: bool) -> Arc<dyn ResourceFetcher> {
        let items = if present {
            vec![RawResource::new(
                registry::BROKER,
                "messaging",
                "ex-aao",
                vec![],
                json!({}),
            )]
        } else {
            vec![]
        };
        Arc::new(StubFetcher {
            descriptor: registry::BROKER,
            items,
        })
    }

    fn secret_fetcher() -> Arc<dyn ResourceFetcher> {
        Arc::new(StubFetcher {
            descriptor: registry::SECRET,
            items: vec![RawResource::new(
                registry::SECRET,
                "messaging",
                "ex-aao-cert-secret",
                vec![],
                json!({}),
            )],
        })
    }

    fn cert_fetcher() -> Arc<dyn ResourceFetcher> {
        let not_after = Utc::now() + chrono::Duration::days(400);
        Arc::new(StubFetcher {
            descriptor: registry::CERTIFICATE,
            items: vec![RawResource::new(
                registry::CERTIFICATE,
                "messaging",
                "ex-aao-cert",
                vec![],
                json!({
                    "spec": {"secretName": "ex-aao-cert-secret"},
                    "status": {"notAfter": not_after.to_rfc3339()},
                }),
            )],
        })
    }

    fn service(
        fetchers: Vec<Arc<dyn ResourceFetcher>>,
        installed: &[&str],
    ) -> Arc<PostureService> {
        Arc::new(PostureService::new(
            fetchers,
            Arc::new(StubResolver {
                groups: installed.iter().map(|s| s.to_string()).collect(),
            }),
            Arc::new(StubStatusSource),
            Arc::new(SnapshotStore::new()),
            PostureServiceConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_refresh_creates_snapshot_and_increments_generation() {
        let service = service(vec![broker_fetcher(true), secret_fetcher()], &[]);

        let first = service.refresh(&key()).await.unwrap();
        assert_eq!(first.generation, 1);
        assert_eq!(first.security.enabled, None);

        let second = service.refresh(&key()).await.unwrap();
        assert!(second.generation > first.generation);
    }

    #[tokio::test]
    async fn test_missing_broker_leaves_snapshot_untouched() {
        let present = service(vec![broker_fetcher(true), secret_fetcher()], &[]);
        let snapshot = present.refresh(&key()).await.unwrap();
        let generation = snapshot.generation;

        // Same store, but the broker disappears
        let absent = Arc::new(PostureService::new(
            vec![broker_fetcher(false), secret_fetcher()],
            Arc::new(StubResolver {
                groups: HashSet::new(),
            }),
            Arc::new(StubStatusSource),
            present.store(),
            PostureServiceConfig::default(),
        ));
        let err = absent.refresh(&key()).await.unwrap_err();
        assert!(matches!(err, CorrelationError::MissingBrokerInstance(_)));
        assert_eq!(absent.store().get(&key()).unwrap().generation, generation);
    }

    #[tokio::test]
    async fn test_optional_outcomes_trigger_supplementary_pass() {
        let service = service(
            vec![broker_fetcher(true), secret_fetcher(), cert_fetcher()],
            &["cert-manager.io"],
        );

        let snapshot = service.refresh(&key()).await.unwrap();
        // Two writes per cycle: required-only, then with optional outcomes
        assert_eq!(snapshot.generation, 2);
        assert_eq!(snapshot.security.enabled, Some(true));
        assert_eq!(snapshot.certificates.len(), 1);
    }

    #[tokio::test]
    async fn test_uninstalled_optional_group_is_skipped() {
        let service = service(
            vec![broker_fetcher(true), secret_fetcher(), cert_fetcher()],
            &[],
        );

        let snapshot = service.refresh(&key()).await.unwrap();
        // Single write: the certificate fetcher never ran
        assert_eq!(snapshot.generation, 1);
        assert_eq!(snapshot.security.enabled, None);
        assert_ne!(snapshot.overall_health, OverallHealth::Degraded);
    }

    #[tokio::test]
    async fn test_track_untrack_lifecycle() {
        let service = service(vec![broker_fetcher(true), secret_fetcher()], &[]);

        service.track(key());
        assert!(service.is_tracked(&key()));
        assert!(service.poller_status(&key()).is_some());
        // Tracking again is a no-op
        service.track(key());
        assert_eq!(service.tracked_keys().len(), 1);

        service.untrack(&key());
        assert!(!service.is_tracked(&key()));
        assert!(service.store().get(&key()).is_none());
    }

    #[test]
    fn test_cycle_backoff_caps() {
        let base = Duration::from_secs(30);
        assert_eq!(cycle_backoff(base, 1), Duration::from_secs(60));
        assert_eq!(cycle_backoff(base, 3), Duration::from_secs(240));
        assert_eq!(cycle_backoff(base, 10), Duration::from_secs(240));
    }
}
