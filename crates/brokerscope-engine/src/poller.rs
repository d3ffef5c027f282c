//! Per-broker metrics polling with exponential backoff
//!
//! Each tracked broker gets one poller on its own timer, fully decoupled
//! from correlation cycles. Failures back the timer off exponentially up
//! to a ceiling and, past a consecutive-failure threshold, flip the
//! snapshot's reachability; polling itself never stops until the broker
//! is untracked.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use brokerscope_api::BrokerKey;
use brokerscope_api::traits::BrokerStatusSource;
use brokerscope_common::FetchErrorKind;

use crate::store::SnapshotStore;

/// Poller tuning
#[derive(Clone, Debug)]
pub struct PollerConfig {
    /// Interval between polls while the endpoint answers (default: 10s)
    pub base_interval: Duration,
    /// Ceiling for the backoff delay (default: 120s)
    pub max_interval: Duration,
    /// Consecutive failures before reachability flips false (default: 3)
    pub failure_threshold: u32,
    /// Timeout for a single poll request (default: 5s)
    pub request_timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(10),
            max_interval: Duration::from_secs(120),
            failure_threshold: 3,
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Where the poller currently is in its cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PollState {
    Idle,
    Polling,
    BackingOff,
}

/// Observable poller state for one broker
#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollerStatus {
    pub state: PollState,
    pub consecutive_failures: u32,
    pub last_error: Option<FetchErrorKind>,
}

impl PollerStatus {
    fn new() -> Self {
        Self {
            state: PollState::Idle,
            consecutive_failures: 0,
            last_error: None,
        }
    }
}

/// Backoff delay after `failures` consecutive failures, with up to 10%
/// jitter so pollers for many brokers spread out
pub(crate) fn backoff_delay(config: &PollerConfig, failures: u32) -> Duration {
    let exp = config
        .base_interval
        .saturating_mul(2u32.saturating_pow(failures.min(16)));
    let capped = exp.min(config.max_interval);
    let jitter_ms = (capped.as_millis() as u64 / 10).max(1);
    capped + Duration::from_millis(rand::rng().random_range(0..jitter_ms))
}

/// Polls the management endpoint of one broker
pub struct MetricsPoller {
    key: BrokerKey,
    config: PollerConfig,
    source: Arc<dyn BrokerStatusSource>,
    store: Arc<SnapshotStore>,
    running: Arc<AtomicBool>,
    status: Arc<Mutex<PollerStatus>>,
}

impl MetricsPoller {
    pub fn new(
        key: BrokerKey,
        config: PollerConfig,
        source: Arc<dyn BrokerStatusSource>,
        store: Arc<SnapshotStore>,
    ) -> Self {
        Self {
            key,
            config,
            source,
            store,
            running: Arc::new(AtomicBool::new(false)),
            status: Arc::new(Mutex::new(PollerStatus::new())),
        }
    }

    /// Start the poll loop for this broker
    pub fn start(&self) {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        info!(broker = %self.key, "Starting metrics poller");

        let key = self.key.clone();
        let config = self.config.clone();
        let source = self.source.clone();
        let store = self.store.clone();
        let running = self.running.clone();
        let status = self.status.clone();

        tokio::spawn(async move {
            Self::poll_loop(key, config, source, store, running, status).await;
        });
    }

    /// Stop the poll loop; an in-flight poll completes but its result is
    /// discarded
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        info!(broker = %self.key, "Stopped metrics poller");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> PollerStatus {
        self.status.lock().clone()
    }

    async fn poll_loop(
        key: BrokerKey,
        config: PollerConfig,
        source: Arc<dyn BrokerStatusSource>,
        store: Arc<SnapshotStore>,
        running: Arc<AtomicBool>,
        status: Arc<Mutex<PollerStatus>>,
    ) {
        let mut failures = 0u32;

        while running.load(Ordering::SeqCst) {
            status.lock().state = PollState::Polling;

            let result =
                Self::poll_once(&key, &config, source.as_ref(), &store, &running, &mut failures)
                    .await;

            let delay = match result {
                Ok(()) => {
                    let mut s = status.lock();
                    s.state = PollState::Idle;
                    s.consecutive_failures = 0;
                    s.last_error = None;
                    config.base_interval
                }
                Err(error) => {
                    let mut s = status.lock();
                    s.state = PollState::BackingOff;
                    s.consecutive_failures = failures;
                    s.last_error = Some(error);
                    backoff_delay(&config, failures)
                }
            };

            tokio::time::sleep(delay).await;
        }
    }

    /// One poll cycle: request, parse, and patch the snapshot's metrics.
    ///
    /// Factored out of the loop so the threshold behavior is testable
    /// without timers.
    pub(crate) async fn poll_once(
        key: &BrokerKey,
        config: &PollerConfig,
        source: &dyn BrokerStatusSource,
        store: &SnapshotStore,
        running: &AtomicBool,
        failures: &mut u32,
    ) -> Result<(), FetchErrorKind> {
        let result = match timeout(config.request_timeout, source.fetch_status(key)).await {
            Ok(result) => result,
            Err(_) => Err(FetchErrorKind::Unavailable),
        };

        // Results for an untracked broker are discarded
        if !running.load(Ordering::SeqCst) {
            return result.map(|_| ());
        }

        let now = Utc::now();
        match result {
            Ok(response) => {
                *failures = 0;
                store.patch(key, |snapshot| {
                    snapshot.metrics.reachable = true;
                    snapshot.metrics.last_polled_at = Some(now);
                    snapshot.metrics.values.extend(response.numeric_values());
                });
                debug!(broker = %key, "Poll succeeded");
                Ok(())
            }
            Err(error) => {
                *failures += 1;
                let unreachable = *failures >= config.failure_threshold;
                store.patch(key, |snapshot| {
                    snapshot.metrics.last_polled_at = Some(now);
                    if unreachable {
                        snapshot.metrics.reachable = false;
                    }
                });
                if unreachable {
                    warn!(
                        broker = %key,
                        failures = *failures,
                        error = %error,
                        "Broker endpoint unreachable"
                    );
                } else {
                    debug!(broker = %key, failures = *failures, error = %error, "Poll failed");
                }
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use brokerscope_api::{BrokerStatusResponse, PostureSnapshot};
    use std::sync::atomic::AtomicUsize;

    fn key() -> BrokerKey {
        BrokerKey::new("messaging", "ex-aao")
    }

    /// Fails the first `failures_before_success` polls, then succeeds
    struct FlakySource {
        failures_before_success: usize,
        polls: AtomicUsize,
    }

    impl FlakySource {
        fn new(failures_before_success: usize) -> Self {
            Self {
                failures_before_success,
                polls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl BrokerStatusSource for FlakySource {
        async fn fetch_status(
            &self,
            _key: &BrokerKey,
        ) -> Result<BrokerStatusResponse, FetchErrorKind> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures_before_success {
                Err(FetchErrorKind::Unavailable)
            } else {
                Ok(serde_json::from_str::<BrokerStatusResponse>(r#"{"status": "successful"}"#)
                    .unwrap())
            }
        }
    }

    fn store_with_snapshot() -> Arc<SnapshotStore> {
        let store = Arc::new(SnapshotStore::new());
        store.upsert(&key(), |_| PostureSnapshot::new(key()));
        store
    }

    #[tokio::test]
    async fn test_threshold_flips_reachability_and_success_restores_it() {
        let store = store_with_snapshot();
        let source = FlakySource::new(3);
        let config = PollerConfig::default();
        let running = AtomicBool::new(true);
        let mut failures = 0u32;

        for expected in 1..=3u32 {
            let result = MetricsPoller::poll_once(
                &key(),
                &config,
                &source,
                &store,
                &running,
                &mut failures,
            )
            .await;
            assert!(result.is_err());
            assert_eq!(failures, expected);
        }
        let snapshot = store.get(&key()).unwrap();
        assert!(!snapshot.metrics.reachable);
        assert!(snapshot.metrics.last_polled_at.is_some());

        // One success resets the counter and restores reachability
        let result =
            MetricsPoller::poll_once(&key(), &config, &source, &store, &running, &mut failures)
                .await;
        assert!(result.is_ok());
        assert_eq!(failures, 0);
        assert!(store.get(&key()).unwrap().metrics.reachable);
    }

    #[tokio::test]
    async fn test_reachable_until_threshold() {
        let store = store_with_snapshot();
        let source = FlakySource::new(10);
        let config = PollerConfig::default();
        let running = AtomicBool::new(true);
        let mut failures = 0u32;

        for _ in 0..2 {
            let _ = MetricsPoller::poll_once(
                &key(),
                &config,
                &source,
                &store,
                &running,
                &mut failures,
            )
            .await;
        }
        assert!(store.get(&key()).unwrap().metrics.reachable);
    }

    #[tokio::test]
    async fn test_stopped_poller_discards_results() {
        let store = store_with_snapshot();
        let source = FlakySource::new(0);
        let config = PollerConfig::default();
        let running = AtomicBool::new(false);
        let mut failures = 0u32;

        let generation_before = store.get(&key()).unwrap().generation;
        let _ = MetricsPoller::poll_once(&key(), &config, &source, &store, &running, &mut failures)
            .await;
        assert_eq!(store.get(&key()).unwrap().generation, generation_before);
    }

    #[tokio::test]
    async fn test_success_merges_values_as_patch() {
        let store = store_with_snapshot();
        store.patch(&key(), |s| {
            s.metrics.values.insert("preexisting".to_string(), 7.0);
        });
        let source = FlakySource::new(0);
        let config = PollerConfig::default();
        let running = AtomicBool::new(true);
        let mut failures = 0u32;

        MetricsPoller::poll_once(&key(), &config, &source, &store, &running, &mut failures)
            .await
            .unwrap();
        let snapshot = store.get(&key()).unwrap();
        // Patch semantics: previously merged values survive
        assert_eq!(snapshot.metrics.values.get("preexisting"), Some(&7.0));
        assert_eq!(snapshot.metrics.values.get("security.enabled"), Some(&0.0));
    }

    #[test]
    fn test_backoff_delay_caps_at_max() {
        let config = PollerConfig {
            base_interval: Duration::from_secs(10),
            max_interval: Duration::from_secs(120),
            ..Default::default()
        };
        // 10s * 2^5 = 320s, capped at 120s plus at most 10% jitter
        let delay = backoff_delay(&config, 5);
        assert!(delay >= Duration::from_secs(120));
        assert!(delay <= Duration::from_secs(132));

        let small = backoff_delay(&config, 1);
        assert!(small >= Duration::from_secs(20));
        assert!(small < Duration::from_secs(23));
    }

    #[test]
    fn test_config_default() {
        let config = PollerConfig::default();
        assert_eq!(config.base_interval, Duration::from_secs(10));
        assert_eq!(config.max_interval, Duration::from_secs(120));
        assert_eq!(config.failure_threshold, 3);
    }

    #[tokio::test]
    async fn test_start_stop() {
        let store = store_with_snapshot();
        let poller = MetricsPoller::new(
            key(),
            PollerConfig {
                base_interval: Duration::from_millis(5),
                ..Default::default()
            },
            Arc::new(FlakySource::new(0)),
            store,
        );
        assert!(!poller.is_running());
        poller.start();
        assert!(poller.is_running());
        // Second start is a no-op
        poller.start();
        poller.stop();
        assert!(!poller.is_running());
    }
}
