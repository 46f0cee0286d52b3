//! Per-provider health cache with outcome-dependent lifetimes
//!
//! The cached entry is read and replaced as a whole. Two callers that both
//! find it stale will both probe; the only cost is one redundant request, so
//! the lock is never held across a probe.

use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::config::HealthTtls;
use crate::error::AdvisorError;

/// Why a provider was judged (un)available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Probe succeeded
    Healthy,
    /// No credential or models configured
    NotConfigured,
    /// Network error, timeout or error status
    Unreachable,
    /// Backend rejected the credential
    CredentialsRejected,
}

impl HealthStatus {
    /// Whether requests may be sent
    pub fn is_available(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Health check result with timestamp
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthEntry {
    /// Outcome of the check
    pub status: HealthStatus,
    /// When the check was performed
    pub checked_at: Instant,
    /// How long the outcome is trusted
    pub ttl: Duration,
}

impl HealthEntry {
    fn new(status: HealthStatus, ttl: Duration) -> Self {
        Self {
            status,
            checked_at: Instant::now(),
            ttl,
        }
    }

    /// Whether the provider was available at check time
    pub fn is_available(&self) -> bool {
        self.status.is_available()
    }

    /// Check if the entry is still valid (not expired)
    pub fn is_valid(&self) -> bool {
        self.checked_at.elapsed() < self.ttl
    }
}

/// Cached liveness and credential check for one provider
#[derive(Debug)]
pub struct HealthMonitor {
    provider_id: String,
    ttls: HealthTtls,
    entry: RwLock<Option<HealthEntry>>,
}

impl HealthMonitor {
    /// Create an empty monitor
    pub fn new(provider_id: impl Into<String>, ttls: HealthTtls) -> Self {
        Self {
            provider_id: provider_id.into(),
            ttls,
            entry: RwLock::new(None),
        }
    }

    /// Current entry, expired or not
    pub fn cached(&self) -> Option<HealthEntry> {
        *self.entry.read()
    }

    /// Return the cached availability, or run `probe` and cache its outcome.
    ///
    /// An unconfigured provider is never probed. The probe is bounded by the
    /// configured probe timeout.
    pub async fn check<F, Fut>(&self, configured: bool, probe: F) -> bool
    where
        F: FnOnce(Duration) -> Fut,
        Fut: Future<Output = Result<(), AdvisorError>>,
    {
        if let Some(entry) = self.cached().filter(HealthEntry::is_valid) {
            debug!(
                "Using cached health check for provider: {} ({:?})",
                self.provider_id, entry.status
            );
            return entry.is_available();
        }

        if !configured {
            debug!("Provider {} is not configured", self.provider_id);
            return self.record(HealthStatus::NotConfigured).is_available();
        }

        debug!("Performing health check for provider: {}", self.provider_id);
        let timeout = self.ttls.probe_timeout;
        let status = match tokio::time::timeout(timeout, probe(timeout)).await {
            Ok(Ok(())) => HealthStatus::Healthy,
            Ok(Err(e)) if e.is_credential_rejection() => {
                warn!("Provider {} rejected credentials during health check", self.provider_id);
                HealthStatus::CredentialsRejected
            }
            Ok(Err(e)) => {
                warn!("Health check failed for provider {}: {}", self.provider_id, e);
                HealthStatus::Unreachable
            }
            Err(_) => {
                warn!("Health check timeout for provider: {}", self.provider_id);
                HealthStatus::Unreachable
            }
        };

        self.record(status).is_available()
    }

    /// Force the provider unavailable after a request was rejected for its credential
    pub fn mark_rejected(&self) {
        warn!(
            "Marking provider {} unavailable for {:?} after credential rejection",
            self.provider_id, self.ttls.rejected
        );
        self.record(HealthStatus::CredentialsRejected);
    }

    fn ttl_for(&self, status: HealthStatus) -> Duration {
        match status {
            HealthStatus::Healthy => self.ttls.healthy,
            HealthStatus::NotConfigured => self.ttls.not_configured,
            HealthStatus::Unreachable => self.ttls.unreachable,
            HealthStatus::CredentialsRejected => self.ttls.rejected,
        }
    }

    fn record(&self, status: HealthStatus) -> HealthEntry {
        let entry = HealthEntry::new(status, self.ttl_for(status));
        *self.entry.write() = Some(entry);
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn short_ttls() -> HealthTtls {
        HealthTtls {
            healthy: Duration::from_secs(60),
            unreachable: Duration::from_millis(50),
            rejected: Duration::from_millis(200),
            not_configured: Duration::from_secs(60),
            probe_timeout: Duration::from_millis(100),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_provider_never_checked() {
        let monitor = HealthMonitor::new("remote", short_ttls());
        let probes = AtomicUsize::new(0);
        let counter = &probes;

        let available = monitor
            .check(false, move |_| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(!available);
        assert_eq!(probes.load(Ordering::SeqCst), 0);
        let entry = monitor.cached().unwrap();
        assert_eq!(entry.status, HealthStatus::NotConfigured);
        assert_eq!(entry.ttl, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_healthy_result_is_cached() {
        let monitor = HealthMonitor::new("local", short_ttls());
        let probes = AtomicUsize::new(0);
        let counter = &probes;

        for _ in 0..3 {
            let available = monitor
                .check(true, move |_| async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .await;
            assert!(available);
        }

        assert_eq!(probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_status_ttls() {
        let monitor = HealthMonitor::new("remote", short_ttls());
        monitor
            .check(true, |_| async { Err(AdvisorError::AuthRejected(401)) })
            .await;
        assert_eq!(monitor.cached().unwrap().status, HealthStatus::CredentialsRejected);
        assert_eq!(monitor.cached().unwrap().ttl, Duration::from_millis(200));

        let monitor = HealthMonitor::new("remote", short_ttls());
        monitor
            .check(true, |_| async {
                Err(AdvisorError::NetworkError("refused".to_string()))
            })
            .await;
        assert_eq!(monitor.cached().unwrap().status, HealthStatus::Unreachable);
        assert_eq!(monitor.cached().unwrap().ttl, Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_slow_health_check_marks_unreachable() {
        let monitor = HealthMonitor::new("local", short_ttls());
        let available = monitor
            .check(true, |_| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(!available);
        assert_eq!(monitor.cached().unwrap().status, HealthStatus::Unreachable);
    }

    #[tokio::test]
    async fn test_expired_entry_is_checked_again() {
        let monitor = HealthMonitor::new("remote", short_ttls());
        let probes = AtomicUsize::new(0);
        let counter = &probes;
        let probe = move |_: Duration| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(AdvisorError::NetworkError("refused".to_string()))
        };

        assert!(!monitor.check(true, probe).await);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!monitor.check(true, probe).await);
        assert_eq!(probes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_mark_rejected() {
        let monitor = HealthMonitor::new("remote", short_ttls());
        monitor.mark_rejected();
        let entry = monitor.cached().unwrap();
        assert!(!entry.is_available());
        assert!(entry.is_valid());
    }
}
