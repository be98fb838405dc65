use crate::adapters::{Backends, Probe};
use crate::config::HealthConfig;
use opentelemetry::{KeyValue, global, metrics::Gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Clone, Debug)]
pub struct Metrics {
    pub status: Gauge<i64>,
}

impl Metrics {
    #[must_use]
    pub(crate) fn new() -> Self {
        let meter = global::meter("parley-server");
        Self {
            status: meter
                .i64_gauge("parley_health_status")
                .with_description("Status of health checks (1 for ok, 0 for error)")
                .build(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct HealthService {
    database: Arc<dyn Probe>,
    storage: Arc<dyn Probe>,
    config: HealthConfig,
    metrics: Metrics,
}

impl HealthService {
    #[must_use]
    pub fn new(backends: &Backends, config: HealthConfig) -> Self {
        Self {
            database: Arc::clone(&backends.database),
            storage: Arc::clone(&backends.storage),
            config,
            metrics: Metrics::new(),
        }
    }

    /// Checks database connectivity.
    ///
    /// # Errors
    /// Returns a string describing the failure if the database is unreachable.
    pub async fn check_db(&self) -> Result<(), String> {
        self.check("database", &*self.database, Duration::from_millis(self.config.db_timeout_ms)).await
    }

    /// Checks blob storage connectivity.
    ///
    /// # Errors
    /// Returns a string describing the failure if storage is unreachable.
    pub async fn check_storage(&self) -> Result<(), String> {
        self.check("storage", &*self.storage, Duration::from_millis(self.config.storage_timeout_ms)).await
    }

    async fn check(&self, component: &'static str, probe: &dyn Probe, limit: Duration) -> Result<(), String> {
        let outcome = match timeout(limit, probe.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("{component} connection failed: {e}")),
            Err(_) => Err(format!("{component} connection timed out")),
        };

        let status = i64::from(outcome.is_ok());
        self.metrics.status.record(status, &[KeyValue::new("component", component)]);
        outcome
    }
}
