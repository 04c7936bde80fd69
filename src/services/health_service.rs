use crate::config::HealthConfig;
use crate::services::user_store::UserStore;
use opentelemetry::{KeyValue, global, metrics::Histogram};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

#[derive(Clone)]
pub struct HealthMetrics {
    pub health_check_duration_seconds: Histogram<f64>,
}

impl fmt::Debug for HealthMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthMetrics").finish_non_exhaustive()
    }
}

impl HealthMetrics {
    #[must_use]
    pub fn new() -> Self {
        let meter = global::meter("vidagent-server");
        Self {
            health_check_duration_seconds: meter
                .f64_histogram("health_check_duration_seconds")
                .with_description("Duration of health checks")
                .build(),
        }
    }
}

impl Default for HealthMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct HealthService {
    users: Arc<dyn UserStore>,
    config: HealthConfig,
    metrics: HealthMetrics,
}

impl HealthService {
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>, config: HealthConfig) -> Self {
        Self { users, config, metrics: HealthMetrics::new() }
    }

    /// Probes the user store within the configured timeout.
    ///
    /// # Errors
    /// Returns a description of the failure or the timeout.
    pub async fn check_store(&self) -> Result<(), String> {
        let store_timeout = Duration::from_millis(self.config.store_timeout_ms);
        let start = Instant::now();

        let res = match timeout(store_timeout, self.users.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("User store check failed: {e}")),
            Err(_) => Err("User store check timed out".to_string()),
        };

        self.metrics
            .health_check_duration_seconds
            .record(start.elapsed().as_secs_f64(), &[KeyValue::new("component", "user_store")]);
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryUserStore;

    #[tokio::test]
    async fn test_memory_store_is_ready() {
        let service = HealthService::new(Arc::new(MemoryUserStore::new()), HealthConfig { store_timeout_ms: 100 });
        assert!(service.check_store().await.is_ok());
    }
}
