use std::time::Duration;

use serde::Serialize;
use tokio::time::{Instant, timeout};

use super::ClusterBackend;

/// Health check status for a cluster connection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    /// Whether the cluster answered the ping
    pub healthy: bool,
    /// Error details when unhealthy
    pub message: Option<String>,
    /// Response time in milliseconds
    pub response_time_ms: u64,
}

impl HealthStatus {
    /// Unhealthy status for a check that never reached the cluster
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: Some(message.into()),
            response_time_ms: 0,
        }
    }
}

/// Check cluster health with a `ping`, bounded by `limit`
///
/// # Example
/// ```ignore
/// use database::mongodb::{MongoBackend, check_health};
///
/// let healthy = check_health(&backend, Duration::from_secs(2)).await;
/// ```
pub async fn check_health<B: ClusterBackend + ?Sized>(backend: &B, limit: Duration) -> bool {
    matches!(timeout(limit, backend.ping()).await, Ok(Ok(())))
}

/// Check cluster health with timing information and any error message
///
/// ```ignore
/// let status = check_health_detailed(&backend, Duration::from_secs(2)).await;
/// if !status.healthy {
///     tracing::warn!(message = ?status.message, "MongoDB unhealthy");
/// }
/// ```
pub async fn check_health_detailed<B: ClusterBackend + ?Sized>(
    backend: &B,
    limit: Duration,
) -> HealthStatus {
    let start = Instant::now();
    let outcome = timeout(limit, backend.ping()).await;
    let response_time_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(Ok(())) => HealthStatus {
            healthy: true,
            message: None,
            response_time_ms,
        },
        Ok(Err(e)) => HealthStatus {
            healthy: false,
            message: Some(e.to_string()),
            response_time_ms,
        },
        Err(_) => HealthStatus {
            healthy: false,
            message: Some(format!("ping timed out after {limit:?}")),
            response_time_ms,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::BackendError;
    use crate::mongodb::backend::MockClusterBackend;

    #[tokio::test]
    async fn test_check_health_ok() {
        let mut backend = MockClusterBackend::new();
        backend.expect_ping().times(1).returning(|| Ok(()));

        assert!(check_health(&backend, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_check_health_detailed_reports_error() {
        let mut backend = MockClusterBackend::new();
        backend
            .expect_ping()
            .returning(|| Err(BackendError::Unavailable("no primary".into())));

        let status = check_health_detailed(&backend, Duration::from_secs(1)).await;
        assert!(!status.healthy);
        assert!(status.message.unwrap().contains("no primary"));
    }

    #[test]
    fn test_unavailable_status() {
        let status = HealthStatus::unavailable("not connected");
        assert!(!status.healthy);
        assert_eq!(status.response_time_ms, 0);
    }
}
