//! Health diagnostics for the coordinator and its storage backends.

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Health status of a component or the whole node
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Component is healthy
    Healthy,
    /// Component is degraded but functional
    Degraded,
    /// Component is unhealthy
    Unhealthy,
}

impl HealthStatus {
    /// Returns true if the status is Healthy or Degraded (operational)
    pub fn is_ok(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Degraded)
    }
}

/// Health information for a single component
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name
    pub name: String,
    /// Current health status
    pub status: HealthStatus,
    /// Optional failure detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentHealth {
    /// A healthy component with no message.
    pub fn healthy(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: HealthStatus::Healthy,
            message: None,
        }
    }

    /// An unhealthy component carrying the failure detail.
    pub fn unhealthy(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
        }
    }
}

/// Complete health report produced by a ping
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthReport {
    /// Overall status: unhealthy if any component is
    pub overall: HealthStatus,
    /// Per-component details
    pub components: Vec<ComponentHealth>,
    /// Report generation time
    pub checked_at: Timestamp,
}

impl HealthReport {
    /// Builds a report from component checks; overall is the worst status.
    pub fn from_components(components: Vec<ComponentHealth>, checked_at: Timestamp) -> Self {
        let overall = if components.iter().any(|c| c.status == HealthStatus::Unhealthy) {
            HealthStatus::Unhealthy
        } else if components.iter().any(|c| c.status == HealthStatus::Degraded) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };
        Self {
            overall,
            components,
            checked_at,
        }
    }

    /// Returns true if the overall status is operational.
    pub fn is_ok(&self) -> bool {
        self.overall.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_ok() {
        assert!(HealthStatus::Healthy.is_ok());
        assert!(HealthStatus::Degraded.is_ok());
        assert!(!HealthStatus::Unhealthy.is_ok());
    }

    #[test]
    fn test_report_overall_worst_wins() {
        let report = HealthReport::from_components(
            vec![
                ComponentHealth::healthy("object_store"),
                ComponentHealth::unhealthy("index_cache", "poisoned"),
            ],
            Timestamp::from_nanos(1),
        );
        assert_eq!(report.overall, HealthStatus::Unhealthy);
        assert!(!report.is_ok());
    }

    #[test]
    fn test_report_all_healthy() {
        let report = HealthReport::from_components(
            vec![
                ComponentHealth::healthy("object_store"),
                ComponentHealth::healthy("index_cache"),
            ],
            Timestamp::from_nanos(1),
        );
        assert_eq!(report.overall, HealthStatus::Healthy);
        assert!(report.is_ok());
    }
}
