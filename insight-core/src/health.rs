//! Health reporting types shared by the store and the API.

use serde::{Deserialize, Serialize};

/// Health status for a service or component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Fully operational
    Healthy,
    /// Serving requests without caching
    Degraded,
}

/// Health of a single dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            latency_ms: None,
            error: None,
        }
    }

    /// The component is down but the service keeps running without it.
    pub fn degraded(error: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            latency_ms: None,
            error: Some(error.into()),
        }
    }

    pub fn with_latency(mut self, ms: u64) -> Self {
        self.latency_ms = Some(ms);
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Degraded).unwrap(),
            "\"degraded\""
        );
    }

    #[test]
    fn test_component_builders() {
        let ok = ComponentHealth::healthy().with_latency(4);
        assert!(ok.is_healthy());
        assert_eq!(ok.latency_ms, Some(4));

        let down = ComponentHealth::degraded("connection refused");
        assert!(!down.is_healthy());
        let json = serde_json::to_value(&down).unwrap();
        assert_eq!(json["error"], "connection refused");
        assert!(json.get("latency_ms").is_none());
    }
}
