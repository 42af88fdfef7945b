use serde::Serialize;

/// Service health status
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum ServiceHealth {
    /// Running normally
    Healthy,

    /// Running, but behind or partially failing
    Degraded(String),

    /// Background task has exited or cannot work
    Unhealthy(String),

    /// Registered but not started yet
    Starting,
}

impl ServiceHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ServiceHealth::Healthy)
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, ServiceHealth::Degraded(_))
    }

    pub fn is_unhealthy(&self) -> bool {
        matches!(self, ServiceHealth::Unhealthy(_))
    }
}

/// Health derived from a set of background task handles
pub(crate) fn from_handles(handles: &[tokio::task::JoinHandle<()>]) -> ServiceHealth {
    if handles.is_empty() {
        ServiceHealth::Starting
    } else if handles.iter().any(|h| h.is_finished()) {
        ServiceHealth::Unhealthy("background task exited".to_string())
    } else {
        ServiceHealth::Healthy
    }
}
