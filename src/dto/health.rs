use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Server clock in Unix milliseconds, so clients can estimate their offset.
    pub server_time_ms: i64,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(server_time_ms: i64) -> Self {
        Self {
            status: "ok".to_string(),
            server_time_ms,
        }
    }

    /// Create a health response indicating the system is in degraded mode.
    pub fn degraded(server_time_ms: i64) -> Self {
        Self {
            status: "degraded".to_string(),
            server_time_ms,
        }
    }
}
