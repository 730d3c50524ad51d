use tracing::warn;

use crate::{clock::unix_millis, dto::health::HealthResponse, state::SharedState};

/// Report whether storage is reachable, along with the server clock.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    let now = unix_millis(state.now());
    if state.is_degraded() {
        HealthResponse::degraded(now)
    } else {
        HealthResponse::ok(now)
    }
}
