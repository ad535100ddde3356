//! API route handlers for the gateway.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::json;

use crate::server::AppState;

/// Liveness endpoint: process status plus a storage connectivity probe.
/// Storage-down surfaces as "degraded" here and as a failed job on the
/// dispatch path.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let storage_ok = state.store.ping().is_ok();
    Json(json!({
        "status": if storage_ok { "ok" } else { "degraded" },
        "service": "clockrelay-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "storage": storage_ok,
        "active_jobs": state.jobs.active_count(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clockrelay_core::config::RelayConfig;
    use clockrelay_store::RelayStore;
    use clockrelay_upstream::{RetryPolicy, TrackerClient};

    #[tokio::test]
    async fn test_health_reports_storage() {
        let config = RelayConfig::default();
        let tracker = TrackerClient::new(&config.tracker, RetryPolicy::default());
        let store = Arc::new(RelayStore::open_in_memory().unwrap());
        let state = Arc::new(AppState::new(config, store, tracker));

        let Json(body) = health_check(State(state)).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["storage"], true);
        assert_eq!(body["active_jobs"], 0);
    }
}
