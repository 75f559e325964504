use axum::extract::State;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

/// Liveness probe. `count_failed_jobs` is a cheap read against the pool and
/// doubles as a real connectivity check — a wedged pool fails it the same
/// way a real query would.
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let store_ok = state.store.count_failed_jobs().await.is_ok();
    Json(json!({
        "status": if store_ok { "ok" } else { "degraded" },
        "checks": { "store": store_ok },
    }))
}
