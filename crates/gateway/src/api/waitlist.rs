use axum::extract::{ConnectInfo, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;

use crate::auth::rate_limit_key;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct JoinWaitlistBody {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub use_case: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

pub async fn join(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(body): Json<JoinWaitlistBody>,
) -> ApiResult<Json<serde_json::Value>> {
    state.rate_limiter.check(&rate_limit_key(None, &peer.ip().to_string()))?;

    let email = body.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(cc_domain::Error::validation("invalid email address").into());
    }

    let entry = state
        .store
        .insert_waitlist_entry(&email, body.name, body.company, body.use_case, body.source)
        .await?;
    Ok(Json(json!({ "id": entry.id, "status": entry.status })))
}
