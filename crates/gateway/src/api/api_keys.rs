use axum::extract::{Path, State};
use axum::Json;
use cc_domain::OrgRole;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::api::common::require_session;
use crate::auth::{rate_limit_key, AuthedCaller};
use crate::error::ApiResult;
use crate::state::AppState;

async fn require_org_admin(state: &AppState, caller: &cc_domain::Caller, org_id: Uuid) -> Result<(), crate::error::ApiError> {
    require_session(caller)?;
    let role = state.identity.require_org_membership(caller.user.id, org_id).await?;
    if role != OrgRole::Admin {
        return Err(cc_domain::Error::Forbidden("org admin role required".into()).into());
    }
    Ok(())
}

pub async fn list(State(state): State<AppState>, AuthedCaller(caller): AuthedCaller, Path(org_id): Path<Uuid>) -> ApiResult<Json<Vec<cc_domain::ApiKey>>> {
    state.rate_limiter.check(&rate_limit_key(Some(&caller), ""))?;
    require_org_admin(&state, &caller, org_id).await?;
    Ok(Json(state.api_keys.list(org_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateApiKeyBody {
    pub name: String,
    pub expires_in_days: Option<i64>,
}

pub async fn create(
    State(state): State<AppState>,
    AuthedCaller(caller): AuthedCaller,
    Path(org_id): Path<Uuid>,
    Json(body): Json<CreateApiKeyBody>,
) -> ApiResult<Json<serde_json::Value>> {
    state.rate_limiter.check(&rate_limit_key(Some(&caller), ""))?;
    require_org_admin(&state, &caller, org_id).await?;
    let created = state.api_keys.create(org_id, &body.name, body.expires_in_days).await?;
    Ok(Json(json!({
        "id": created.id,
        "prefix": created.prefix,
        "secret": created.plaintext_secret,
    })))
}

pub async fn revoke(
    State(state): State<AppState>,
    AuthedCaller(caller): AuthedCaller,
    Path((org_id, key_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<serde_json::Value>> {
    state.rate_limiter.check(&rate_limit_key(Some(&caller), ""))?;
    require_org_admin(&state, &caller, org_id).await?;
    state.api_keys.revoke(org_id, key_id).await?;
    Ok(Json(json!({ "revoked": true })))
}
