use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::common::require_session;
use crate::auth::{rate_limit_key, AuthedCaller};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct MembershipView {
    pub organization: cc_domain::Organization,
    pub role: cc_domain::OrgRole,
}

pub async fn list_my_orgs(State(state): State<AppState>, AuthedCaller(caller): AuthedCaller) -> ApiResult<Json<Vec<MembershipView>>> {
    state.rate_limiter.check(&rate_limit_key(Some(&caller), ""))?;
    let memberships = state.store.list_memberships_for_user(caller.user.id).await?;
    Ok(Json(
        memberships
            .into_iter()
            .map(|(organization, role)| MembershipView { organization, role })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct CreateOrgBody {
    pub name: String,
}

pub async fn create_org(State(state): State<AppState>, AuthedCaller(caller): AuthedCaller, Json(body): Json<CreateOrgBody>) -> ApiResult<Json<serde_json::Value>> {
    require_session(&caller)?;
    state.rate_limiter.check(&rate_limit_key(Some(&caller), ""))?;

    let name = body.name.trim();
    if name.is_empty() || name.chars().count() > 200 {
        return Err(cc_domain::Error::validation("name must be 1..200 characters").into());
    }

    let org = state.store.insert_organization(name).await?;
    state.store.add_org_membership(caller.user.id, org.id, cc_domain::OrgRole::Admin).await?;
    Ok(Json(json!({ "organization": org })))
}
