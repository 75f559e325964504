use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use cc_domain::WaitlistStatus;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::api::common::require_admin;
use crate::auth::{rate_limit_key, AuthedCaller};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListInvitesQuery {
    pub status: Option<String>,
    pub email: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    50
}

pub async fn list_invites(
    State(state): State<AppState>,
    AuthedCaller(caller): AuthedCaller,
    headers: HeaderMap,
    Query(q): Query<ListInvitesQuery>,
) -> ApiResult<Json<Vec<cc_domain::Invite>>> {
    require_admin(&state, &caller, &headers)?;
    state.rate_limiter.check(&rate_limit_key(Some(&caller), ""))?;
    let invites = state.invites.list(q.status.as_deref(), q.email.as_deref(), q.limit, q.offset).await?;
    Ok(Json(invites))
}

#[derive(Debug, Deserialize)]
pub struct CreateInviteBody {
    pub email: String,
    pub notes: Option<String>,
}

pub async fn create_invite(
    State(state): State<AppState>,
    AuthedCaller(caller): AuthedCaller,
    headers: HeaderMap,
    Json(body): Json<CreateInviteBody>,
) -> ApiResult<Json<serde_json::Value>> {
    require_admin(&state, &caller, &headers)?;
    state.rate_limiter.check(&rate_limit_key(Some(&caller), ""))?;
    let invite = state.invites.issue(caller.user.id, &body.email, body.notes).await?;
    Ok(Json(json!({ "invite": invite })))
}

pub async fn revoke_invite(
    State(state): State<AppState>,
    AuthedCaller(caller): AuthedCaller,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    require_admin(&state, &caller, &headers)?;
    state.rate_limiter.check(&rate_limit_key(Some(&caller), ""))?;
    state.invites.revoke(id).await?;
    Ok(Json(json!({ "revoked": true })))
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub email: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

pub async fn list_users(
    State(state): State<AppState>,
    AuthedCaller(caller): AuthedCaller,
    headers: HeaderMap,
    Query(q): Query<ListUsersQuery>,
) -> ApiResult<Json<Vec<cc_domain::User>>> {
    require_admin(&state, &caller, &headers)?;
    state.rate_limiter.check(&rate_limit_key(Some(&caller), ""))?;
    let users = state.store.list_users(q.email, q.limit, q.offset).await?;
    Ok(Json(users))
}

#[derive(Debug, Deserialize)]
pub struct SetUnlimitedBody {
    pub unlimited: bool,
}

pub async fn set_unlimited(
    State(state): State<AppState>,
    AuthedCaller(caller): AuthedCaller,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
    Json(body): Json<SetUnlimitedBody>,
) -> ApiResult<Json<serde_json::Value>> {
    require_admin(&state, &caller, &headers)?;
    state.rate_limiter.check(&rate_limit_key(Some(&caller), ""))?;
    state.store.set_unlimited(user_id, body.unlimited).await?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn stats(State(state): State<AppState>, AuthedCaller(caller): AuthedCaller, headers: HeaderMap) -> ApiResult<Json<cc_store::AdminStats>> {
    require_admin(&state, &caller, &headers)?;
    state.rate_limiter.check(&rate_limit_key(Some(&caller), ""))?;
    Ok(Json(state.store.admin_stats().await?))
}

#[derive(Debug, Deserialize)]
pub struct RecallLogsQuery {
    pub project_id: Uuid,
}

pub async fn recall_logs(
    State(state): State<AppState>,
    AuthedCaller(caller): AuthedCaller,
    headers: HeaderMap,
    Query(q): Query<RecallLogsQuery>,
) -> ApiResult<Json<Vec<cc_domain::AuditEvent>>> {
    require_admin(&state, &caller, &headers)?;
    state.rate_limiter.check(&rate_limit_key(Some(&caller), ""))?;
    let events = state.store.list_audit_events(q.project_id).await?;
    Ok(Json(events.into_iter().filter(|e| e.event_type == "recall_query").collect()))
}

#[derive(Debug, Deserialize)]
pub struct ListWaitlistQuery {
    pub status: Option<WaitlistStatus>,
}

pub async fn list_waitlist(
    State(state): State<AppState>,
    AuthedCaller(caller): AuthedCaller,
    headers: HeaderMap,
    Query(q): Query<ListWaitlistQuery>,
) -> ApiResult<Json<Vec<cc_domain::WaitlistEntry>>> {
    require_admin(&state, &caller, &headers)?;
    state.rate_limiter.check(&rate_limit_key(Some(&caller), ""))?;
    Ok(Json(state.store.list_waitlist_entries(q.status).await?))
}

/// Approving promotes the entry into an active Invite, per the entity's
/// invariant in the data model.
pub async fn approve_waitlist(
    State(state): State<AppState>,
    AuthedCaller(caller): AuthedCaller,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    require_admin(&state, &caller, &headers)?;
    state.rate_limiter.check(&rate_limit_key(Some(&caller), ""))?;

    let entry = state
        .store
        .get_waitlist_entry(id)
        .await?
        .ok_or_else(|| cc_domain::Error::NotFound("waitlist entry not found".into()))?;
    let invite = state.invites.issue(caller.user.id, &entry.email, Some("promoted from waitlist".into())).await?;
    state.store.set_waitlist_status(id, WaitlistStatus::Approved).await?;
    Ok(Json(json!({ "invite": invite })))
}

pub async fn reject_waitlist(
    State(state): State<AppState>,
    AuthedCaller(caller): AuthedCaller,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    require_admin(&state, &caller, &headers)?;
    state.rate_limiter.check(&rate_limit_key(Some(&caller), ""))?;
    state.store.set_waitlist_status(id, WaitlistStatus::Rejected).await?;
    Ok(Json(json!({ "ok": true })))
}
