//! Shared authorization helpers used across handlers. Grounded on the same
//! org/membership checks `cc_memory::MemoryService::create` and
//! `cc_recall::RecallEngine::recall` already perform inline — pulled out
//! here so the HTTP-layer handlers that only *read* (list, recall, pack)
//! enforce the identical rule instead of re-deriving it.

use axum::http::HeaderMap;
use cc_domain::{Caller, Project};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::ApiError;
use crate::state::AppState;

/// Loads `project_id` and checks the caller may act on it: an API-key
/// caller must belong to the project's organization; a session caller must
/// hold some membership in it.
pub async fn authorize_project(state: &AppState, caller: &Caller, project_id: uuid::Uuid) -> Result<Project, ApiError> {
    let project = state
        .store
        .get_project(project_id)
        .await?
        .ok_or_else(|| cc_domain::Error::NotFound("project not found".into()))?;

    match caller.org_id {
        Some(org_id) if org_id == project.org_id => {}
        Some(_) => return Err(cc_domain::Error::Forbidden("project belongs to a different organization".into()).into()),
        None => {
            state.identity.require_org_membership(caller.user.id, project.org_id).await?;
        }
    }
    Ok(project)
}

/// Admits either an `is_admin` session caller or a request bearing the
/// configured `X-Admin-Token` header, checked in constant time against the
/// hash computed once at startup. The header lets operators reach admin
/// routes from scripts with no human session behind them.
pub fn require_admin(state: &AppState, caller: &Caller, headers: &HeaderMap) -> Result<(), ApiError> {
    if caller.is_admin {
        return Ok(());
    }
    if let Some(expected_hash) = &state.admin_token_hash {
        if let Some(token) = headers.get("X-Admin-Token").and_then(|v| v.to_str().ok()) {
            let provided_hash = Sha256::digest(token.as_bytes());
            if bool::from(provided_hash.as_slice().ct_eq(expected_hash.as_slice())) {
                return Ok(());
            }
        }
    }
    Err(cc_domain::Error::Forbidden("admin access required".into()).into())
}

pub fn require_session(caller: &Caller) -> Result<(), ApiError> {
    if matches!(caller.auth_kind, cc_domain::AuthKind::Session) {
        Ok(())
    } else {
        Err(cc_domain::Error::Forbidden("a logged-in session is required for this action".into()).into())
    }
}
