use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::api::common::authorize_project;
use crate::auth::{rate_limit_key, AuthedCaller};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListMemoriesQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    50
}

pub async fn list_memories(
    State(state): State<AppState>,
    AuthedCaller(caller): AuthedCaller,
    Path(project_id): Path<Uuid>,
    Query(q): Query<ListMemoriesQuery>,
) -> ApiResult<Json<Vec<cc_domain::Memory>>> {
    state.rate_limiter.check(&rate_limit_key(Some(&caller), ""))?;
    authorize_project(&state, &caller, project_id).await?;
    let memories = state.memory.list(project_id, q.limit, q.offset).await?;
    Ok(Json(memories))
}

pub async fn create_memory(
    State(state): State<AppState>,
    AuthedCaller(caller): AuthedCaller,
    Path(project_id): Path<Uuid>,
    Json(card): Json<cc_domain::MemoryCard>,
) -> ApiResult<impl IntoResponse> {
    state.rate_limiter.check(&rate_limit_key(Some(&caller), ""))?;
    let outcome = state
        .memory
        .create(caller.user.id, caller.org_id, caller.is_unlimited, project_id, card)
        .await?;
    let status = if outcome.idempotent { StatusCode::OK } else { StatusCode::CREATED };
    Ok((status, Json(json!({ "memory": outcome.memory, "idempotent": outcome.idempotent }))))
}
