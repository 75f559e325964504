use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::Json;
use cc_pack::Format;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{rate_limit_key, AuthedCaller};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RecallQuery {
    #[serde(default)]
    pub query: String,
    pub limit: Option<u32>,
    #[serde(default)]
    pub format: Option<String>,
}

pub async fn recall(
    State(state): State<AppState>,
    AuthedCaller(caller): AuthedCaller,
    Path(project_id): Path<Uuid>,
    Query(query): Query<RecallQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    state.rate_limiter.check(&rate_limit_key(Some(&caller), ""))?;

    let limit = query.limit.unwrap_or(state.config.pack.default_recall_limit).min(state.config.pack.max_recall_limit);
    let format = match query.format.as_deref() {
        Some(s) => Format::from_str(s)?,
        None => Format::default(),
    };

    let result = state
        .recall
        .recall(caller.user.id, caller.org_id, caller.is_unlimited, project_id, &query.query, limit)
        .await?;
    let (pack, report) = state.pack.assemble(&result.items, format);

    let mut event_data = std::collections::BTreeMap::new();
    event_data.insert("query".to_string(), json!(query.query));
    event_data.insert("item_count".to_string(), json!(result.items.len()));
    if let Err(e) = state
        .store
        .append_audit_event(project_id, "recall_query", &caller.user.id.to_string(), event_data)
        .await
    {
        tracing::warn!(error = %e, "failed to append audit event for recall_query");
    }

    Ok(Json(json!({ "items": result.items, "pack": pack, "report": report })))
}
