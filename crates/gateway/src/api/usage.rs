use axum::extract::State;
use axum::Json;

use crate::auth::{rate_limit_key, AuthedCaller};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn usage(State(state): State<AppState>, AuthedCaller(caller): AuthedCaller) -> ApiResult<Json<cc_quota::UsageSnapshot>> {
    state.rate_limiter.check(&rate_limit_key(Some(&caller), ""))?;
    let snapshot = state.quota.usage_today(caller.user.id).await?;
    Ok(Json(snapshot))
}
