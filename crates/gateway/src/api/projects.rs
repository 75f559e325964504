use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{rate_limit_key, AuthedCaller};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListProjectsQuery {
    pub org_id: Option<Uuid>,
}

/// A project enriched with a count otherwise missing from the bare entity —
/// joined here rather than carried on `Project` itself since nothing but
/// this listing endpoint needs it.
#[derive(Debug, serde::Serialize)]
pub struct ProjectView {
    #[serde(flatten)]
    pub project: cc_domain::Project,
    pub memory_count: u64,
}

pub async fn list_projects(
    State(state): State<AppState>,
    AuthedCaller(caller): AuthedCaller,
    Query(q): Query<ListProjectsQuery>,
) -> ApiResult<Json<Vec<ProjectView>>> {
    state.rate_limiter.check(&rate_limit_key(Some(&caller), ""))?;

    let org_ids = match q.org_id {
        Some(org_id) => {
            authorize_org(&state, &caller, org_id).await?;
            vec![org_id]
        }
        None => caller_org_ids(&state, &caller).await?,
    };

    let mut views = Vec::new();
    for org_id in org_ids {
        for project in state.store.list_projects_for_org(org_id).await? {
            let memory_count = state.store.count_memories_in_project(project.id).await?;
            views.push(ProjectView { project, memory_count });
        }
    }
    Ok(Json(views))
}

/// Organizations the caller may list projects across when no `org_id` is
/// given: the single org an API key is scoped to, or every org a session
/// caller holds membership in.
async fn caller_org_ids(state: &AppState, caller: &cc_domain::Caller) -> Result<Vec<Uuid>, crate::error::ApiError> {
    match caller.org_id {
        Some(org_id) => Ok(vec![org_id]),
        None => {
            let memberships = state.store.list_memberships_for_user(caller.user.id).await?;
            Ok(memberships.into_iter().map(|(org, _role)| org.id).collect())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectBody {
    pub org_id: Uuid,
    pub name: String,
}

pub async fn create_project(State(state): State<AppState>, AuthedCaller(caller): AuthedCaller, Json(body): Json<CreateProjectBody>) -> ApiResult<Json<serde_json::Value>> {
    state.rate_limiter.check(&rate_limit_key(Some(&caller), ""))?;
    authorize_org(&state, &caller, body.org_id).await?;

    let name = body.name.trim();
    if name.is_empty() || name.chars().count() > 200 {
        return Err(cc_domain::Error::validation("name must be 1..200 characters").into());
    }

    let reservation = state.quota.reserve(caller.user.id, cc_domain::UsageEventType::ProjectCreated, caller.is_unlimited).await?;
    match state.store.insert_project(body.org_id, name).await {
        Ok(project) => {
            state.quota.commit(reservation);
            Ok(Json(json!({ "project": project })))
        }
        Err(e) => {
            state.quota.rollback(reservation).await.ok();
            Err(e.into())
        }
    }
}

async fn authorize_org(state: &AppState, caller: &cc_domain::Caller, org_id: Uuid) -> Result<(), crate::error::ApiError> {
    match caller.org_id {
        Some(id) if id == org_id => Ok(()),
        Some(_) => Err(cc_domain::Error::Forbidden("api key is scoped to a different organization".into()).into()),
        None => {
            state.identity.require_org_membership(caller.user.id, org_id).await?;
            Ok(())
        }
    }
}
