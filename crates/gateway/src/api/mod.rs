pub mod admin;
pub mod api_keys;
pub mod auth;
pub mod common;
pub mod health;
pub mod memories;
pub mod orgs;
pub mod projects;
pub mod recall;
pub mod usage;
pub mod waitlist;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Splits routes into a public group and a group that requires an
/// authenticated caller, merged into one `Router`. Authorization is
/// per-handler (`AuthedCaller` extractors), so this function takes no
/// `AppState` and no auth layer is attached here.
pub fn router() -> Router<AppState> {
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/auth/request-link", post(auth::request_link))
        .route("/auth/verify", get(auth::verify))
        .route("/waitlist/join", post(waitlist::join));

    let protected = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/me/orgs", get(orgs::list_my_orgs))
        .route("/me/usage", get(usage::usage))
        .route("/orgs", post(orgs::create_org))
        .route("/projects", get(projects::list_projects).post(projects::create_project))
        .route("/projects/:id/memories", get(memories::list_memories).post(memories::create_memory))
        .route("/projects/:id/recall", get(recall::recall))
        .route("/orgs/:id/api-keys", get(api_keys::list).post(api_keys::create))
        .route("/orgs/:id/api-keys/:key_id/revoke", post(api_keys::revoke))
        .route("/admin/invites", get(admin::list_invites).post(admin::create_invite))
        .route("/admin/invites/:id/revoke", post(admin::revoke_invite))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/:id/set-unlimited", post(admin::set_unlimited))
        .route("/admin/stats", get(admin::stats))
        .route("/admin/recall-logs", get(admin::recall_logs))
        .route("/admin/waitlist", get(admin::list_waitlist))
        .route("/admin/waitlist/:id/approve", post(admin::approve_waitlist))
        .route("/admin/waitlist/:id/reject", post(admin::reject_waitlist));

    Router::new().merge(public).merge(protected).layer(TraceLayer::new_for_http())
}
