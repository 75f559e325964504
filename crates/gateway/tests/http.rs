use std::net::{SocketAddr, Ipv4Addr};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::connect_info::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::Router;
use cc_domain::Config;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn test_state() -> cc_gateway::state::AppState {
    let mut config = Config::default();
    config.store.path = ":memory:".to_string();
    config.store.pool_size = 1;
    config.jobs.worker_count = 1;
    cc_gateway::bootstrap::build_app_state(Arc::new(config)).await.unwrap()
}

fn test_router(state: cc_gateway::state::AppState) -> Router {
    cc_gateway::api::router().with_state(state)
}

fn peer() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::new(127, 0, 0, 1), 54321))
}

fn anon_request(method: &str, path: &str, body: Option<Value>) -> Request<Body> {
    let body = match body {
        Some(v) => Body::from(v.to_string()),
        None => Body::empty(),
    };
    let mut req = Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();
    req.extensions_mut().insert(ConnectInfo(peer()));
    req
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

#[tokio::test]
async fn health_reports_ok() {
    let router = test_router(test_state().await);
    let response = router.oneshot(anon_request("GET", "/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], json!("ok"));
}

#[tokio::test]
async fn unauthenticated_request_to_protected_route_is_rejected() {
    let router = test_router(test_state().await);
    let response = router.oneshot(anon_request("GET", "/me/usage", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"], json!("auth_missing"));
}

#[tokio::test]
async fn waitlist_join_accepts_a_valid_email() {
    let router = test_router(test_state().await);
    let response = router
        .clone()
        .oneshot(anon_request("POST", "/waitlist/join", Some(json!({ "email": "waiter@acme.test" }))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], json!("pending"));
}

#[tokio::test]
async fn waitlist_join_rejects_malformed_email() {
    let router = test_router(test_state().await);
    let response = router
        .oneshot(anon_request("POST", "/waitlist/join", Some(json!({ "email": "not-an-email" }))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// End-to-end: request a magic link, verify it, use the returned session
/// cookie to create an org, create a project in it, create a memory, then
/// recall it back.
#[tokio::test]
async fn magic_link_login_then_create_org_project_memory_and_recall() {
    let state = test_state().await;
    let router = test_router(state);

    let request_resp = router
        .clone()
        .oneshot(anon_request("POST", "/auth/request-link", Some(json!({ "email": "dev@acme.test" }))))
        .await
        .unwrap();
    assert_eq!(request_resp.status(), StatusCode::OK);
    let request_body = json_body(request_resp).await;
    let debug_link = request_body["debug_link"].as_str().expect("debug link present outside production");
    let token = debug_link.split("token=").nth(1).unwrap();

    let verify_resp = router
        .clone()
        .oneshot(anon_request("GET", &format!("/auth/verify?token={token}"), None))
        .await
        .unwrap();
    assert_eq!(verify_resp.status(), StatusCode::SEE_OTHER);
    let cookie_header = verify_resp
        .headers()
        .get(axum::http::header::SET_COOKIE)
        .expect("session cookie set")
        .to_str()
        .unwrap()
        .to_string();
    let cookie_value = cookie_header.split(';').next().unwrap().to_string();

    let authed = |method: &str, path: &str, body: Option<Value>| {
        let body = match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        };
        let mut req = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json")
            .header(axum::http::header::COOKIE, cookie_value.clone())
            .body(body)
            .unwrap();
        req.extensions_mut().insert(ConnectInfo(peer()));
        req
    };

    let create_org_resp = router
        .clone()
        .oneshot(authed("POST", "/orgs", Some(json!({ "name": "Acme Inc" }))))
        .await
        .unwrap();
    assert_eq!(create_org_resp.status(), StatusCode::OK);
    let org_body = json_body(create_org_resp).await;
    let org_id = org_body["organization"]["id"].as_str().unwrap().to_string();

    let create_project_resp = router
        .clone()
        .oneshot(authed("POST", "/projects", Some(json!({ "org_id": org_id, "name": "Launch" }))))
        .await
        .unwrap();
    assert_eq!(create_project_resp.status(), StatusCode::OK);
    let project_body = json_body(create_project_resp).await;
    let project_id = project_body["project"]["id"].as_str().unwrap().to_string();

    let create_memory_resp = router
        .clone()
        .oneshot(authed(
            "POST",
            &format!("/projects/{project_id}/memories"),
            Some(json!({ "type": "note", "source": "manual", "content": "We decided to use Postgres." })),
        ))
        .await
        .unwrap();
    assert_eq!(create_memory_resp.status(), StatusCode::CREATED);

    let list_memories_resp = router
        .clone()
        .oneshot(authed("GET", &format!("/projects/{project_id}/memories"), None))
        .await
        .unwrap();
    assert_eq!(list_memories_resp.status(), StatusCode::OK);
    let list_body = json_body(list_memories_resp).await;
    assert_eq!(list_body.as_array().unwrap().len(), 1);

    let recall_resp = router
        .clone()
        .oneshot(authed("GET", &format!("/projects/{project_id}/recall?query=postgres"), None))
        .await
        .unwrap();
    assert_eq!(recall_resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn org_creation_requires_a_real_session_not_just_any_caller() {
    // `/orgs` requires `require_session`; an anonymous caller never even
    // reaches that check because `AuthedCaller` itself rejects it first.
    let router = test_router(test_state().await);
    let response = router
        .oneshot(anon_request("POST", "/orgs", Some(json!({ "name": "Acme" }))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_reject_non_admin_session_callers() {
    let state = test_state().await;
    let store = state.store.clone();
    let router = test_router(state);

    let email = "plain-user@acme.test";
    let user = store.insert_user(email).await.unwrap();
    let session = store.insert_session("sess-token-1", user.id, 30).await.unwrap();

    let mut req = Request::builder()
        .method("GET")
        .uri("/admin/stats")
        .header(axum::http::header::COOKIE, format!("contextcache_session={}", session.id))
        .body(Body::empty())
        .unwrap();
    req.extensions_mut().insert(ConnectInfo(peer()));

    let response = router.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
