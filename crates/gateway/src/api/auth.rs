//! Login, session, and magic-link handlers. Named `api::auth` (as opposed
//! to the top-level `crate::auth` extractor module) to mirror the split the
//! route table expects: one module resolves *who* is calling, this one
//! implements the endpoints that change *who that is*.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Query, State};
use axum::response::Redirect;
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{rate_limit_key, AuthedCaller};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RequestLinkBody {
    pub email: String,
}

pub async fn request_link(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    axum::Json(body): axum::Json<RequestLinkBody>,
) -> ApiResult<axum::Json<serde_json::Value>> {
    state.rate_limiter.check(&rate_limit_key(None, &peer.ip().to_string()))?;

    let base_url = format!("http://{}:{}", state.config.server.host, state.config.server.port);
    let requested = state.magic_links.request(&body.email, &base_url).await?;

    let mut body = json!({ "sent": true });
    if !state.config.server.production {
        body["debug_link"] = json!(requested.debug_link);
    }
    Ok(axum::Json(body))
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: String,
}

pub async fn verify(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(query): Query<VerifyQuery>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Redirect)> {
    let (_user, session_id) = state.magic_links.verify(&query.token, &peer.ip().to_string()).await?;
    let cookie = session_cookie(&state, session_id);
    Ok((jar.add(cookie), Redirect::to("/app")))
}

pub async fn logout(State(state): State<AppState>, AuthedCaller(caller): AuthedCaller, jar: CookieJar) -> ApiResult<(CookieJar, axum::Json<serde_json::Value>)> {
    if let Some(cookie) = jar.get(&state.config.session.cookie_name) {
        state.store.revoke_session(cookie.value()).await?;
    }
    let removal = Cookie::build((state.config.session.cookie_name.clone(), ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .build();
    let _ = &caller;
    Ok((jar.remove(removal), axum::Json(json!({ "ok": true }))))
}

pub async fn me(AuthedCaller(caller): AuthedCaller) -> axum::Json<serde_json::Value> {
    axum::Json(json!({ "user": caller.user, "auth_kind": format!("{:?}", caller.auth_kind) }))
}

fn session_cookie(state: &AppState, session_id: String) -> Cookie<'static> {
    Cookie::build((state.config.session.cookie_name.clone(), session_id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(state.config.server.production)
        .max_age(time::Duration::days(state.config.session.ttl_days))
        .build()
}
