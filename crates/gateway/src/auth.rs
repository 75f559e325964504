//! Request-scoped `Caller` extraction via `FromRequestParts`, resolving the
//! full dual-mode `IdentityPerimeter` credential (API key or session
//! cookie) once per request.

use axum::extract::connect_info::ConnectInfo;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use cc_domain::Caller;
use cc_identity::Credential;
use std::net::SocketAddr;

use crate::error::ApiError;
use crate::state::AppState;

fn bearer_or_api_key(parts: &Parts) -> Option<String> {
    if let Some(value) = parts.headers.get(axum::http::header::AUTHORIZATION) {
        if let Ok(s) = value.to_str() {
            if let Some(token) = s.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }
    parts
        .headers
        .get("X-Api-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn session_cookie(parts: &Parts, state: &AppState) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    jar.get(&state.config.session.cookie_name)
        .map(|c| c.value().to_string())
}

/// Peer IP recorded for the connection, falling back to a placeholder when
/// `ConnectInfo` wasn't inserted (e.g. in tests that skip the real listener).
pub fn peer_ip(parts: &Parts) -> String {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn resolve(parts: &Parts, state: &AppState) -> Result<Option<Caller>, ApiError> {
    let ip = peer_ip(parts);
    let caller = if let Some(secret) = bearer_or_api_key(parts) {
        state.identity.resolve(Credential::ApiKey(&secret), &ip).await?
    } else if let Some(token) = session_cookie(parts, state) {
        state.identity.resolve(Credential::SessionCookie(&token), &ip).await?
    } else {
        state.identity.resolve(Credential::Anonymous, &ip).await?
    };
    Ok(caller)
}

/// Required caller — rejects anonymous requests with 401.
pub struct AuthedCaller(pub Caller);

impl FromRequestParts<AppState> for AuthedCaller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match resolve(parts, state).await? {
            Some(caller) => Ok(AuthedCaller(caller)),
            None => Err(cc_domain::Error::AuthMissing.into()),
        }
    }
}

/// Optional caller — for routes that behave differently for anonymous vs.
/// authenticated traffic (e.g. rate-limit key selection) without requiring auth.
pub struct MaybeCaller(pub Option<Caller>);

impl FromRequestParts<AppState> for MaybeCaller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeCaller(resolve(parts, state).await?))
    }
}

/// Rate-limit key for a resolved (or absent) caller: user id for sessions,
/// org id for API keys, peer IP for anonymous callers.
pub fn rate_limit_key(caller: Option<&Caller>, peer_ip: &str) -> String {
    match caller {
        Some(c) => c.org_id.map(|o| o.to_string()).unwrap_or_else(|| c.user.id.to_string()),
        None => peer_ip.to_string(),
    }
}
