//! Maps `cc_domain::Error` onto the HTTP taxonomy, attaching a correlation
//! id to every 5xx body.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use cc_domain::Error;
use serde_json::json;

/// Wraps a [`cc_domain::Error`] so it can implement `IntoResponse` from this
/// crate (the orphan rule blocks doing this on `cc_domain::Error` directly).
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = match &err {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::AuthMissing => StatusCode::UNAUTHORIZED,
            Error::AuthInvalid(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::DispatcherUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let correlation_id = uuid::Uuid::new_v4();
        if status.is_server_error() {
            tracing::error!(%correlation_id, kind = err.kind(), error = %err, "request failed");
        } else {
            tracing::warn!(kind = err.kind(), error = %err, "request rejected");
        }

        let mut body = json!({
            "error": err.kind(),
            "message": sanitized_message(&err),
        });
        if status.is_server_error() {
            body["correlation_id"] = json!(correlation_id.to_string());
        }

        let mut response = (status, Json(body)).into_response();
        match &err {
            Error::RateLimited { retry_after_secs } => {
                if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                    response.headers_mut().insert("Retry-After", value);
                }
            }
            Error::QuotaExceeded { .. } => {
                if let Ok(value) = HeaderValue::from_str(&seconds_until_midnight_utc().to_string()) {
                    response.headers_mut().insert("Retry-After", value);
                }
            }
            _ => {}
        }
        response
    }
}

/// Internal errors never echo their message to the caller — only the
/// correlation id, which a log line can be matched against.
fn sanitized_message(err: &Error) -> String {
    match err {
        Error::Internal(_) | Error::StorageUnavailable(_) | Error::DispatcherUnavailable(_) => {
            "an internal error occurred".to_string()
        }
        other => other.to_string(),
    }
}

fn seconds_until_midnight_utc() -> i64 {
    let now = chrono::Utc::now();
    let tomorrow = (now.date_naive() + chrono::Duration::days(1)).and_hms_opt(0, 0, 0).unwrap();
    (tomorrow.and_utc() - now).num_seconds().max(1)
}

pub type ApiResult<T> = Result<T, ApiError>;
