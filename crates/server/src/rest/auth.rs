use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};

use idemgate_common::time::now_ms;
use idemgate_common::token::validate_token;

use super::response::ApiError;
use super::router::AppState;

/// Authenticated caller identity, the `sub` claim of the bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub String);

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| {
                ApiError::new(StatusCode::UNAUTHORIZED, "unauthorized", "missing bearer token")
            })?;

        let subject = validate_token(&state.jwt_secret, token, now_ms()).map_err(|e| {
            tracing::debug!(error = %e, "bearer token rejected");
            ApiError::new(StatusCode::UNAUTHORIZED, "unauthorized", e.to_string())
        })?;
        Ok(Caller(subject))
    }
}
