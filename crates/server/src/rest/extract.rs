use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, MatchedPath, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use idemgate_common::IDEMPOTENCY_KEY_HEADER;

use super::auth::Caller;
use super::response::ApiError;
use super::router::AppState;
use crate::coordinator::{IdempotentRequest, RequestParts};

const MAX_BODY_BYTES: usize = 1024 * 1024;

pub struct Idempotent {
    pub caller: String,
    pub request: IdempotentRequest,
    pub body: Bytes,
}

impl FromRequest<AppState> for Idempotent {
    type Rejection = Response;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Response> {
        let (mut parts, body) = req.into_parts();
        let Caller(caller) = Caller::from_request_parts(&mut parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
            .await
            .map_err(|e| {
                ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, "invalid_body", e.to_string())
                    .into_response()
            })?;

        let route = parts
            .extensions
            .get::<MatchedPath>()
            .map_or_else(|| parts.uri.path(), MatchedPath::as_str);
        let path_and_query = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path(), |pq| pq.as_str());
        let key = parts
            .headers
            .get(IDEMPOTENCY_KEY_HEADER)
            .map(|v| String::from_utf8_lossy(v.as_bytes()));

        let request = state
            .coordinator
            .resolve(&RequestParts {
                caller: &caller,
                method: parts.method.as_str(),
                route,
                path_and_query,
                key: key.as_deref(),
                body: &body,
            })
            .map_err(IntoResponse::into_response)?;

        Ok(Self {
            caller,
            request,
            body,
        })
    }
}
