use super::types::ErrorResponse;
use crate::error::AuthError;
use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use tracing::{debug, error};

/// Errors returned by HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
    Auth(AuthError),
    MissingPayload,
    MissingBearer,
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn unauthorized(message: impl Into<String>) -> Response {
    let mut response = json_error(StatusCode::UNAUTHORIZED, message);
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::MissingPayload => json_error(StatusCode::BAD_REQUEST, "Missing payload"),
            Self::MissingBearer => unauthorized("Not authenticated"),
            Self::Auth(err) => {
                if err.is_unauthenticated() {
                    debug!(kind = err.kind(), "request not authenticated");
                    return unauthorized(err.to_string());
                }

                match err {
                    AuthError::InvalidCredentials | AuthError::InvalidInput(_) => {
                        json_error(StatusCode::BAD_REQUEST, err.to_string())
                    }
                    AuthError::DuplicateLogin => json_error(StatusCode::CONFLICT, err.to_string()),
                    _ => {
                        error!(kind = err.kind(), "request failed: {err}");
                        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
                    }
                }
            }
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
///
/// # Errors
/// `MissingBearer` if the header is absent or uses another scheme.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::MissingBearer)?;

    let (scheme, token) = value.split_once(' ').ok_or(ApiError::MissingBearer)?;
    let token = token.trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(ApiError::MissingBearer);
    }

    Ok(token)
}
