use super::{
    error::ApiError,
    types::{
        AccessTokenResponse, ErrorResponse, RefreshRequest, VerifyRequest, VerifyResponse,
        TOKEN_TYPE_BEARER,
    },
};
use crate::accounts::AccountService;
use axum::{extract::Extension, Json};
use std::sync::Arc;
use tracing::instrument;

#[utoipa::path(
    post,
    path = "/user/refresh",
    request_body = RefreshRequest,
    responses (
        (status = 200, description = "A new access token", body = AccessTokenResponse),
        (status = 401, description = "Invalid, expired or non-refresh token", body = ErrorResponse),
    ),
    tag = "token",
)]
#[instrument(skip(accounts, payload))]
pub async fn refresh(
    accounts: Extension<Arc<AccountService>>,
    payload: Option<Json<RefreshRequest>>,
) -> Result<Json<AccessTokenResponse>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingPayload);
    };

    let access_token = accounts.refresh(&request.refresh_token).await?;

    Ok(Json(AccessTokenResponse {
        access_token,
        token_type: TOKEN_TYPE_BEARER.to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/token/verify",
    request_body = VerifyRequest,
    responses (
        (
            status = 200,
            description = "Verification result; claims only when valid",
            body = VerifyResponse
        ),
        (status = 400, description = "Missing payload", body = ErrorResponse),
    ),
    tag = "token",
)]
#[instrument(skip(accounts, payload))]
pub async fn verify(
    accounts: Extension<Arc<AccountService>>,
    payload: Option<Json<VerifyRequest>>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingPayload);
    };

    Ok(Json(VerifyResponse::from(
        accounts.verify_token(&request.token),
    )))
}
