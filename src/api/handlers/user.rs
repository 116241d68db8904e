use super::{
    error::{bearer_token, ApiError},
    types::{
        ChangePasswordRequest, ErrorResponse, LoginRequest, RegisterRequest, TokenPairResponse,
        TokenQuery, UserResponse, TOKEN_TYPE_BEARER,
    },
};
use crate::accounts::{AccountService, RegisterUser};
use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::instrument;

#[utoipa::path(
    post,
    path = "/user/",
    request_body = RegisterRequest,
    responses (
        (status = 201, description = "User registered", body = UserResponse),
        (status = 400, description = "Missing or invalid fields", body = ErrorResponse),
        (status = 409, description = "Login ID already registered", body = ErrorResponse),
    ),
    tag = "user",
)]
#[instrument(skip(accounts, payload))]
pub async fn register(
    accounts: Extension<Arc<AccountService>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingPayload);
    };

    let user = accounts
        .register(RegisterUser {
            username: request.username,
            login_id: request.login_id,
            password: request.password,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

#[utoipa::path(
    post,
    path = "/user/login",
    request_body = LoginRequest,
    responses (
        (status = 200, description = "Access and refresh tokens", body = TokenPairResponse),
        (status = 400, description = "Invalid login ID or password", body = ErrorResponse),
    ),
    tag = "user",
)]
#[instrument(skip(accounts, payload))]
pub async fn login(
    accounts: Extension<Arc<AccountService>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingPayload);
    };

    let pair = accounts.login(&request.login_id, &request.password).await?;

    Ok(Json(TokenPairResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        token_type: TOKEN_TYPE_BEARER.to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/user/me",
    params(TokenQuery),
    responses (
        (status = 200, description = "The authenticated user", body = UserResponse),
        (
            status = 401,
            description = "Missing, invalid or expired access token",
            body = ErrorResponse
        ),
    ),
    security(("bearer" = [])),
    tag = "user",
)]
#[instrument(skip(accounts, headers, query))]
pub async fn me(
    accounts: Extension<Arc<AccountService>>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
) -> Result<Json<UserResponse>, ApiError> {
    // the Authorization header wins over ?token=
    let token = match bearer_token(&headers) {
        Ok(token) => token,
        Err(err) => query
            .token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(err)?,
    };

    let user = accounts.authenticate(token).await?;

    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    put,
    path = "/user/password",
    request_body = ChangePasswordRequest,
    responses (
        (status = 204, description = "Password changed"),
        (
            status = 400,
            description = "Wrong current password or invalid new password",
            body = ErrorResponse
        ),
        (
            status = 401,
            description = "Missing, invalid or expired access token",
            body = ErrorResponse
        ),
    ),
    security(("bearer" = [])),
    tag = "user",
)]
#[instrument(skip(accounts, headers, payload))]
pub async fn change_password(
    accounts: Extension<Arc<AccountService>>,
    headers: HeaderMap,
    payload: Option<Json<ChangePasswordRequest>>,
) -> Result<StatusCode, ApiError> {
    let user = accounts.authenticate(bearer_token(&headers)?).await?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingPayload);
    };

    accounts
        .change_password(&user, &request.current_password, &request.new_password)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
