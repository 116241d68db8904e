use crate::{directory::User, tokens::TokenVerification};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::{IntoParams, ToSchema};

pub const TOKEN_TYPE_BEARER: &str = "bearer";

#[derive(ToSchema, Deserialize, Clone)]
pub struct RegisterRequest {
    pub username: String,
    pub login_id: String,
    pub password: String,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("login_id", &self.login_id)
            .field("password", &"***")
            .finish()
    }
}

#[derive(ToSchema, Deserialize, Clone)]
pub struct LoginRequest {
    pub login_id: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("login_id", &self.login_id)
            .field("password", &"***")
            .finish()
    }
}

/// Access token passed in the query string, for clients that cannot set headers.
#[derive(IntoParams, Deserialize, Default, Clone)]
#[into_params(parameter_in = Query)]
pub struct TokenQuery {
    pub token: Option<String>,
}

impl fmt::Debug for TokenQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenQuery")
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(ToSchema, Deserialize, Clone)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

impl fmt::Debug for RefreshRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshRequest")
            .field("refresh_token", &"***")
            .finish()
    }
}

#[derive(ToSchema, Deserialize, Clone)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

impl fmt::Debug for ChangePasswordRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangePasswordRequest")
            .field("current_password", &"***")
            .field("new_password", &"***")
            .finish()
    }
}

#[derive(ToSchema, Deserialize, Clone)]
pub struct VerifyRequest {
    pub token: String,
}

impl fmt::Debug for VerifyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifyRequest").field("token", &"***").finish()
    }
}

/// Public view of a user; the password hash never leaves the service.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub login_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            login_id: user.login_id,
            created_at: user.created_at,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl From<TokenVerification> for VerifyResponse {
    fn from(verification: TokenVerification) -> Self {
        Self {
            valid: verification.valid,
            sub: verification.sub,
            exp: verification.exp,
            iat: verification.iat,
            kind: verification.kind.map(|kind| kind.as_str().to_string()),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
pub struct ErrorResponse {
    pub error: String,
}
