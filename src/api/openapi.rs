use crate::api::handlers::{health, token, types, user};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        user::register,
        user::login,
        user::me,
        user::change_password,
        token::refresh,
        token::verify,
    ),
    components(schemas(
        health::Health,
        types::RegisterRequest,
        types::LoginRequest,
        types::RefreshRequest,
        types::ChangePasswordRequest,
        types::VerifyRequest,
        types::UserResponse,
        types::TokenPairResponse,
        types::AccessTokenResponse,
        types::VerifyResponse,
        types::ErrorResponse,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "user", description = "Registration, login and the authenticated user"),
        (name = "token", description = "Token refresh and verification"),
        (name = "health", description = "Service status"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
