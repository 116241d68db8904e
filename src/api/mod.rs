use crate::accounts::AccountService;
use anyhow::Result;
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post, put},
    Extension, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{debug_span, error, info, Span};
use ulid::Ulid;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;
mod openapi;

pub use openapi::{openapi, ApiDoc};

use handlers::{health, token, user};

/// Build the application router with middleware and the Swagger UI.
#[must_use]
pub fn router(accounts: Arc<AccountService>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/user/", post(user::register))
        .route("/user/login", post(user::login))
        .route("/user/refresh", post(token::refresh))
        // POST is accepted as an alias of GET and is not documented
        .route("/user/me", get(user::me).post(user::me))
        .route("/user/password", put(user::change_password))
        .route("/token/verify", post(token::verify))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(accounts)),
        )
}

/// Serve the API until ctrl-c.
/// # Errors
/// Returns an error if the listener cannot bind or the server fails
pub async fn new(port: u16, accounts: Arc<AccountService>) -> Result<()> {
    let app = router(accounts);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }

    info!("Gracefully shutdown");
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let path = request.uri().path();
    let method = request.method().as_str();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    // headers are not recorded: they carry bearer tokens
    debug_span!("http-request", method, path, request_id)
}
