use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use passgate::{
    accounts::AccountService,
    api,
    credentials::{CredentialManager, PasswordConfig},
    directory::{DirectoryError, MemoryUserDirectory, NewUser, User, UserDirectory},
    tokens::{ManualClock, SigningAlgorithm, TokenConfig, TokenService},
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const NOW: i64 = 1_700_000_000;

struct TestApp {
    router: Router,
    clock: Arc<ManualClock>,
    directory: Arc<MemoryUserDirectory>,
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

fn accounts_over(
    directory: Arc<dyn UserDirectory>,
    clock: Arc<ManualClock>,
) -> Result<AccountService> {
    let credentials = CredentialManager::new(
        PasswordConfig::new(SecretString::from("integration-salt".to_string())).with_cost(64, 1, 1),
    )?;
    let config = TokenConfig::new(
        SecretString::from("integration-secret".to_string()),
        SigningAlgorithm::HS256,
        30,
        7,
    )?;
    let tokens = TokenService::with_clock(config, Arc::clone(&directory), clock);
    Ok(AccountService::new(credentials, tokens, directory)?)
}

fn app() -> Result<TestApp> {
    let directory = Arc::new(MemoryUserDirectory::new());
    let clock = Arc::new(ManualClock::new(NOW));
    let accounts = accounts_over(directory.clone(), clock.clone())?;

    Ok(TestApp {
        router: api::router(Arc::new(accounts)),
        clock,
        directory,
    })
}

impl TestApp {
    async fn send(
        &self,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> Result<Reply> {
        send(&self.router, method, uri, bearer, body).await
    }

    async fn register(&self, username: &str, login_id: &str, password: &str) -> Result<Reply> {
        self.send(
            Method::POST,
            "/user/",
            None,
            Some(json!({"username": username, "login_id": login_id, "password": password})),
        )
        .await
    }

    async fn login(&self, login_id: &str, password: &str) -> Result<Reply> {
        self.send(
            Method::POST,
            "/user/login",
            None,
            Some(json!({"login_id": login_id, "password": password})),
        )
        .await
    }
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> Result<Reply> {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body)?))?,
        None => request.body(Body::empty())?,
    };

    let response = router.clone().oneshot(request).await?;
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };

    Ok(Reply {
        status,
        headers,
        body,
    })
}

fn token<'a>(reply: &'a Reply, field: &str) -> Result<&'a str> {
    reply.body[field]
        .as_str()
        .with_context(|| format!("missing {field} in {}", reply.body))
}

#[tokio::test]
async fn register_login_and_use_tokens() -> Result<()> {
    let app = app()?;

    let created = app.register("Alice", "alice", "pw123").await?;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["login_id"], "alice");
    assert_eq!(created.body["username"], "Alice");
    assert!(created.body.get("password_hash").is_none());
    let alice_id = created.body["id"].as_i64().context("id")?;

    let login = app.login("alice", "pw123").await?;
    assert_eq!(login.status, StatusCode::OK);
    assert_eq!(login.body["token_type"], "bearer");
    let access = token(&login, "access_token")?.to_string();
    let refresh = token(&login, "refresh_token")?.to_string();

    for method in [Method::GET, Method::POST] {
        let me = app.send(method, "/user/me", Some(access.as_str()), None).await?;
        assert_eq!(me.status, StatusCode::OK);
        assert_eq!(me.body["id"], alice_id);
        assert_eq!(me.body["login_id"], "alice");
    }

    // past the 30 minute access lifetime
    app.clock.advance(31 * 60);
    let expired = app.send(Method::GET, "/user/me", Some(access.as_str()), None).await?;
    assert_eq!(expired.status, StatusCode::UNAUTHORIZED);
    assert_eq!(expired.body["error"], "Token has expired");

    let refreshed = app
        .send(
            Method::POST,
            "/user/refresh",
            None,
            Some(json!({"refresh_token": refresh})),
        )
        .await?;
    assert_eq!(refreshed.status, StatusCode::OK);
    assert_eq!(refreshed.body["token_type"], "bearer");
    assert!(refreshed.body.get("refresh_token").is_none());

    let new_access = token(&refreshed, "access_token")?;
    let me = app.send(Method::GET, "/user/me", Some(new_access), None).await?;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["login_id"], "alice");
    Ok(())
}

#[tokio::test]
async fn wrong_password_and_unknown_login_are_indistinguishable() -> Result<()> {
    let app = app()?;
    app.register("Alice", "alice", "pw123").await?;

    let wrong = app.login("alice", "wrong").await?;
    let unknown = app.login("nobody", "pw123").await?;

    assert_eq!(wrong.status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong.status, unknown.status);
    assert_eq!(wrong.body, unknown.body);
    assert_eq!(wrong.body, json!({"error": "Invalid login ID or password"}));
    Ok(())
}

#[tokio::test]
async fn duplicate_login_is_rejected_without_touching_the_original() -> Result<()> {
    let app = app()?;
    let first = app.register("Alice", "alice", "pw123").await?;
    assert_eq!(first.status, StatusCode::CREATED);

    let second = app.register("Impostor", "alice", "other").await?;
    assert_eq!(second.status, StatusCode::CONFLICT);
    assert_eq!(second.body["error"], "Login ID already registered");
    assert_eq!(app.directory.len().await, 1);

    assert_eq!(app.login("alice", "pw123").await?.status, StatusCode::OK);
    assert_eq!(app.login("alice", "other").await?.status, StatusCode::BAD_REQUEST);

    let stored = app
        .directory
        .find_by_login("alice")
        .await?
        .context("alice is gone")?;
    assert_eq!(stored.username, "Alice");
    Ok(())
}

#[tokio::test]
async fn invalid_registration_input() -> Result<()> {
    let app = app()?;

    let empty_password = app.register("Alice", "alice", "").await?;
    assert_eq!(empty_password.status, StatusCode::BAD_REQUEST);

    let bad_login = app.register("Alice", "a", "pw123").await?;
    assert_eq!(bad_login.status, StatusCode::BAD_REQUEST);

    let missing = app.send(Method::POST, "/user/", None, None).await?;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.body["error"], "Missing payload");

    assert!(app.directory.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn token_types_are_not_interchangeable() -> Result<()> {
    let app = app()?;
    app.register("Alice", "alice", "pw123").await?;
    let login = app.login("alice", "pw123").await?;
    let access = token(&login, "access_token")?;
    let refresh = token(&login, "refresh_token")?;

    let me = app.send(Method::GET, "/user/me", Some(refresh), None).await?;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
    assert_eq!(me.body["error"], "Token must be of type 'access'");

    let refreshed = app
        .send(
            Method::POST,
            "/user/refresh",
            None,
            Some(json!({"refresh_token": access})),
        )
        .await?;
    assert_eq!(refreshed.status, StatusCode::UNAUTHORIZED);
    assert_eq!(refreshed.body["error"], "Token must be of type 'refresh'");
    Ok(())
}

#[tokio::test]
async fn refresh_is_repeatable_and_yields_distinct_tokens() -> Result<()> {
    let app = app()?;
    app.register("Alice", "alice", "pw123").await?;
    let login = app.login("alice", "pw123").await?;
    let refresh = json!({"refresh_token": token(&login, "refresh_token")?});

    let first = app
        .send(Method::POST, "/user/refresh", None, Some(refresh.clone()))
        .await?;
    app.clock.advance(1);
    let second = app
        .send(Method::POST, "/user/refresh", None, Some(refresh))
        .await?;

    let first = token(&first, "access_token")?;
    let second = token(&second, "access_token")?;
    assert_ne!(first, second);

    let first = app
        .send(Method::POST, "/token/verify", None, Some(json!({"token": first})))
        .await?;
    let second = app
        .send(Method::POST, "/token/verify", None, Some(json!({"token": second})))
        .await?;
    assert_eq!(first.body["valid"], true);
    assert_eq!(second.body["valid"], true);
    let first_iat = first.body["iat"].as_i64().context("iat")?;
    let second_iat = second.body["iat"].as_i64().context("iat")?;
    assert!(second_iat > first_iat);
    Ok(())
}

#[tokio::test]
async fn verify_reports_claims_only_for_valid_tokens() -> Result<()> {
    let app = app()?;
    let created = app.register("Alice", "alice", "pw123").await?;
    let login = app.login("alice", "pw123").await?;
    let access = token(&login, "access_token")?;

    let valid = app
        .send(Method::POST, "/token/verify", None, Some(json!({"token": access})))
        .await?;
    assert_eq!(valid.status, StatusCode::OK);
    assert_eq!(valid.body["valid"], true);
    assert_eq!(valid.body["sub"], created.body["id"]);
    assert_eq!(valid.body["type"], "access");
    assert_eq!(valid.body["iat"], NOW);
    assert_eq!(valid.body["exp"], NOW + 30 * 60);

    let garbage = app
        .send(Method::POST, "/token/verify", None, Some(json!({"token": "not.a.token"})))
        .await?;
    assert_eq!(garbage.status, StatusCode::OK);
    assert_eq!(garbage.body, json!({"valid": false}));
    Ok(())
}

#[tokio::test]
async fn me_requires_a_bearer_token() -> Result<()> {
    let app = app()?;

    let missing = app.send(Method::GET, "/user/me", None, None).await?;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.body["error"], "Not authenticated");
    assert_eq!(
        missing.headers.get(header::WWW_AUTHENTICATE).map(|v| v.as_bytes()),
        Some(&b"Bearer"[..])
    );

    let garbage = app.send(Method::GET, "/user/me", Some("garbage"), None).await?;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
    assert_eq!(garbage.body["error"], "Token is invalid");
    Ok(())
}

#[tokio::test]
async fn me_accepts_token_in_query_string() -> Result<()> {
    let app = app()?;
    app.register("Alice", "alice", "pw123").await?;
    let login = app.login("alice", "pw123").await?;
    let access = token(&login, "access_token")?;
    let refresh = token(&login, "refresh_token")?;

    for method in [Method::GET, Method::POST] {
        let me = app
            .send(method, &format!("/user/me?token={access}"), None, None)
            .await?;
        assert_eq!(me.status, StatusCode::OK);
        assert_eq!(me.body["login_id"], "alice");
    }

    let wrong_type = app
        .send(Method::GET, &format!("/user/me?token={refresh}"), None, None)
        .await?;
    assert_eq!(wrong_type.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_type.body["error"], "Token must be of type 'access'");

    // header takes precedence over the query string
    let both = app
        .send(
            Method::GET,
            &format!("/user/me?token={access}"),
            Some("garbage"),
            None,
        )
        .await?;
    assert_eq!(both.status, StatusCode::UNAUTHORIZED);
    assert_eq!(both.body["error"], "Token is invalid");

    let empty = app.send(Method::GET, "/user/me?token=", None, None).await?;
    assert_eq!(empty.status, StatusCode::UNAUTHORIZED);
    assert_eq!(empty.body["error"], "Not authenticated");
    Ok(())
}

#[tokio::test]
async fn deleted_user_token_is_unauthenticated() -> Result<()> {
    let app = app()?;
    let created = app.register("Alice", "alice", "pw123").await?;
    let login = app.login("alice", "pw123").await?;
    let access = token(&login, "access_token")?;

    app.directory
        .remove(created.body["id"].as_i64().context("id")?)
        .await;

    let me = app.send(Method::GET, "/user/me", Some(access), None).await?;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
    assert_eq!(me.body["error"], "User not found for token");
    Ok(())
}

#[tokio::test]
async fn change_password_flow() -> Result<()> {
    let app = app()?;
    app.register("Alice", "alice", "pw123").await?;
    let login = app.login("alice", "pw123").await?;
    let access = token(&login, "access_token")?;

    let wrong = app
        .send(
            Method::PUT,
            "/user/password",
            Some(access),
            Some(json!({"current_password": "nope", "new_password": "pw456"})),
        )
        .await?;
    assert_eq!(wrong.status, StatusCode::BAD_REQUEST);

    let changed = app
        .send(
            Method::PUT,
            "/user/password",
            Some(access),
            Some(json!({"current_password": "pw123", "new_password": "pw456"})),
        )
        .await?;
    assert_eq!(changed.status, StatusCode::NO_CONTENT);

    assert_eq!(app.login("alice", "pw123").await?.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.login("alice", "pw456").await?.status, StatusCode::OK);

    let anonymous = app
        .send(
            Method::PUT,
            "/user/password",
            None,
            Some(json!({"current_password": "pw456", "new_password": "pw789"})),
        )
        .await?;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn health_reports_build_and_directory() -> Result<()> {
    let app = app()?;

    let health = app.send(Method::GET, "/health", None, None).await?;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["name"], env!("CARGO_PKG_NAME"));
    assert_eq!(health.body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(health.body["database"], "ok");
    let x_app = health
        .headers
        .get("X-App")
        .and_then(|v| v.to_str().ok())
        .context("missing X-App")?;
    assert!(x_app.starts_with(&format!(
        "{}:{}:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )));

    let head = app.send(Method::HEAD, "/health", None, None).await?;
    assert_eq!(head.status, StatusCode::OK);
    assert_eq!(head.body, Value::Null);
    Ok(())
}

struct UnreachableDirectory;

#[async_trait]
impl UserDirectory for UnreachableDirectory {
    async fn find_by_id(&self, _id: i64) -> Result<Option<User>, DirectoryError> {
        Err(DirectoryError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn find_by_login(&self, _login_id: &str) -> Result<Option<User>, DirectoryError> {
        Err(DirectoryError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn exists_by_login(&self, _login_id: &str) -> Result<bool, DirectoryError> {
        Err(DirectoryError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn insert(&self, _user: NewUser) -> Result<User, DirectoryError> {
        Err(DirectoryError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn save(&self, _user: &User) -> Result<(), DirectoryError> {
        Err(DirectoryError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn ping(&self) -> Result<(), DirectoryError> {
        Err(DirectoryError::Database(sqlx::Error::PoolTimedOut))
    }
}

#[tokio::test]
async fn unreachable_directory() -> Result<()> {
    let accounts = accounts_over(
        Arc::new(UnreachableDirectory),
        Arc::new(ManualClock::new(NOW)),
    )?;
    let router = api::router(Arc::new(accounts));

    let health = send(&router, Method::GET, "/health", None, None).await?;
    assert_eq!(health.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health.body["database"], "error");

    // internal failures never leak details
    let login = send(
        &router,
        Method::POST,
        "/user/login",
        None,
        Some(json!({"login_id": "alice", "password": "pw123"})),
    )
    .await?;
    assert_eq!(login.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(login.body, json!({"error": "Internal server error"}));
    Ok(())
}

#[tokio::test]
async fn request_id_is_generated_or_propagated() -> Result<()> {
    let app = app()?;

    let generated = app.send(Method::GET, "/health", None, None).await?;
    let id = generated
        .headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .context("missing x-request-id")?;
    assert!(ulid::Ulid::from_string(id).is_ok());

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "caller-chosen")
        .body(Body::empty())?;
    let response = app.router.clone().oneshot(request).await?;
    assert_eq!(
        response.headers().get("x-request-id").map(|v| v.as_bytes()),
        Some(&b"caller-chosen"[..])
    );
    Ok(())
}

#[tokio::test]
async fn openapi_document_is_served() -> Result<()> {
    let app = app()?;

    let doc = app.send(Method::GET, "/api-docs/openapi.json", None, None).await?;
    assert_eq!(doc.status, StatusCode::OK);
    assert!(doc.body["paths"]["/user/login"].is_object());
    assert!(doc.body["paths"]["/token/verify"].is_object());
    Ok(())
}
