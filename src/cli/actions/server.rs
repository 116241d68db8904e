use crate::{
    accounts::AccountService,
    api,
    credentials::{CredentialManager, PasswordConfig},
    directory::{MemoryUserDirectory, PgUserDirectory, UserDirectory},
    tokens::{SigningAlgorithm, TokenConfig, TokenService},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};
use url::Url;

const MEMORY_DSN_SCHEME: &str = "memory";

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub max_connections: u32,
    pub secret_key: SecretString,
    pub algorithm: SigningAlgorithm,
    pub access_minutes: u64,
    pub refresh_days: u64,
    pub password_salt: SecretString,
    pub hash_memory_kib: u32,
    pub hash_iterations: u32,
    pub hash_parallelism: u32,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is invalid, the database is unreachable,
/// or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let password_config = PasswordConfig::new(args.password_salt).with_cost(
        args.hash_memory_kib,
        args.hash_iterations,
        args.hash_parallelism,
    );

    let token_config = TokenConfig::new(
        args.secret_key,
        args.algorithm,
        args.access_minutes,
        args.refresh_days,
    )
    .context("Invalid token configuration")?;

    log_startup_args(&startup_entries(
        args.port,
        &args.dsn,
        args.max_connections,
        &password_config,
        &token_config,
    ));

    let credentials =
        CredentialManager::new(password_config).context("Invalid password hashing parameters")?;

    let directory = connect_directory(&args.dsn, args.max_connections).await?;

    let tokens = TokenService::new(token_config, Arc::clone(&directory));
    let accounts = AccountService::new(credentials, tokens, directory)?;

    api::new(args.port, Arc::new(accounts)).await
}

async fn connect_directory(dsn: &str, max_connections: u32) -> Result<Arc<dyn UserDirectory>> {
    let parsed = Url::parse(dsn).context("Invalid database connection string")?;

    if parsed.scheme() == MEMORY_DSN_SCHEME {
        warn!("Using the in-memory user directory, users are lost on restart");
        return Ok(Arc::new(MemoryUserDirectory::new()));
    }

    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(max_connections)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn)
        .await
        .context("Failed to connect to database")?;

    let directory = PgUserDirectory::new(pool);
    directory
        .ensure_schema()
        .await
        .context("Failed to create the users table")?;

    Ok(Arc::new(directory))
}

fn startup_entries(
    port: u16,
    dsn: &str,
    max_connections: u32,
    password: &PasswordConfig,
    tokens: &TokenConfig,
) -> Vec<(&'static str, String)> {
    vec![
        ("listen", format!("tcp:{port}")),
        ("dsn", redact_dsn(dsn)),
        ("max_connections", max_connections.to_string()),
        ("algorithm", tokens.algorithm().to_string()),
        ("access_ttl", format!("{}s", tokens.access_ttl().as_secs())),
        ("refresh_ttl", format!("{}s", tokens.refresh_ttl().as_secs())),
        (
            "argon2",
            format!(
                "m={},t={},p={}",
                password.memory_kib(),
                password.iterations(),
                password.parallelism()
            ),
        ),
    ]
}

fn log_startup_args(entries: &[(&'static str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "passgate {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        trimmed[..7].to_string()
    } else {
        trimmed.to_string()
    }
}
