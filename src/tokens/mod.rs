//! Access/refresh token issuance, decoding and refresh.
//!
//! Tokens are stateless: validity is a function of signature, current time and
//! `type` only. Nothing is stored server-side, so nothing can be revoked; a refresh
//! token stays usable until its own `exp`, however many access tokens it mints.
//!
//! Decoding checks, in order: structure and header algorithm, signature, claims JSON,
//! `exp` (expired when `exp <= now`), expected `type`, then `sub` and `iat`.

mod clock;
mod error;
pub mod jwt;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::TokenError;
pub use jwt::SigningAlgorithm;

use crate::{
    directory::{User, UserDirectory},
    error::AuthError,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, instrument};
use ulid::Ulid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "access" => Some(Self::Access),
            "refresh" => Some(Self::Refresh),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verified token payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: i64,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
    pub jti: Option<String>,
}

#[derive(Serialize)]
struct WireClaims<'a> {
    sub: String,
    #[serde(rename = "type")]
    kind: TokenKind,
    iat: i64,
    exp: i64,
    jti: &'a str,
}

// Everything optional so a missing claim is reported as malformed, not invalid.
#[derive(Deserialize)]
struct RawClaims {
    sub: Option<Value>,
    #[serde(rename = "type")]
    kind: Option<String>,
    iat: Option<i64>,
    exp: Option<i64>,
    jti: Option<String>,
}

fn parse_subject(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenConfigError {
    #[error("secret key must not be empty")]
    EmptySecret,
    #[error("{0} lifetime must be greater than zero")]
    ZeroLifetime(&'static str),
}

#[derive(Clone)]
pub struct TokenConfig {
    secret_key: SecretString,
    algorithm: SigningAlgorithm,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenConfig {
    /// # Errors
    /// Returns an error for an empty secret or a zero lifetime.
    pub fn new(
        secret_key: SecretString,
        algorithm: SigningAlgorithm,
        access_minutes: u64,
        refresh_days: u64,
    ) -> Result<Self, TokenConfigError> {
        if secret_key.expose_secret().is_empty() {
            return Err(TokenConfigError::EmptySecret);
        }
        if access_minutes == 0 {
            return Err(TokenConfigError::ZeroLifetime("access token"));
        }
        if refresh_days == 0 {
            return Err(TokenConfigError::ZeroLifetime("refresh token"));
        }

        Ok(Self {
            secret_key,
            algorithm,
            access_ttl: Duration::from_secs(access_minutes.saturating_mul(60)),
            refresh_ttl: Duration::from_secs(refresh_days.saturating_mul(86_400)),
        })
    }

    #[must_use]
    pub const fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    #[must_use]
    pub const fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    #[must_use]
    pub const fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    const fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret_key", &"***")
            .field("algorithm", &self.algorithm)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Result of inspecting a token without acting on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenVerification {
    pub valid: bool,
    pub sub: Option<i64>,
    pub exp: Option<i64>,
    pub iat: Option<i64>,
    pub kind: Option<TokenKind>,
}

pub struct TokenService {
    config: TokenConfig,
    clock: Arc<dyn Clock>,
    directory: Arc<dyn UserDirectory>,
}

impl TokenService {
    #[must_use]
    pub fn new(config: TokenConfig, directory: Arc<dyn UserDirectory>) -> Self {
        Self::with_clock(config, directory, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(
        config: TokenConfig,
        directory: Arc<dyn UserDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            clock,
            directory,
        }
    }

    fn key(&self) -> &[u8] {
        self.config.secret_key.expose_secret().as_bytes()
    }

    fn generate(&self, user_id: i64, kind: TokenKind) -> Result<String, TokenError> {
        let iat = self.clock.now();
        let ttl = i64::try_from(self.config.ttl(kind).as_secs()).unwrap_or(i64::MAX);
        let jti = Ulid::new().to_string();
        let claims = WireClaims {
            sub: user_id.to_string(),
            kind,
            iat,
            exp: iat.saturating_add(ttl),
            jti: &jti,
        };

        jwt::encode(self.config.algorithm, self.key(), &claims)
    }

    /// Issue a fresh access/refresh pair for `user`.
    ///
    /// # Errors
    /// Returns an error only if the claims cannot be serialized.
    #[instrument(skip_all, fields(user_id = user.id))]
    pub fn issue_tokens(&self, user: &User) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.generate(user.id, TokenKind::Access)?,
            refresh_token: self.generate(user.id, TokenKind::Refresh)?,
        })
    }

    /// # Errors
    /// Returns an error only if the claims cannot be serialized.
    pub fn issue_access_token(&self, user_id: i64) -> Result<String, TokenError> {
        self.generate(user_id, TokenKind::Access)
    }

    /// Verify `token` and return its claims, optionally requiring a token type.
    ///
    /// # Errors
    /// `Invalid` for bad structure or signature, `Expired` once `now >= exp`,
    /// `TypeMismatch` for the wrong `type`, `Malformed` for missing claims.
    pub fn decode(&self, token: &str, expected: Option<TokenKind>) -> Result<Claims, TokenError> {
        let raw: RawClaims = jwt::decode(self.config.algorithm, self.key(), token)?;

        let exp = raw.exp.ok_or(TokenError::Malformed("expiry"))?;
        if exp <= self.clock.now() {
            return Err(TokenError::Expired);
        }

        let kind = raw.kind.as_deref().and_then(TokenKind::parse);
        let kind = match (expected, kind) {
            (Some(expected), Some(kind)) if kind == expected => kind,
            (Some(expected), _) => return Err(TokenError::TypeMismatch { expected }),
            (None, Some(kind)) => kind,
            (None, None) => return Err(TokenError::Malformed("type")),
        };

        let sub = raw
            .sub
            .as_ref()
            .and_then(parse_subject)
            .ok_or(TokenError::Malformed("subject"))?;
        let iat = raw.iat.ok_or(TokenError::Malformed("issued-at"))?;

        Ok(Claims {
            sub,
            kind,
            iat,
            exp,
            jti: raw.jti,
        })
    }

    /// Decode `token` and load the user it names.
    ///
    /// # Errors
    /// Any decode failure, or `UserNotFound` if the subject no longer exists.
    #[instrument(skip_all, fields(expected = ?expected))]
    pub async fn resolve_identity(
        &self,
        token: &str,
        expected: Option<TokenKind>,
    ) -> Result<User, AuthError> {
        let claims = self.decode(token, expected).inspect_err(|e| {
            debug!(kind = e.kind(), "token rejected");
        })?;

        self.directory
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Mint a new access token from a valid refresh token.
    ///
    /// The refresh token itself is left untouched and remains valid until it expires.
    ///
    /// # Errors
    /// Any decode failure (including a non-refresh token), or `UserNotFound`.
    #[instrument(skip_all)]
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, AuthError> {
        let user = self
            .resolve_identity(refresh_token, Some(TokenKind::Refresh))
            .await?;

        debug!(user_id = user.id, "issuing access token from refresh token");

        Ok(self.issue_access_token(user.id)?)
    }

    /// Report whether `token` currently verifies, with its claims when it does.
    #[must_use]
    pub fn inspect(&self, token: &str) -> TokenVerification {
        match self.decode(token, None) {
            Ok(claims) => TokenVerification {
                valid: true,
                sub: Some(claims.sub),
                exp: Some(claims.exp),
                iat: Some(claims.iat),
                kind: Some(claims.kind),
            },
            Err(e) => {
                debug!(kind = e.kind(), "token inspection failed");
                TokenVerification::default()
            }
        }
    }
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
