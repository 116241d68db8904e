//! # Passgate (user accounts & bearer-token sessions)
//!
//! `passgate` registers users, verifies their credentials and issues the bearer
//! tokens that prove identity on subsequent requests.
//!
//! ## Credentials
//!
//! Passwords are never stored or logged. A plaintext password is first reduced to a
//! salted digest, `hex(SHA-256(password || server_salt))`, and that digest is then hashed
//! with Argon2id using a random per-hash salt. The stored value is the self-describing
//! PHC string, so cost parameters can be raised without invalidating existing hashes.
//!
//! ## Tokens
//!
//! Tokens are stateless HMAC-signed JWTs carrying `sub`, `type`, `iat` and `exp`.
//! Access tokens are short-lived; refresh tokens are long-lived and only accepted by
//! the refresh flow. There is no server-side token table and no revocation: a token
//! is valid while its signature verifies, it has not expired and its `type` matches
//! the operation.
//!
//! - Refreshing does not rotate the refresh token; it stays usable until its own `exp`.
//! - A token for a user that has since been deleted fails with `UserNotFound`.
//!
//! ## Errors
//!
//! Internally every failure keeps its own kind (expired, invalid, type mismatch, ...).
//! At the HTTP boundary all of them collapse into a single `401` with a readable reason.

pub mod accounts;
pub mod api;
pub mod cli;
pub mod credentials;
pub mod directory;
pub mod error;
pub mod tokens;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
