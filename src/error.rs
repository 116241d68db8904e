use crate::{credentials::CredentialError, directory::DirectoryError, tokens::TokenError};
use thiserror::Error;

/// Failures surfaced by account and token operations.
///
/// Every variant is recoverable; callers get a typed result, never a panic.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown login id or wrong password; deliberately indistinguishable.
    #[error("Invalid login ID or password")]
    InvalidCredentials,
    #[error("Login ID already registered")]
    DuplicateLogin,
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("User not found for token")]
    UserNotFound,
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("user directory failure: {0}")]
    Directory(DirectoryError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DirectoryError> for AuthError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::DuplicateLogin => Self::DuplicateLogin,
            other => Self::Directory(other),
        }
    }
}

impl AuthError {
    /// Rejected tokens and vanished subjects mean "not authenticated" to a client.
    /// Failing to encode a token is a server fault.
    #[must_use]
    pub const fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::Token(
                TokenError::Invalid
                    | TokenError::Expired
                    | TokenError::TypeMismatch { .. }
                    | TokenError::Malformed(_)
            ) | Self::UserNotFound
        )
    }

    /// Internal diagnostic label; not meant for clients.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::DuplicateLogin => "duplicate_login",
            Self::InvalidInput(_) => "invalid_input",
            Self::Token(e) => e.kind(),
            Self::UserNotFound => "user_not_found",
            Self::Credential(_) => "credential",
            Self::Directory(_) => "directory",
            Self::Internal(_) => "internal",
        }
    }
}
