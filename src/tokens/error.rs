use super::TokenKind;
use thiserror::Error;

/// Why a token was rejected. The display string is the reason sent to clients.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token is invalid")]
    Invalid,
    #[error("Token has expired")]
    Expired,
    #[error("Token must be of type '{expected}'")]
    TypeMismatch { expected: TokenKind },
    #[error("Token payload missing {0}")]
    Malformed(&'static str),
    #[error("failed to encode token")]
    Encode(#[from] serde_json::Error),
}

impl TokenError {
    /// Short, stable label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::Expired => "expired",
            Self::TypeMismatch { .. } => "type_mismatch",
            Self::Malformed(_) => "malformed",
            Self::Encode(_) => "encode",
        }
    }
}
