//! Compact HMAC-signed JWTs: `base64url(header).base64url(claims).base64url(mac)`.

use super::TokenError;
use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Sha256, Sha384, Sha512};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningAlgorithm {
    HS256,
    HS384,
    HS512,
}

impl SigningAlgorithm {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
        }
    }

    fn sign(self, key: &[u8], input: &[u8]) -> Result<Vec<u8>, TokenError> {
        macro_rules! mac {
            ($digest:ty) => {{
                let mut mac =
                    Hmac::<$digest>::new_from_slice(key).map_err(|_| TokenError::Invalid)?;
                mac.update(input);
                mac.finalize().into_bytes().to_vec()
            }};
        }

        Ok(match self {
            Self::HS256 => mac!(Sha256),
            Self::HS384 => mac!(Sha384),
            Self::HS512 => mac!(Sha512),
        })
    }

    // constant-time comparison through `Mac::verify_slice`
    fn verify(self, key: &[u8], input: &[u8], signature: &[u8]) -> bool {
        macro_rules! check {
            ($digest:ty) => {
                Hmac::<$digest>::new_from_slice(key).is_ok_and(|mut mac| {
                    mac.update(input);
                    mac.verify_slice(signature).is_ok()
                })
            };
        }

        match self {
            Self::HS256 => check!(Sha256),
            Self::HS384 => check!(Sha384),
            Self::HS512 => check!(Sha512),
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HS256" => Ok(Self::HS256),
            "HS384" => Ok(Self::HS384),
            "HS512" => Ok(Self::HS512),
            other => Err(format!(
                "unsupported signing algorithm: {other} (expected HS256, HS384 or HS512)"
            )),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: DeserializeOwned>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Invalid)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Invalid)
}

/// Sign `claims` into a compact token.
///
/// # Errors
/// Returns an error if the claims cannot be serialized.
pub fn encode<T: Serialize>(
    algorithm: SigningAlgorithm,
    key: &[u8],
    claims: &T,
) -> Result<String, TokenError> {
    let header = Header {
        alg: algorithm.as_str().to_string(),
        typ: Some("JWT".to_string()),
    };
    let signing_input = format!("{}.{}", b64e_json(&header)?, b64e_json(claims)?);
    let signature = algorithm.sign(key, signing_input.as_bytes())?;

    Ok(format!(
        "{signing_input}.{}",
        Base64UrlUnpadded::encode_string(&signature)
    ))
}

/// Verify structure, header algorithm and signature, then decode the claims.
///
/// Claims are not inspected here; expiry and type checks belong to the caller.
///
/// # Errors
/// Returns `TokenError::Invalid` for any structural or signature failure.
pub fn decode<T: DeserializeOwned>(
    algorithm: SigningAlgorithm,
    key: &[u8],
    token: &str,
) -> Result<T, TokenError> {
    let mut parts = token.trim().split('.');
    let header_b64 = parts.next().ok_or(TokenError::Invalid)?;
    let claims_b64 = parts.next().ok_or(TokenError::Invalid)?;
    let sig_b64 = parts.next().ok_or(TokenError::Invalid)?;
    if parts.next().is_some() {
        return Err(TokenError::Invalid);
    }

    let header: Header = b64d_json(header_b64)?;
    if header.alg != algorithm.as_str() {
        return Err(TokenError::Invalid);
    }

    let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| TokenError::Invalid)?;
    let signing_input = format!("{header_b64}.{claims_b64}");
    if !algorithm.verify(key, signing_input.as_bytes(), &signature) {
        return Err(TokenError::Invalid);
    }

    b64d_json(claims_b64)
}
