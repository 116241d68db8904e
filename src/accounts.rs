//! Registration, login and password changes on top of the credential and token services.
//!
//! Argon2 is deliberately slow, so every hash or verification runs on tokio's blocking
//! pool. Concurrent logins verify in parallel and never stall the async workers.

use crate::{
    credentials::CredentialManager,
    directory::{DirectoryError, NewUser, User, UserDirectory},
    error::AuthError,
    tokens::{TokenKind, TokenPair, TokenService, TokenVerification},
};
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use ulid::Ulid;

const MAX_USERNAME_CHARS: usize = 50;
const MAX_PASSWORD_BYTES: usize = 256;

/// Login ids: 3 to 50 characters of letters, digits and `_ . @ -`.
#[must_use]
pub fn valid_login_id(login_id: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9_.@-]{3,50}$").is_ok_and(|re| re.is_match(login_id))
}

#[must_use]
pub fn valid_username(username: &str) -> bool {
    let count = username.chars().count();
    count > 0 && count <= MAX_USERNAME_CHARS
}

#[must_use]
pub const fn valid_password(password: &str) -> bool {
    !password.is_empty() && password.len() <= MAX_PASSWORD_BYTES
}

#[derive(Clone)]
pub struct RegisterUser {
    pub username: String,
    pub login_id: String,
    pub password: String,
}

impl std::fmt::Debug for RegisterUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterUser")
            .field("username", &self.username)
            .field("login_id", &self.login_id)
            .field("password", &"***")
            .finish()
    }
}

pub struct AccountService {
    credentials: Arc<CredentialManager>,
    tokens: Arc<TokenService>,
    directory: Arc<dyn UserDirectory>,
    // verified against when the login id is unknown, so both paths cost the same
    dummy_hash: String,
}

impl AccountService {
    /// # Errors
    /// Returns an error if the timing-equalization hash cannot be computed.
    pub fn new(
        credentials: CredentialManager,
        tokens: TokenService,
        directory: Arc<dyn UserDirectory>,
    ) -> Result<Self, AuthError> {
        let dummy_hash = credentials.set_password(&Ulid::new().to_string())?;

        Ok(Self {
            credentials: Arc::new(credentials),
            tokens: Arc::new(tokens),
            directory,
            dummy_hash,
        })
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    #[must_use]
    pub fn directory(&self) -> &dyn UserDirectory {
        self.directory.as_ref()
    }

    async fn hash_password(&self, password: String) -> Result<String, AuthError> {
        let credentials = Arc::clone(&self.credentials);

        tokio::task::spawn_blocking(move || credentials.set_password(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("password hashing task failed: {e}")))?
            .map_err(AuthError::from)
    }

    async fn verify_password(&self, password: String, hash: String) -> Result<bool, AuthError> {
        let credentials = Arc::clone(&self.credentials);

        tokio::task::spawn_blocking(move || credentials.verify_password(&password, &hash))
            .await
            .map_err(|e| AuthError::Internal(format!("password verification task failed: {e}")))
    }

    /// Create a user. The login id must not be taken.
    ///
    /// # Errors
    /// `InvalidInput` for bad fields, `DuplicateLogin` if the login id exists.
    #[instrument(skip_all, fields(login_id = %request.login_id))]
    pub async fn register(&self, request: RegisterUser) -> Result<User, AuthError> {
        let login_id = request.login_id.trim().to_string();
        let username = request.username.trim().to_string();

        if !valid_login_id(&login_id) {
            return Err(AuthError::InvalidInput("Invalid login ID".to_string()));
        }
        if !valid_username(&username) {
            return Err(AuthError::InvalidInput("Invalid username".to_string()));
        }
        if !valid_password(&request.password) {
            return Err(AuthError::InvalidInput("Invalid password".to_string()));
        }

        if self.directory.exists_by_login(&login_id).await? {
            debug!("login id already registered");
            return Err(AuthError::DuplicateLogin);
        }

        let password_hash = self.hash_password(request.password).await?;

        // a concurrent registration can still win the race; insert reports it as a duplicate
        let user = self
            .directory
            .insert(NewUser {
                username,
                login_id,
                password_hash,
            })
            .await?;

        info!(user_id = user.id, "user registered");

        Ok(user)
    }

    /// Check credentials and issue an access/refresh pair.
    ///
    /// # Errors
    /// `InvalidCredentials` for an unknown login id or a wrong password alike.
    #[instrument(skip_all, fields(login_id = %login_id))]
    pub async fn login(&self, login_id: &str, password: &str) -> Result<TokenPair, AuthError> {
        let user = self.directory.find_by_login(login_id.trim()).await?;

        let (hash, user) = match user {
            Some(user) => (user.password_hash.clone(), Some(user)),
            None => (self.dummy_hash.clone(), None),
        };

        let verified = self.verify_password(password.to_string(), hash).await?;

        match user {
            Some(user) if verified => {
                info!(user_id = user.id, "login succeeded");
                Ok(self.tokens.issue_tokens(&user)?)
            }
            _ => {
                debug!("login failed");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Resolve a bearer access token to its user.
    ///
    /// # Errors
    /// Any token failure, or `UserNotFound`.
    pub async fn authenticate(&self, access_token: &str) -> Result<User, AuthError> {
        self.tokens
            .resolve_identity(access_token, Some(TokenKind::Access))
            .await
    }

    /// # Errors
    /// Any token failure, or `UserNotFound`.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        self.tokens.refresh_access_token(refresh_token).await
    }

    #[must_use]
    pub fn verify_token(&self, token: &str) -> TokenVerification {
        self.tokens.inspect(token)
    }

    /// Replace the password of `user` after re-checking the current one.
    ///
    /// Tokens already issued stay valid until they expire.
    ///
    /// # Errors
    /// `InvalidCredentials` if `current` is wrong, `InvalidInput` for a bad new password.
    #[instrument(skip_all, fields(user_id = user.id))]
    pub async fn change_password(
        &self,
        user: &User,
        current: &str,
        new: &str,
    ) -> Result<(), AuthError> {
        if !valid_password(new) {
            return Err(AuthError::InvalidInput("Invalid password".to_string()));
        }

        if !self
            .verify_password(current.to_string(), user.password_hash.clone())
            .await?
        {
            return Err(AuthError::InvalidCredentials);
        }

        let mut updated = user.clone();
        updated.password_hash = self.hash_password(new.to_string()).await?;

        match self.directory.save(&updated).await {
            Ok(()) => {
                info!("password changed");
                Ok(())
            }
            Err(DirectoryError::NotFound) => Err(AuthError::UserNotFound),
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for AccountService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountService")
            .field("credentials", &self.credentials)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}
