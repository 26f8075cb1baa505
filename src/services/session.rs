use std::sync::Arc;

use crate::{
    crypto::token::generate_session_token,
    error::{AppError, Result},
    models::{session::Session, user::User},
    repositories::{session::SessionBackend, user::UserRepository},
};

/// Issues, looks up and revokes session tokens.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn SessionBackend>,
}

impl SessionStore {
    /// Creates a new `SessionStore` over `backend`.
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self { backend }
    }

    /// Issues a fresh token for `user`, superseding any token the user held.
    ///
    /// # Arguments
    ///
    /// * `user` - The identity (email) of the user.
    ///
    /// # Returns
    ///
    /// A `Result` containing the new token, or `SessionPersistence` if the
    /// binding could not be written.
    pub async fn create(&self, user: &str) -> Result<String> {
        let token = generate_session_token();
        self.backend.put(&token, user).await.map_err(|e| {
            tracing::error!("❌ Session write failed for {}: {}", user, e);
            AppError::SessionPersistence(e.to_string())
        })?;

        tracing::info!("✅ Session created for {}", user);
        Ok(token)
    }

    /// Returns the user bound to `token`.
    ///
    /// Fails with `SessionNotFound` when no binding exists and with
    /// `SessionPersistence` when storage cannot be read.
    pub async fn resolve(&self, token: &str) -> Result<String> {
        self.backend
            .get(token)
            .await
            .map_err(|e| AppError::SessionPersistence(e.to_string()))?
            .ok_or(AppError::SessionNotFound)
    }

    /// Revokes `token`. Revoking an unknown token succeeds.
    pub async fn destroy(&self, token: &str) -> Result<()> {
        self.backend.delete(token).await.map_err(|e| {
            tracing::error!("❌ Session delete failed: {}", e);
            AppError::SessionPersistence(e.to_string())
        })?;

        tracing::debug!("Session destroyed");
        Ok(())
    }
}

/// Turns a session token into the user it acts for.
#[derive(Clone)]
pub struct SessionResolver {
    sessions: SessionStore,
    users: Arc<dyn UserRepository>,
}

impl SessionResolver {
    /// Creates a new `SessionResolver`.
    pub fn new(sessions: SessionStore, users: Arc<dyn UserRepository>) -> Self {
        Self { sessions, users }
    }

    /// The underlying store.
    pub fn store(&self) -> &SessionStore {
        &self.sessions
    }

    /// Resolves `token` to its user.
    ///
    /// An unknown token and a token whose user was deleted both yield
    /// `SessionInvalid`. A dangling binding is destroyed on the way out.
    pub async fn resolve(&self, token: &str) -> Result<User> {
        let email = match self.sessions.resolve(token).await {
            Ok(email) => email,
            Err(AppError::SessionNotFound) => return Err(AppError::SessionInvalid),
            Err(e) => return Err(e),
        };

        match self.users.find_by_email(&email).await? {
            Some(user) => Ok(user),
            None => {
                tracing::warn!("❌ Session references missing user, revoking");
                if let Err(e) = self.sessions.destroy(token).await {
                    tracing::warn!("Could not revoke dangling session: {}", e);
                }
                Err(AppError::SessionInvalid)
            }
        }
    }

    /// Resolves `token` into a full `Session`.
    pub async fn session(&self, token: &str) -> Result<Session> {
        let user = self.resolve(token).await?;
        Ok(Session {
            token: token.to_string(),
            user,
        })
    }
}
