use crate::models::user::User;

/// Represents an authenticated user session.
///
/// Inserted into request extensions once the session token has been resolved.
#[derive(Debug, Clone)]
pub struct Session {
    /// The opaque bearer token.
    pub token: String,
    /// The user the token resolves to.
    pub user: User,
}
