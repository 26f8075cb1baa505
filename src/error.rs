use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A database error.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// A connection pool error.
    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// A Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The request digest, timestamp or body could not be validated.
    #[error("Request authentication failed: {0}")]
    RequestAuthentication(String),

    /// The session token is unknown or references a user that no longer exists.
    #[error("Session is not valid")]
    SessionInvalid,

    /// No session is bound to the token.
    #[error("Session not found")]
    SessionNotFound,

    /// The session storage failed to create or remove a binding.
    #[error("Session persistence failed: {0}")]
    SessionPersistence(String),

    /// The requested user does not exist.
    #[error("User not found")]
    UserNotFound,

    /// The submitted user data is not acceptable.
    #[error("User not valid: {0}")]
    UserInvalid(String),

    /// The credentials did not match a user.
    #[error("Could not login")]
    CouldNotLogin,

    /// A post could not be stored.
    #[error("Could not post message")]
    CouldNotPostMessage,

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A multipart body could not be read.
    #[error("Multipart error: {0}")]
    Multipart(String),

    /// No stored media file has the requested name.
    #[error("Media not found")]
    MediaNotFound,

    /// A resource not found error.
    #[error("Resource not found")]
    NotFound,

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Body message shared by every request or session rejection, so callers
/// cannot tell a bad signature from a bad token.
const UNAUTHENTICATED_MESSAGE: &str = "Could not authenticate the request.";

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// The HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::RequestAuthentication(_)
            | AppError::SessionInvalid
            | AppError::SessionNotFound
            | AppError::CouldNotLogin => StatusCode::UNAUTHORIZED,
            AppError::UserNotFound
            | AppError::UserInvalid(_)
            | AppError::CouldNotPostMessage
            | AppError::Validation(_)
            | AppError::Multipart(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound | AppError::MediaNotFound => StatusCode::NOT_FOUND,
            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Redis(_)
            | AppError::SessionPersistence(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                "Internal server error.".to_string()
            }

            AppError::Pool(ref e) => {
                tracing::error!("Pool error: {}", e);
                "Internal server error.".to_string()
            }

            AppError::Redis(ref e) => {
                tracing::error!("Redis error: {}", e);
                "Internal server error.".to_string()
            }

            AppError::RequestAuthentication(ref reason) => {
                tracing::warn!("Request rejected: {}", reason);
                UNAUTHENTICATED_MESSAGE.to_string()
            }

            AppError::SessionInvalid | AppError::SessionNotFound => {
                tracing::warn!("Request rejected: session is not valid");
                UNAUTHENTICATED_MESSAGE.to_string()
            }

            AppError::SessionPersistence(ref msg) => {
                tracing::error!("Session persistence error: {}", msg);
                "Could not create session.".to_string()
            }

            AppError::UserNotFound => {
                tracing::debug!("User not found");
                "User not found.".to_string()
            }

            AppError::UserInvalid(ref msg) => {
                tracing::debug!("User not valid: {}", msg);
                msg.clone()
            }

            AppError::CouldNotLogin => {
                tracing::warn!("Login failed");
                "Could not login, be sure that your credentials are valid.".to_string()
            }

            AppError::CouldNotPostMessage => {
                tracing::debug!("Message rejected");
                "Could not post message.".to_string()
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                msg.clone()
            }

            AppError::Multipart(ref msg) => {
                tracing::debug!("Multipart error: {}", msg);
                "Could not post message.".to_string()
            }

            AppError::NotFound => {
                tracing::debug!("Resource not found");
                "API endpoint not found.".to_string()
            }

            AppError::MediaNotFound => {
                tracing::debug!("Media not found");
                "Could not find media!".to_string()
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error.".to_string()
            }
        };

        let status = self.status();
        let body = sonic_rs::to_string(&sonic_rs::json!({
            "success": false,
            "message": message
        }))
        .unwrap_or_else(|_| r#"{"success":false,"message":"Internal server error."}"#.to_string());

        (status, [(http::header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}
