use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, Result},
    models::session::Session,
    services::auth::{self as auth_service, NewUser},
    state::AppState,
    validation::auth::{report_to_error, validate_gender},
};

/// The request payload for user registration.
#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[garde(email)]
    pub email: String,
    #[garde(length(min = 1))]
    pub password: String,
    #[garde(length(min = 1, max = 255))]
    pub first_name: String,
    #[garde(length(min = 1, max = 255))]
    pub family_name: String,
    #[garde(custom(validate_gender))]
    pub gender: String,
    #[garde(length(min = 1, max = 255))]
    pub city: String,
    #[garde(length(min = 1, max = 255))]
    pub country: String,
}

/// The request payload for user login.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// The request payload for changing a user's password.
#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// The envelope every successful API response uses.
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// A successful response carrying `data`.
    pub fn ok(message: &str, data: T) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// A successful response without data.
    pub fn message(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            data: None,
        }
    }
}

/// Unwraps a JSON body, turning extractor rejections into API errors.
pub fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| AppError::Validation(format!("Your request is probably missing data: {}", e.body_text())))
}

/// Handles user registration.
#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Response> {
    let payload = json_body(payload).map_err(|_| AppError::UserInvalid("User not valid.".to_string()))?;
    tracing::info!("📝 Register attempt: {}", payload.email);
    payload.validate().map_err(report_to_error)?;

    let user = auth_service::create_user(
        state.users.as_ref(),
        NewUser {
            email: payload.email.trim().to_string(),
            password: payload.password,
            first_name: payload.first_name,
            family_name: payload.family_name,
            gender: payload.gender,
            city: payload.city,
            country: payload.country,
        },
        state.config.min_password_length,
    )
    .await?;

    tracing::info!("✅ User registered: {}", user.email);

    Ok((StatusCode::CREATED, Json(ApiResponse::message("User was added."))).into_response())
}

/// Handles user login.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response> {
    let payload = json_body(payload).map_err(|_| AppError::CouldNotLogin)?;
    tracing::info!("🔐 Login attempt: {}", payload.email);

    let token = auth_service::login(
        state.users.as_ref(),
        &state.sessions,
        payload.email.trim(),
        &payload.password,
    )
    .await?;

    Ok((StatusCode::OK, Json(ApiResponse::ok("Login successful.", token))).into_response())
}

/// Handles user logout.
///
/// Live connections backed by the session close on their next frame.
#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Response> {
    tracing::info!("👋 Logout for user: {}", session.user.email);

    state.sessions.destroy(&session.token).await?;

    tracing::info!("✅ User logged out: {}", session.user.email);

    Ok((StatusCode::OK, Json(ApiResponse::message("Logout successful."))).into_response())
}

/// Handles changing a user's password.
#[axum::debug_handler]
pub async fn change_password(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    payload: std::result::Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Response> {
    let payload = json_body(payload)?;

    auth_service::change_password(
        state.users.as_ref(),
        &session.user,
        &payload.old_password,
        &payload.new_password,
        state.config.min_password_length,
    )
    .await?;

    Ok((StatusCode::OK, Json(ApiResponse::message("Password changed."))).into_response())
}
