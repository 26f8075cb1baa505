use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;

use crate::{
    error::{AppError, Result},
    handlers::auth::ApiResponse,
    models::{session::Session, user::UserProfile},
    services::{media::MediaUpload, wall},
    state::AppState,
};

/// The request payload for posting a message.
#[derive(Deserialize)]
pub struct PostMessageRequest {
    #[serde(default)]
    pub message: String,
}

/// Returns the caller's own profile.
#[axum::debug_handler]
pub async fn own_profile(Extension(session): Extension<Session>) -> Result<Response> {
    let profile = UserProfile::from(&session.user);
    Ok((StatusCode::OK, Json(ApiResponse::ok("Data successfully retrieved.", profile))).into_response())
}

/// Returns another user's profile and counts the view.
#[axum::debug_handler]
pub async fn profile_by_email(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(email): Path<String>,
) -> Result<Response> {
    tracing::debug!("{} views {}", session.user.email, email);
    let profile = wall::view_profile(state.users.as_ref(), &email).await?;
    state.broadcast_statistics().await;

    Ok((StatusCode::OK, Json(ApiResponse::ok("Data successfully retrieved.", profile))).into_response())
}

/// Lists the posts on the caller's wall.
#[axum::debug_handler]
pub async fn own_messages(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Response> {
    let posts = wall::posts(state.users.as_ref(), &session.user.email).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok("Messages successfully retrieved.", posts))).into_response())
}

/// Lists the posts on another user's wall.
#[axum::debug_handler]
pub async fn messages_by_email(
    State(state): State<AppState>,
    Extension(_session): Extension<Session>,
    Path(email): Path<String>,
) -> Result<Response> {
    let posts = wall::posts(state.users.as_ref(), &email).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok("Messages successfully retrieved.", posts))).into_response())
}

/// Whether the request carries a `multipart/form-data` body.
fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

/// Reads the `message` and optional `media` fields of a post form.
async fn read_post_form(mut multipart: Multipart) -> Result<(String, Option<MediaUpload>)> {
    let mut message = String::new();
    let mut media = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Multipart(format!("Parse error: {}", e)))?
    {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "message" => {
                message = field
                    .text()
                    .await
                    .map_err(|e| AppError::Multipart(format!("message: {}", e)))?;
            }
            "media" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Multipart(format!("media: {}", e)))?;
                // Browsers send an empty part when no file was picked.
                if !(file_name.is_empty() && bytes.is_empty()) {
                    media = Some(MediaUpload { file_name, bytes });
                }
            }
            _ => {}
        }
    }

    Ok((message, media))
}

/// Posts a message on a user's wall.
///
/// Accepts either a JSON `{"message"}` body or a multipart form with a
/// `message` field and an optional `media` file.
#[axum::debug_handler]
pub async fn post_message(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(email): Path<String>,
    request: Request,
) -> Result<Response> {
    let (message, media) = if is_multipart(request.headers()) {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| AppError::Multipart(e.body_text()))?;
        read_post_form(multipart).await?
    } else {
        let Json(payload) = Json::<PostMessageRequest>::from_request(request, &state)
            .await
            .map_err(|_| AppError::CouldNotPostMessage)?;
        (payload.message, None)
    };

    wall::post_message(
        state.users.as_ref(),
        &state.config.media_dir,
        &session.user,
        &email,
        &message,
        media,
    )
    .await?;
    state.broadcast_statistics().await;

    Ok((StatusCode::OK, Json(ApiResponse::message("Message successfully posted."))).into_response())
}

/// Answers `/media` names with no stored file.
pub async fn media_not_found() -> AppError {
    AppError::MediaNotFound
}

/// Answers unknown `/api` paths.
pub async fn api_not_found() -> AppError {
    AppError::NotFound
}
