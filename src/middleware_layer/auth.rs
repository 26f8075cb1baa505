use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::{
    error::AppError,
    middleware_layer::request_auth::SESSION_TOKEN_HEADER,
    state::AppState,
};

/// Extracts the session token from the request headers.
///
/// # Arguments
///
/// * `request` - The incoming request.
///
/// # Returns
///
/// An `Option` containing the session token if present and non-empty.
fn extract_session_token(request: &Request<Body>) -> Option<String> {
    request
        .headers()
        .get(SESSION_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// A middleware that requires a valid session to be present.
///
/// The resolved `Session` is inserted into the request extensions.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// A `Response`, or `SessionInvalid` if the token is absent or does not resolve.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    tracing::debug!("🔐 Checking session...");

    let token = extract_session_token(&request).ok_or_else(|| {
        tracing::warn!("❌ No session token header found");
        AppError::SessionInvalid
    })?;

    let session = state.resolver.session(&token).await?;

    tracing::debug!("✅ Session resolved for: {}", session.user.email);

    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}
