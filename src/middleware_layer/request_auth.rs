use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose};

use crate::{
    crypto::signature::MessageHasher,
    error::{AppError, Result},
    state::AppState,
};

/// Header carrying the base64 request digest.
pub const REQUEST_HMAC_HEADER: &str = "x-request-hmac";
/// Header carrying the send time in seconds since the epoch.
pub const REQUEST_TIMESTAMP_HEADER: &str = "x-request-timestamp";
/// Header carrying the session token.
pub const SESSION_TOKEN_HEADER: &str = "x-session-token";

/// Largest body the signature gate will buffer, attachments included.
pub const MAX_SIGNED_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Checks that a request was signed with the shared secret within the
/// replay window.
///
/// The digest covers `(timestamp, session token, body)`, in that order. The
/// check is pure: no storage is touched.
#[derive(Clone)]
pub struct RequestAuthenticator {
    hasher: MessageHasher,
    window_secs: u64,
}

impl RequestAuthenticator {
    /// Creates a new `RequestAuthenticator`.
    pub fn new(hasher: MessageHasher, window_secs: u64) -> Self {
        Self { hasher, window_secs }
    }

    /// Authenticates a request against the server clock.
    pub fn authenticate(
        &self,
        digest: Option<&str>,
        timestamp: Option<&str>,
        session_token: &str,
        body: &[u8],
    ) -> Result<()> {
        self.authenticate_at(chrono::Utc::now().timestamp(), digest, timestamp, session_token, body)
    }

    /// Authenticates a request as if the server clock read `now`.
    ///
    /// # Arguments
    ///
    /// * `now` - Server time in seconds since the epoch.
    /// * `digest` - The base64 digest header, if present.
    /// * `timestamp` - The decimal timestamp header, if present.
    /// * `session_token` - The session token header, empty if absent.
    /// * `body` - The raw request body.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the request is authentic, `RequestAuthentication` otherwise.
    pub fn authenticate_at(
        &self,
        now: i64,
        digest: Option<&str>,
        timestamp: Option<&str>,
        session_token: &str,
        body: &[u8],
    ) -> Result<()> {
        let digest = digest
            .ok_or_else(|| AppError::RequestAuthentication("missing digest".to_string()))?;
        let tag = general_purpose::STANDARD
            .decode(digest.trim())
            .map_err(|_| AppError::RequestAuthentication("undecodable digest".to_string()))?;

        let timestamp = timestamp
            .map(str::trim)
            .ok_or_else(|| AppError::RequestAuthentication("missing timestamp".to_string()))?;
        let sent_at: i64 = timestamp
            .parse()
            .map_err(|_| AppError::RequestAuthentication("invalid timestamp".to_string()))?;

        if now.abs_diff(sent_at) > self.window_secs {
            return Err(AppError::RequestAuthentication(format!(
                "timestamp {} outside the {}s window",
                sent_at, self.window_secs
            )));
        }

        if !self
            .hasher
            .verify(&tag, &[timestamp.as_bytes(), session_token.as_bytes(), body])
        {
            return Err(AppError::RequestAuthentication("digest mismatch".to_string()));
        }

        Ok(())
    }

    /// Produces the base64 digest a client sends for the given fields.
    pub fn sign(&self, timestamp: &str, session_token: &str, body: &[u8]) -> String {
        let tag = self
            .hasher
            .digest(&[timestamp.as_bytes(), session_token.as_bytes(), body]);
        general_purpose::STANDARD.encode(tag)
    }
}

/// A middleware that rejects requests whose signature or timestamp is invalid.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `req` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// A `Response`; 401 if the request is not authentic.
pub async fn verify_request(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let (parts, body) = req.into_parts();
    let body_bytes = match axum::body::to_bytes(body, MAX_SIGNED_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return AppError::RequestAuthentication(format!("unreadable body: {}", e))
                .into_response();
        }
    };

    let header = |name: &str| parts.headers.get(name).and_then(|v| v.to_str().ok());

    if let Err(e) = state.authenticator.authenticate(
        header(REQUEST_HMAC_HEADER),
        header(REQUEST_TIMESTAMP_HEADER),
        header(SESSION_TOKEN_HEADER).unwrap_or(""),
        &body_bytes,
    ) {
        return e.into_response();
    }

    tracing::debug!("✅ Request signature valid: {} {}", parts.method, parts.uri.path());

    next.run(Request::from_parts(parts, Body::from(body_bytes))).await
}
