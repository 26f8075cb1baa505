use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    handler::HandlerWithoutStateExt,
    middleware::from_fn_with_state,
    routing::{any, get, post, put},
    Router,
};
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::{
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    error::{AppError, Result},
    handlers,
    middleware_layer::{self, request_auth::MAX_SIGNED_BODY_BYTES},
    state::AppState,
};

/// Builds the application router without per-IP throttling.
///
/// Suitable for driving in-process, where there is no peer address.
pub fn router(state: AppState) -> Router {
    assemble(state.clone(), public_routes(state))
}

/// Builds the application router with register and login throttled per IP.
///
/// Must be served with `into_make_service_with_connect_info::<SocketAddr>()`.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `per_second` - Seconds to replenish one request slot.
/// * `burst_size` - Requests allowed before throttling kicks in.
pub fn throttled_router(state: AppState, per_second: u64, burst_size: u32) -> Result<Router> {
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(per_second)
            .burst_size(burst_size)
            .use_headers()
            .finish()
            .ok_or_else(|| AppError::Internal("Invalid rate limit configuration".to_string()))?,
    );

    let public = public_routes(state.clone()).layer(tower_governor::GovernorLayer::new(governor_conf));
    Ok(assemble(state, public))
}

/// Register and login: signed, but no session yet.
fn public_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/register", post(handlers::auth::register))
        .route("/api/login", post(handlers::auth::login))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::request_auth::verify_request,
        ))
        .with_state(state)
}

fn assemble(state: AppState, public: Router) -> Router {
    let protected_routes = Router::new()
        .route("/api/logout", post(handlers::auth::logout))
        .route("/api/change-password", put(handlers::auth::change_password))
        .route("/api/profile", get(handlers::users::own_profile))
        .route("/api/profile/{email}", get(handlers::users::profile_by_email))
        .route("/api/messages", get(handlers::users::own_messages))
        .route(
            "/api/messages/{email}",
            get(handlers::users::messages_by_email).post(handlers::users::post_message),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_session,
        ))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::request_auth::verify_request,
        ))
        .with_state(state.clone());

    let live_routes = Router::new()
        .route("/live", get(handlers::live::live))
        .route("/api/{*rest}", any(handlers::users::api_not_found))
        .with_state(state.clone());

    // Served without request signing.
    let media = ServeDir::new(&state.config.media_dir)
        .not_found_service(handlers::users::media_not_found.into_service());

    Router::new()
        .merge(public)
        .merge(protected_routes)
        .merge(live_routes)
        .nest_service("/media", media)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true))
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(DefaultBodyLimit::max(MAX_SIGNED_BODY_BYTES))
        .fallback_service(ServeDir::new(&state.config.static_dir))
}
