use axum::http::{header, HeaderName, HeaderValue, Method};
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::cors::CorsLayer;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use murmur::{
    config::Config,
    middleware_layer::request_auth::{REQUEST_HMAC_HEADER, REQUEST_TIMESTAMP_HEADER, SESSION_TOKEN_HEADER},
    routes,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded successfully");

    let state = AppState::new(&config).await?;
    tracing::info!("✅ AppState initialized ({:?} storage)", config.storage);

    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
            HeaderValue::from_static("http://[::1]:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(REQUEST_HMAC_HEADER),
            HeaderName::from_static(REQUEST_TIMESTAMP_HEADER),
            HeaderName::from_static(SESSION_TOKEN_HEADER),
        ])
        .max_age(Duration::from_secs(86400));

    let app = routes::throttled_router(state.clone(), 2, 20)?.layer(cors);

    let addr = config.bind_addr;
    tracing::info!("🚀 Server listening on http://{}", addr);
    tracing::info!("✅ All systems operational");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(state))
    .await?;

    Ok(())
}

/// Waits for Ctrl-C, then closes every live connection so their tasks wind down.
async fn shutdown_signal(state: AppState) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("❌ Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    let closed = state.presence.close_all().await;
    tracing::info!("🛑 Shutting down, closed {} live connections", closed);
}
