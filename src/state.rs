use std::sync::Arc;

use redis::aio::ConnectionManager;

use crate::{
    config::{Config, StorageBackend},
    crypto::signature::MessageHasher,
    error::{AppError, Result},
    middleware_layer::request_auth::RequestAuthenticator,
    presence::registry::PresenceRegistry,
    repositories::{
        memory::{MemorySessionBackend, MemoryUserRepository},
        session::{RedisSessionBackend, SessionBackend},
        user::{PgUserRepository, UserRepository},
    },
    services::session::{SessionResolver, SessionStore},
};

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Config,
    /// User, post and page-view storage.
    pub users: Arc<dyn UserRepository>,
    /// Session token storage.
    pub sessions: SessionStore,
    /// Session token to user resolution.
    pub resolver: SessionResolver,
    /// Request signature gate.
    pub authenticator: RequestAuthenticator,
    /// Live connections.
    pub presence: PresenceRegistry,
}

impl AppState {
    /// Creates a new `AppState`, connecting to the configured storage.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn new(config: &Config) -> Result<Self> {
        match config.storage {
            StorageBackend::Postgres => {
                let database_url = config
                    .database_url
                    .as_deref()
                    .ok_or_else(|| AppError::Internal("DATABASE_URL is not set".to_string()))?;
                let db = crate::db::create_pool(database_url)?;
                crate::db::ensure_schema(&db).await?;
                tracing::info!("✅ PostgreSQL Pool initialized with deadpool-postgres");

                let redis_client = redis::Client::open(config.redis_url.as_str())?;
                let redis = ConnectionManager::new(redis_client).await?;
                tracing::info!("✅ Redis Connection Manager initialized");

                Self::from_parts(
                    config,
                    Arc::new(PgUserRepository::new(db)),
                    Arc::new(RedisSessionBackend::new(redis)),
                )
            }
            StorageBackend::Memory => {
                tracing::warn!("⚠️ Using in-memory storage, nothing will survive a restart");
                Self::in_memory(config)
            }
        }
    }

    /// Creates an `AppState` backed entirely by process memory.
    pub fn in_memory(config: &Config) -> Result<Self> {
        Self::from_parts(
            config,
            Arc::new(MemoryUserRepository::new()),
            Arc::new(MemorySessionBackend::new()),
        )
    }

    /// Assembles an `AppState` from explicit storage backends.
    pub fn from_parts(
        config: &Config,
        users: Arc<dyn UserRepository>,
        session_backend: Arc<dyn SessionBackend>,
    ) -> Result<Self> {
        let hasher = MessageHasher::new(&config.request_secret)?;
        let authenticator = RequestAuthenticator::new(hasher, config.replay_window_secs);
        let sessions = SessionStore::new(session_backend);
        let resolver = SessionResolver::new(sessions.clone(), users.clone());
        tracing::info!("✅ Request authenticator initialized ({}s window)", config.replay_window_secs);

        Ok(AppState {
            config: config.clone(),
            users,
            sessions,
            resolver,
            authenticator,
            presence: PresenceRegistry::new(),
        })
    }

    /// Pushes fresh statistics to every live connection.
    pub async fn broadcast_statistics(&self) -> usize {
        let users = self.users.clone();
        self.presence
            .broadcast(move |user| {
                let users = users.clone();
                async move { users.counters(&user).await }
            })
            .await
    }
}
