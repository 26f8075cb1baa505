//! Per-connection protocol state machine.

use std::sync::Arc;

use crate::{
    presence::{
        connection::PresenceConnection,
        protocol::ClientFrame,
        registry::PresenceRegistry,
    },
    repositories::user::UserRepository,
    services::session::SessionResolver,
};

/// Where a live connection is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connected, no identity yet.
    Unauthenticated,
    /// Registered under `user`, backed by `token`.
    Authenticated { user: String, token: String },
    /// Closed. `user` is set if the connection had been registered.
    Closed { user: Option<String> },
}

/// Drives one live connection: authenticates it, keeps its registry entry
/// in step with its session, and triggers statistics broadcasts.
///
/// The transport feeds every inbound text frame to [`on_frame`] and calls
/// [`finish`] exactly once when the connection ends.
///
/// [`on_frame`]: PresenceConnectionHandler::on_frame
/// [`finish`]: PresenceConnectionHandler::finish
pub struct PresenceConnectionHandler {
    connection: Arc<PresenceConnection>,
    registry: PresenceRegistry,
    resolver: SessionResolver,
    users: Arc<dyn UserRepository>,
    state: ConnectionState,
}

impl PresenceConnectionHandler {
    /// Creates a handler for a freshly accepted connection.
    pub fn new(
        connection: Arc<PresenceConnection>,
        registry: PresenceRegistry,
        resolver: SessionResolver,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            connection,
            registry,
            resolver,
            users,
            state: ConnectionState::Unauthenticated,
        }
    }

    /// The current state.
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Handles one inbound text frame.
    pub async fn on_frame(&mut self, raw: &str) {
        if matches!(self.state, ConnectionState::Closed { .. }) {
            return;
        }

        if let ConnectionState::Authenticated { token, .. } = &self.state {
            let token = token.clone();
            if self.resolver.resolve(&token).await.is_err() {
                tracing::info!(conn_id = %self.connection.id(), "Session revoked, closing live connection");
                self.close();
                return;
            }
        }

        let Some(frame) = ClientFrame::parse(raw) else {
            return;
        };

        match frame {
            ClientFrame::Authenticate(token) => self.authenticate(token).await,
            ClientFrame::Statistics => {
                if matches!(self.state, ConnectionState::Authenticated { .. }) {
                    self.broadcast().await;
                }
            }
            ClientFrame::Unknown => {
                tracing::debug!(conn_id = %self.connection.id(), "Ignoring unknown frame type");
            }
        }
    }

    async fn authenticate(&mut self, token: String) {
        let user = match self.resolver.resolve(&token).await {
            Ok(user) => user.email,
            Err(e) => {
                tracing::warn!(conn_id = %self.connection.id(), "Live authentication failed: {}", e);
                self.close();
                return;
            }
        };

        if let ConnectionState::Authenticated { user: current, .. } = &self.state {
            if *current != user {
                self.registry.release(current, self.connection.id()).await;
            }
        }

        self.registry.register(&user, self.connection.clone()).await;
        tracing::info!(user = %user, conn_id = %self.connection.id(), "✅ Live connection authenticated");
        self.state = ConnectionState::Authenticated { user, token };
        self.broadcast().await;
    }

    fn close(&mut self) {
        self.connection.close();
        let user = match std::mem::replace(&mut self.state, ConnectionState::Closed { user: None }) {
            ConnectionState::Authenticated { user, .. } => Some(user),
            ConnectionState::Closed { user } => user,
            ConnectionState::Unauthenticated => None,
        };
        self.state = ConnectionState::Closed { user };
    }

    /// Tears the connection down: leaves the registry and tells everyone
    /// else the new head count.
    pub async fn finish(&mut self) {
        self.close();
        if let ConnectionState::Closed { user: Some(user) } = &self.state {
            self.registry.release(user, self.connection.id()).await;
        }
        self.broadcast().await;
    }

    async fn broadcast(&self) {
        let users = self.users.clone();
        self.registry
            .broadcast(move |user| {
                let users = users.clone();
                async move { users.counters(&user).await }
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::user::User,
        presence::{
            connection::DEFAULT_OUTBOUND_BUFFER,
            protocol::{ServerFrame, Statistics},
        },
        repositories::memory::{MemorySessionBackend, MemoryUserRepository},
        services::session::SessionStore,
    };
    use tokio::sync::mpsc::Receiver;

    struct Fixture {
        users: Arc<MemoryUserRepository>,
        resolver: SessionResolver,
        registry: PresenceRegistry,
    }

    impl Fixture {
        async fn new() -> Self {
            let users = Arc::new(MemoryUserRepository::new());
            for email in ["ada@example.com", "bob@example.com"] {
                users
                    .insert(&User {
                        email: email.to_string(),
                        password: "hash".to_string(),
                        first_name: "First".to_string(),
                        family_name: "Last".to_string(),
                        gender: "f".to_string(),
                        city: "City".to_string(),
                        country: "Country".to_string(),
                    })
                    .await
                    .unwrap();
            }
            let store = SessionStore::new(Arc::new(MemorySessionBackend::new()));
            Self {
                resolver: SessionResolver::new(store, users.clone()),
                users,
                registry: PresenceRegistry::new(),
            }
        }

        fn connect(&self) -> (PresenceConnectionHandler, Arc<PresenceConnection>, Receiver<ServerFrame>) {
            let (conn, rx) = PresenceConnection::channel(DEFAULT_OUTBOUND_BUFFER);
            let handler = PresenceConnectionHandler::new(
                conn.clone(),
                self.registry.clone(),
                self.resolver.clone(),
                self.users.clone(),
            );
            (handler, conn, rx)
        }

        async fn login(&self, email: &str) -> String {
            self.resolver.store().create(email).await.unwrap()
        }
    }

    fn auth_frame(token: &str) -> String {
        format!(r#"{{"type":"authenticate","data":"{}"}}"#, token)
    }

    fn last_stats(rx: &mut Receiver<ServerFrame>) -> Option<Statistics> {
        let mut last = None;
        while let Ok(ServerFrame::Statistics(stats)) = rx.try_recv() {
            last = Some(stats);
        }
        last
    }

    #[tokio::test]
    async fn test_authenticate_then_logout_revokes_connection() {
        let fx = Fixture::new().await;
        fx.users.insert_post("ada@example.com", "bob@example.com", "hi", None).await.unwrap();
        let token = fx.login("ada@example.com").await;
        let (mut handler, conn, mut rx) = fx.connect();

        handler.on_frame(&auth_frame(&token)).await;
        assert!(matches!(handler.state(), ConnectionState::Authenticated { .. }));
        assert_eq!(fx.registry.len().await, 1);
        let stats = last_stats(&mut rx).unwrap();
        assert_eq!(stats.nb_connected_users, 1);
        assert_eq!(stats.nb_posts, 1);

        fx.resolver.store().destroy(&token).await.unwrap();
        handler.on_frame(r#"{"type":"statistics"}"#).await;
        assert!(conn.is_closed());
        assert!(matches!(handler.state(), ConnectionState::Closed { .. }));

        handler.finish().await;
        assert_eq!(fx.registry.len().await, 0);
    }

    #[tokio::test]
    async fn test_bad_token_closes_connection() {
        let fx = Fixture::new().await;
        let (mut handler, conn, _rx) = fx.connect();

        handler.on_frame(&auth_frame("forged")).await;

        assert!(conn.is_closed());
        assert_eq!(handler.state(), &ConnectionState::Closed { user: None });
        assert!(fx.registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_malformed_frames_change_nothing() {
        let fx = Fixture::new().await;
        let (mut handler, conn, mut rx) = fx.connect();

        handler.on_frame("{{{").await;
        handler.on_frame(r#"{"type":"tickle"}"#).await;
        handler.on_frame(r#"{"type":"statistics"}"#).await;

        assert_eq!(handler.state(), &ConnectionState::Unauthenticated);
        assert!(!conn.is_closed());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_statistics_request_rebroadcasts() {
        let fx = Fixture::new().await;
        let token = fx.login("ada@example.com").await;
        let (mut handler, _conn, mut rx) = fx.connect();
        handler.on_frame(&auth_frame(&token)).await;
        last_stats(&mut rx);

        fx.users.record_page_view("ada@example.com").await.unwrap();
        handler.on_frame(r#"{"type":"statistics"}"#).await;

        assert_eq!(last_stats(&mut rx).unwrap().nb_views, 1);
    }

    #[tokio::test]
    async fn test_departure_is_broadcast_to_others() {
        let fx = Fixture::new().await;
        let ada_token = fx.login("ada@example.com").await;
        let bob_token = fx.login("bob@example.com").await;
        let (mut ada, _ada_conn, _ada_rx) = fx.connect();
        let (mut bob, _bob_conn, mut bob_rx) = fx.connect();

        ada.on_frame(&auth_frame(&ada_token)).await;
        bob.on_frame(&auth_frame(&bob_token)).await;
        assert_eq!(last_stats(&mut bob_rx).unwrap().nb_connected_users, 2);

        ada.finish().await;
        assert_eq!(last_stats(&mut bob_rx).unwrap().nb_connected_users, 1);
    }

    #[tokio::test]
    async fn test_new_connection_for_same_user_wins() {
        let fx = Fixture::new().await;
        let token = fx.login("ada@example.com").await;
        let (mut first, first_conn, _first_rx) = fx.connect();
        let (mut second, second_conn, _second_rx) = fx.connect();

        first.on_frame(&auth_frame(&token)).await;
        second.on_frame(&auth_frame(&token)).await;
        assert!(first_conn.is_closed());

        first.finish().await;
        assert!(fx.registry.contains("ada@example.com").await);
        assert!(!second_conn.is_closed());
    }
}
