//! Which users currently hold a live connection.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    error::Result,
    models::statistics::UserCounters,
    presence::{
        connection::{ConnectionId, PresenceConnection},
        protocol::{ServerFrame, Statistics},
    },
};

/// A concurrent map from user identity to that user's live connection.
///
/// Holds at most one connection per user; registering a second one closes
/// the first. A single lock guards the map and is never held across an
/// await on anything but the lock itself.
#[derive(Clone, Default)]
pub struct PresenceRegistry {
    entries: Arc<Mutex<HashMap<String, Arc<PresenceConnection>>>>,
}

impl PresenceRegistry {
    /// Creates a new, empty `PresenceRegistry`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `connection` for `user`, closing the connection it replaces.
    ///
    /// # Returns
    ///
    /// `true` if another connection was superseded.
    pub async fn register(&self, user: &str, connection: Arc<PresenceConnection>) -> bool {
        let mut entries = self.entries.lock().await;
        let conn_id = connection.id();
        match entries.insert(user.to_string(), connection) {
            Some(previous) if previous.id() != conn_id => {
                previous.close();
                tracing::info!(user, old = %previous.id(), new = %conn_id, "Live connection superseded");
                true
            }
            _ => {
                tracing::info!(user, conn_id = %conn_id, "Live connection registered");
                false
            }
        }
    }

    /// Removes and closes `user`'s connection, if any.
    pub async fn unregister(&self, user: &str) {
        let removed = self.entries.lock().await.remove(user);
        if let Some(connection) = removed {
            connection.close();
            tracing::info!(user, conn_id = %connection.id(), "Live connection unregistered");
        }
    }

    /// Removes `user`'s entry only if it is still `conn_id`.
    ///
    /// A connection that has been superseded must not evict its successor.
    pub async fn release(&self, user: &str, conn_id: ConnectionId) -> bool {
        let mut entries = self.entries.lock().await;
        if entries.get(user).map(|c| c.id()) != Some(conn_id) {
            return false;
        }
        if let Some(connection) = entries.remove(user) {
            connection.close();
        }
        tracing::info!(user, conn_id = %conn_id, "Live connection released");
        true
    }

    /// Number of users with a live connection.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether no user is connected.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Whether `user` has a live connection.
    pub async fn contains(&self, user: &str) -> bool {
        self.entries.lock().await.contains_key(user)
    }

    /// Pushes fresh statistics to every live connection.
    ///
    /// `statistics` is called once per connected user. A user whose counters
    /// cannot be computed is skipped; a connection that cannot take the
    /// frame is dropped from the registry. Neither stops delivery to the
    /// others.
    ///
    /// # Returns
    ///
    /// The number of connections the frame was queued on.
    pub async fn broadcast<F, Fut>(&self, statistics: F) -> usize
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<UserCounters>>,
    {
        let snapshot: Vec<(String, Arc<PresenceConnection>)> = {
            let entries = self.entries.lock().await;
            entries
                .iter()
                .map(|(user, conn)| (user.clone(), conn.clone()))
                .collect()
        };
        let connected = snapshot.len();

        let mut delivered = 0;
        for (user, connection) in snapshot {
            let counters = match statistics(user.clone()).await {
                Ok(counters) => counters,
                Err(e) => {
                    tracing::warn!(user = %user, "Could not compute statistics: {}", e);
                    continue;
                }
            };

            let frame = ServerFrame::Statistics(Statistics {
                nb_connected_users: connected,
                nb_posts: counters.posts,
                nb_views: counters.views,
            });

            if connection.send(frame) {
                delivered += 1;
            } else if connection.is_closed() {
                tracing::warn!(user = %user, conn_id = %connection.id(), "Dropping dead live connection");
                self.release(&user, connection.id()).await;
            }
        }

        tracing::debug!(connected, delivered, "Statistics broadcast");
        delivered
    }

    /// Closes and removes every connection.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<_> = self.entries.lock().await.drain().collect();
        for (_, connection) in &drained {
            connection.close();
        }
        drained.len()
    }
}
