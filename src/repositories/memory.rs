//! In-memory storage backends.
//!
//! Single process only, nothing survives a restart. Used for development
//! (`STORAGE_BACKEND=memory`) and by the test suite.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::{
    error::Result,
    models::{post::Post, user::User},
    repositories::{session::SessionBackend, user::UserRepository},
};

#[derive(Default)]
struct SessionTables {
    by_token: HashMap<String, String>,
    by_user: HashMap<String, String>,
}

/// In-memory `SessionBackend`. One lock covers both indexes.
#[derive(Clone, Default)]
pub struct MemorySessionBackend {
    tables: Arc<Mutex<SessionTables>>,
}

impl MemorySessionBackend {
    /// Creates a new, empty `MemorySessionBackend`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live bindings.
    pub async fn len(&self) -> usize {
        self.tables.lock().await.by_token.len()
    }
}

#[async_trait]
impl SessionBackend for MemorySessionBackend {
    async fn put(&self, token: &str, user: &str) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if let Some(previous) = tables.by_user.insert(user.to_string(), token.to_string()) {
            if previous != token {
                tables.by_token.remove(&previous);
            }
        }
        tables.by_token.insert(token.to_string(), user.to_string());
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<String>> {
        Ok(self.tables.lock().await.by_token.get(token).cloned())
    }

    async fn delete(&self, token: &str) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if let Some(user) = tables.by_token.remove(token) {
            if tables.by_user.get(&user).map(String::as_str) == Some(token) {
                tables.by_user.remove(&user);
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct UserTables {
    users: HashMap<String, User>,
    posts: Vec<Post>,
    views: HashMap<String, i64>,
}

/// In-memory `UserRepository`.
#[derive(Clone, Default)]
pub struct MemoryUserRepository {
    tables: Arc<Mutex<UserTables>>,
}

impl MemoryUserRepository {
    /// Creates a new, empty `MemoryUserRepository`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deletes a user together with their wall and view count.
    pub async fn remove(&self, email: &str) -> bool {
        let mut tables = self.tables.lock().await;
        tables.posts.retain(|p| p.to_user != email);
        tables.views.remove(email);
        tables.users.remove(email).is_some()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.tables.lock().await.users.get(email).cloned())
    }

    async fn insert(&self, user: &User) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        if tables.users.contains_key(&user.email) {
            return Ok(false);
        }
        tables.users.insert(user.email.clone(), user.clone());
        Ok(true)
    }

    async fn update_password(&self, email: &str, password_hash: &str) -> Result<()> {
        if let Some(user) = self.tables.lock().await.users.get_mut(email) {
            user.password = password_hash.to_string();
        }
        Ok(())
    }

    async fn insert_post(
        &self,
        to_user: &str,
        from_user: &str,
        content: &str,
        media: Option<&str>,
    ) -> Result<()> {
        self.tables.lock().await.posts.push(Post {
            to_user: to_user.to_string(),
            from_user: from_user.to_string(),
            content: content.to_string(),
            media: media.map(str::to_string),
            date_posted: Utc::now(),
        });
        Ok(())
    }

    async fn list_posts(&self, to_user: &str) -> Result<Vec<Post>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .posts
            .iter()
            .rev()
            .filter(|p| p.to_user == to_user)
            .cloned()
            .collect())
    }

    async fn count_posts(&self, to_user: &str) -> Result<i64> {
        let tables = self.tables.lock().await;
        Ok(tables.posts.iter().filter(|p| p.to_user == to_user).count() as i64)
    }

    async fn page_views(&self, email: &str) -> Result<i64> {
        Ok(self.tables.lock().await.views.get(email).copied().unwrap_or(0))
    }

    async fn record_page_view(&self, email: &str) -> Result<()> {
        *self.tables.lock().await.views.entry(email.to_string()).or_insert(0) += 1;
        Ok(())
    }
}
