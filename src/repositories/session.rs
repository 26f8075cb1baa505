use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Script};

use crate::error::Result;

/// Key prefix for token -> user bindings.
const SESSION_PREFIX: &str = "session:";
/// Key prefix for user -> token bindings.
const SESSION_USER_PREFIX: &str = "session_user:";

/// Binds `KEYS[1]` (token key) to `ARGV[1]` (user) and indexes it under
/// `KEYS[2]` (user key), deleting the token the user held before.
const PUT_SCRIPT: &str = r#"
local previous = redis.call('GET', KEYS[2])
if previous and previous ~= ARGV[2] then
    redis.call('DEL', ARGV[3] .. previous)
end
redis.call('SET', KEYS[1], ARGV[1])
redis.call('SET', KEYS[2], ARGV[2])
return 1
"#;

/// Deletes `KEYS[1]` (token key) and the user index if it still points at
/// `ARGV[2]` (token).
const DELETE_SCRIPT: &str = r#"
local user = redis.call('GET', KEYS[1])
if user then
    redis.call('DEL', KEYS[1])
    local index = ARGV[1] .. user
    if redis.call('GET', index) == ARGV[2] then
        redis.call('DEL', index)
    end
end
return 1
"#;

/// Key-value storage for session bindings.
///
/// Each operation is atomic. A user holds at most one token: `put` replaces
/// the user's previous binding.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Binds `token` to `user`, dropping any token `user` held before.
    async fn put(&self, token: &str, user: &str) -> Result<()>;

    /// Returns the user bound to `token`, if any.
    async fn get(&self, token: &str) -> Result<Option<String>>;

    /// Removes the binding for `token`. Absent tokens are not an error.
    async fn delete(&self, token: &str) -> Result<()>;
}

/// Redis-backed `SessionBackend`.
#[derive(Clone)]
pub struct RedisSessionBackend {
    redis: ConnectionManager,
}

impl RedisSessionBackend {
    /// Creates a new `RedisSessionBackend`.
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl SessionBackend for RedisSessionBackend {
    async fn put(&self, token: &str, user: &str) -> Result<()> {
        let mut conn = self.redis.clone();
        let _: i32 = Script::new(PUT_SCRIPT)
            .key(format!("{}{}", SESSION_PREFIX, token))
            .key(format!("{}{}", SESSION_USER_PREFIX, user))
            .arg(user)
            .arg(token)
            .arg(SESSION_PREFIX)
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<String>> {
        let mut conn = self.redis.clone();
        let user: Option<String> = conn.get(format!("{}{}", SESSION_PREFIX, token)).await?;
        Ok(user)
    }

    async fn delete(&self, token: &str) -> Result<()> {
        let mut conn = self.redis.clone();
        let _: i32 = Script::new(DELETE_SCRIPT)
            .key(format!("{}{}", SESSION_PREFIX, token))
            .arg(SESSION_USER_PREFIX)
            .arg(token)
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }
}
