/// Per-user counters pushed to live connections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserCounters {
    /// Number of posts on the user's wall.
    pub posts: i64,
    /// Number of times the user's profile was viewed.
    pub views: i64,
}
