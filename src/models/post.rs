use chrono::{DateTime, Utc};
use serde::Serialize;

/// A message posted on a user's wall.
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    /// The owner of the wall.
    pub to_user: String,
    /// The author.
    pub from_user: String,
    /// The message text. May be empty when `media` is set.
    pub content: String,
    /// Stored name of the attached media file, served under `/media/`.
    pub media: Option<String>,
    /// When the message was posted.
    pub date_posted: DateTime<Utc>,
}
