use std::path::Path;

use crate::{
    error::{AppError, Result},
    models::{post::Post, user::{User, UserProfile}},
    repositories::user::UserRepository,
    services::media::{store_media, MediaUpload},
    validation::text::escape_html,
};

/// Looks up a user's public profile.
pub async fn profile(users: &dyn UserRepository, email: &str) -> Result<UserProfile> {
    let user = users.find_by_email(email).await?.ok_or(AppError::UserNotFound)?;
    Ok(UserProfile::from(&user))
}

/// Looks up another user's profile and counts the visit.
pub async fn view_profile(users: &dyn UserRepository, email: &str) -> Result<UserProfile> {
    let profile = profile(users, email).await?;
    users.record_page_view(email).await?;
    tracing::debug!("👀 Profile viewed: {}", email);
    Ok(profile)
}

/// Lists the posts on `email`'s wall, newest first.
pub async fn posts(users: &dyn UserRepository, email: &str) -> Result<Vec<Post>> {
    if users.find_by_email(email).await?.is_none() {
        return Err(AppError::UserNotFound);
    }
    users.list_posts(email).await
}

/// Posts `content` from `author` on `to_email`'s wall.
///
/// A post needs text, an attachment, or both. The text is HTML-escaped
/// before it is stored.
///
/// # Arguments
///
/// * `users` - The user repository.
/// * `media_dir` - Where attachments are written.
/// * `author` - The posting user.
/// * `to_email` - The owner of the wall.
/// * `content` - The message text.
/// * `media` - An optional attachment.
///
/// # Returns
///
/// `CouldNotPostMessage` if the post is empty, the recipient unknown, or
/// the attachment rejected.
pub async fn post_message(
    users: &dyn UserRepository,
    media_dir: &Path,
    author: &User,
    to_email: &str,
    content: &str,
    media: Option<MediaUpload>,
) -> Result<()> {
    let content = content.trim();
    if to_email.is_empty() || (content.is_empty() && media.is_none()) {
        return Err(AppError::CouldNotPostMessage);
    }

    if users.find_by_email(to_email).await?.is_none() {
        return Err(AppError::CouldNotPostMessage);
    }

    let media_name = match &media {
        Some(upload) => Some(store_media(media_dir, upload).await?),
        None => None,
    };

    users
        .insert_post(to_email, &author.email, &escape_html(content), media_name.as_deref())
        .await?;
    tracing::info!("✉️ {} posted on {}'s wall", author.email, to_email);
    Ok(())
}
