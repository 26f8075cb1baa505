use crate::{
    crypto::password::{hash_password, verify_password},
    error::{AppError, Result},
    models::user::User,
    repositories::user::UserRepository,
    services::session::SessionStore,
    validation::{auth::validate_password, text::escape_html},
};

/// A registration request whose fields have passed shape validation.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub family_name: String,
    pub gender: String,
    pub city: String,
    pub country: String,
}

/// Creates a new user.
///
/// Display fields are HTML-escaped before they are stored. The email,
/// already syntax-checked, is kept as the lookup key.
///
/// # Arguments
///
/// * `users` - The user repository.
/// * `new_user` - The registration data, with a plain-text password.
/// * `min_password_length` - The minimum password length.
///
/// # Returns
///
/// A `Result` containing the created `User`.
pub async fn create_user(
    users: &dyn UserRepository,
    new_user: NewUser,
    min_password_length: usize,
) -> Result<User> {
    tracing::debug!("🔐 Creating user: {}", new_user.email);
    validate_password(&new_user.password, min_password_length)?;

    if users.find_by_email(&new_user.email).await?.is_some() {
        return Err(AppError::UserInvalid("User already exists.".to_string()));
    }

    let user = User {
        password: hash_password(&new_user.password).await?,
        email: new_user.email,
        first_name: escape_html(&new_user.first_name),
        family_name: escape_html(&new_user.family_name),
        gender: new_user.gender,
        city: escape_html(&new_user.city),
        country: escape_html(&new_user.country),
    };

    if !users.insert(&user).await? {
        return Err(AppError::UserInvalid("User already exists.".to_string()));
    }

    tracing::info!("✅ User created: {}", user.email);
    Ok(user)
}

/// Checks credentials and opens a session.
///
/// An unknown email and a wrong password fail the same way.
///
/// # Returns
///
/// A `Result` containing the new session token.
pub async fn login(
    users: &dyn UserRepository,
    sessions: &SessionStore,
    email: &str,
    password: &str,
) -> Result<String> {
    tracing::debug!("🔐 Authenticating user: {}", email);

    let user = users
        .find_by_email(email)
        .await?
        .ok_or(AppError::CouldNotLogin)?;

    if !verify_password(password, &user.password).await? {
        return Err(AppError::CouldNotLogin);
    }

    let token = sessions.create(&user.email).await?;
    tracing::info!("✅ User authenticated: {}", user.email);
    Ok(token)
}

/// Changes a user's password.
///
/// # Arguments
///
/// * `users` - The user repository.
/// * `user` - The user, as resolved from their session.
/// * `old_password` - The user's current password.
/// * `new_password` - The replacement password.
/// * `min_password_length` - The minimum password length.
///
/// # Returns
///
/// A `Result<()>`.
pub async fn change_password(
    users: &dyn UserRepository,
    user: &User,
    old_password: &str,
    new_password: &str,
    min_password_length: usize,
) -> Result<()> {
    tracing::info!("🔑 Changing password for user: {}", user.email);

    if !verify_password(old_password, &user.password).await? {
        return Err(AppError::Validation("Password is invalid.".to_string()));
    }
    validate_password(new_password, min_password_length)
        .map_err(|_| AppError::Validation("Password is invalid.".to_string()))?;

    let new_hash = hash_password(new_password).await?;
    users.update_password(&user.email, &new_hash).await?;

    tracing::info!("✅ Password changed for user: {}", user.email);
    Ok(())
}
