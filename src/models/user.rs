use serde::Serialize;

/// Represents a user in the system.
///
/// The email address is the user's identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    /// The user's email address.
    pub email: String,
    /// The user's hashed password.
    pub password: String,
    /// The user's first name.
    pub first_name: String,
    /// The user's family name.
    pub family_name: String,
    /// The user's gender, `m` or `f`.
    pub gender: String,
    /// The user's city.
    pub city: String,
    /// The user's country.
    pub country: String,
}

/// The public part of a user record.
#[derive(Clone, Debug, Serialize)]
pub struct UserProfile {
    pub email: String,
    pub first_name: String,
    pub family_name: String,
    pub gender: String,
    pub city: String,
    pub country: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            family_name: user.family_name.clone(),
            gender: user.gender.clone(),
            city: user.city.clone(),
            country: user.country.clone(),
        }
    }
}
