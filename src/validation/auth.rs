use crate::error::{AppError, Result};

/// Accepted values for a user's gender.
const GENDERS: [&str; 2] = ["m", "f"];

/// Validates a password.
///
/// # Arguments
///
/// * `password` - The password to validate.
/// * `min_length` - The minimum number of characters.
///
/// # Returns
///
/// A `Result<()>` indicating whether the password is valid.
pub fn validate_password(password: &str, min_length: usize) -> Result<()> {
    if password.chars().count() < min_length {
        return Err(AppError::UserInvalid(format!(
            "Password is not valid, use {} characters minimum.",
            min_length
        )));
    }

    if password.len() > 128 {
        return Err(AppError::UserInvalid(
            "Password must be at most 128 characters.".to_string(),
        ));
    }

    Ok(())
}

/// `garde` rule for the gender field.
pub fn validate_gender(value: &str, _ctx: &()) -> garde::Result {
    if GENDERS.contains(&value) {
        Ok(())
    } else {
        Err(garde::Error::new("gender must be 'm' or 'f'"))
    }
}

/// Turns a `garde` report into a user-facing error.
pub fn report_to_error(report: garde::Report) -> AppError {
    let message = report
        .iter()
        .map(|(path, error)| format!("{}: {}", path, error))
        .collect::<Vec<_>>()
        .join("; ");
    AppError::UserInvalid(format!("User not valid. {}", message))
}
