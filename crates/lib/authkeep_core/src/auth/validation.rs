//! Input rules applied at the API boundary before any store is touched.

use super::AuthError;
use super::tokens::{REFRESH_TOKEN_MAX_LEN, RESET_TOKEN_LEN};
use crate::models::auth::{Credentials, Identifier, NewUser, Secret};

const EMAIL_MAX_LEN: usize = 128;
const DISPLAY_NAME_MIN_LEN: usize = 4;
const DISPLAY_NAME_MAX_LEN: usize = 16;
const PASSWORD_MIN_LEN: usize = 8;
const PASSWORD_MAX_LEN: usize = 256;
const PASSWORD_SPECIAL_CHARS: &[char] = &['!', '#', '$', '%'];

fn invalid(message: &str) -> AuthError {
    AuthError::ValidationError(message.to_string())
}

/// `\S+@\S+\.\S+`, at most 128 characters.
pub fn validate_email(email: &str) -> Result<(), AuthError> {
    let message = "Please use a valid email.";
    if email.is_empty() || email.chars().count() > EMAIL_MAX_LEN {
        return Err(invalid(message));
    }
    if email.chars().any(char::is_whitespace) {
        return Err(invalid(message));
    }
    let well_formed = email.char_indices().any(|(at, c)| {
        if c != '@' || at == 0 {
            return false;
        }
        let domain = &email[at + 1..];
        domain
            .char_indices()
            .any(|(dot, d)| d == '.' && dot > 0 && dot + 1 < domain.len())
    });
    if well_formed {
        Ok(())
    } else {
        Err(invalid(message))
    }
}

/// Registration rules: letters, digits and spaces; no leading, trailing or
/// doubled spaces; 4–16 characters.
pub fn validate_display_name(display_name: &str) -> Result<(), AuthError> {
    if display_name.is_empty()
        || !display_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == ' ')
    {
        return Err(invalid(
            "Username's may only contain letters, numbers, and spaces.",
        ));
    }
    if display_name.starts_with(' ')
        || display_name.ends_with(' ')
        || display_name.contains("  ")
    {
        return Err(invalid("Invalid username spacing."));
    }
    let len = display_name.chars().count();
    if !(DISPLAY_NAME_MIN_LEN..=DISPLAY_NAME_MAX_LEN).contains(&len) {
        return Err(invalid("Username's must be between 4 - 16 characters."));
    }
    Ok(())
}

/// Login accepts any 4–16 character mix of letters, digits and spaces.
fn validate_login_display_name(display_name: &str) -> Result<(), AuthError> {
    let len = display_name.chars().count();
    let charset_ok = display_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == ' ');
    if charset_ok && (DISPLAY_NAME_MIN_LEN..=DISPLAY_NAME_MAX_LEN).contains(&len) {
        Ok(())
    } else {
        Err(invalid("Username is invalid."))
    }
}

/// 8–256 characters including at least one of `!#$%`.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if (PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len)
        && password.contains(PASSWORD_SPECIAL_CHARS)
    {
        Ok(())
    } else {
        Err(invalid(
            "Password's must be at least 8 chars and contain a special character (!,#,$,%).",
        ))
    }
}

pub fn validate_password_repeat(password: &str, repeat: &str) -> Result<(), AuthError> {
    if password == repeat {
        Ok(())
    } else {
        Err(invalid("Passwords do not match"))
    }
}

/// Exactly 104 hex characters.
pub fn validate_reset_token(token: &str) -> Result<(), AuthError> {
    if token.len() == RESET_TOKEN_LEN && token.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(invalid("Invalid reset token."))
    }
}

/// Validate a registration payload and turn it into a `NewUser`.
pub fn validate_registration(
    email: &str,
    display_name: &str,
    password: &str,
    password2: &str,
) -> Result<NewUser, AuthError> {
    validate_email(email)?;
    validate_display_name(display_name)?;
    validate_password(password)?;
    validate_password_repeat(password, password2)?;
    Ok(NewUser {
        email: email.to_string(),
        display_name: display_name.to_string(),
        password: password.to_string(),
    })
}

/// Validate a login payload: exactly one of display name / email and exactly
/// one of password / refresh token.
pub fn validate_login(
    email: Option<&str>,
    display_name: Option<&str>,
    password: Option<&str>,
    refresh_token: Option<&str>,
) -> Result<Credentials, AuthError> {
    let identifier = match (email, display_name) {
        (Some(_), Some(_)) => {
            return Err(invalid("Provide either an email or a username, not both."));
        }
        (None, None) => return Err(invalid("Email and password required.")),
        (Some(email), None) => {
            validate_email(email)?;
            Identifier::Email(email.to_string())
        }
        (None, Some(display_name)) => {
            validate_login_display_name(display_name)?;
            Identifier::DisplayName(display_name.to_string())
        }
    };

    let secret = match (password, refresh_token) {
        (Some(_), Some(_)) => {
            return Err(invalid(
                "Provide either a password or a refresh token, not both.",
            ));
        }
        (None, None) => return Err(invalid("Email and password required.")),
        (Some(password), None) => {
            if password.is_empty() || password.chars().count() > PASSWORD_MAX_LEN {
                return Err(invalid("Password is invalid."));
            }
            Secret::Password(password.to_string())
        }
        (None, Some(token)) => {
            if token.is_empty() || token.len() > REFRESH_TOKEN_MAX_LEN {
                return Err(invalid("Refresh token is invalid."));
            }
            Secret::RefreshToken(token.to_string())
        }
    };

    Ok(Credentials { identifier, secret })
}

/// Validate a reset-password payload.
pub fn validate_password_reset(
    token: &str,
    password: &str,
    password2: &str,
) -> Result<(), AuthError> {
    validate_reset_token(token)?;
    validate_password(password)?;
    validate_password_repeat(password, password2)
}
