//! User domain types
//!
//! Request/response DTOs and the password policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::{default_true, double_option};

const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "123456",
    "123456789",
    "qwerty",
    "abc123",
    "password123",
    "admin",
    "letmein",
    "welcome",
    "monkey",
];

pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_MAX_LEN: usize = 100;

/// Letters, digits, underscores and hyphens only
pub fn validate_username_format(username: &str) -> Result<(), ValidationError> {
    if username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        Ok(())
    } else {
        let mut error = ValidationError::new("invalid_username");
        error.message =
            Some("Username can only contain letters, numbers, underscores, and hyphens".into());
        Err(error)
    }
}

/// Everything wrong with a password; empty when it is acceptable.
pub fn password_issues(password: &str) -> Vec<&'static str> {
    let mut issues = Vec::new();
    let len = password.chars().count();

    if len < PASSWORD_MIN_LEN {
        issues.push("Password must be at least 6 characters long");
    }
    if len > PASSWORD_MAX_LEN {
        issues.push("Password must be no more than 100 characters long");
    }
    if COMMON_PASSWORDS.contains(&password.to_lowercase().as_str()) {
        issues.push("Password is too common");
    }

    issues
}

/// Request DTO for creating a user
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(
        length(min = 3, max = 50, message = "Username must be between 3 and 50 characters"),
        custom(function = "validate_username_format")
    )]
    pub username: String,
    #[validate(
        email(message = "Invalid email format"),
        length(max = 255, message = "Email must be at most 255 characters")
    )]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 100, message = "Full name must be at most 100 characters"))]
    pub full_name: Option<String>,
    pub password: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Request DTO for updating a user.
///
/// Absent fields are left unchanged. An explicit `null` clears `full_name`
/// or `avatar_url`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[serde(default)]
    #[validate(
        length(min = 3, max = 50, message = "Username must be between 3 and 50 characters"),
        custom(function = "validate_username_format")
    )]
    pub username: Option<String>,
    #[serde(default)]
    #[validate(
        email(message = "Invalid email format"),
        length(max = 255, message = "Email must be at most 255 characters")
    )]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 100, message = "Full name must be at most 100 characters"))]
    pub full_name: Option<Option<String>>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 500, message = "Avatar URL must be at most 500 characters"))]
    pub avatar_url: Option<Option<String>>,
}

/// Response DTO for user; never carries the password hash
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("hunter22", true)]
    #[case("Password", false)]
    #[case("abc", false)]
    #[case("letmein", false)]
    fn password_policy(#[case] password: &str, #[case] acceptable: bool) {
        assert_eq!(password_issues(password).is_empty(), acceptable);
    }

    #[test]
    fn overlong_passwords_are_reported() {
        let issues = password_issues(&"x".repeat(101));
        assert_eq!(issues, vec!["Password must be no more than 100 characters long"]);
    }

    #[test]
    fn usernames_reject_spaces_and_symbols() {
        assert!(validate_username_format("tony_stark-3").is_ok());
        assert!(validate_username_format("tony stark").is_err());
        assert!(validate_username_format("tony@stark").is_err());
    }

    #[test]
    fn create_request_validation() {
        let mut req = CreateUserRequest {
            username: "pepper".into(),
            email: "pepper@example.com".into(),
            full_name: None,
            password: "irrelevant".into(),
            is_active: true,
        };
        assert!(req.validate().is_ok());

        req.email = "not-an-email".into();
        assert!(req.validate().is_err());

        req.email = "pepper@example.com".into();
        req.username = "pp".into();
        assert!(req.validate().is_err());
    }

    #[test]
    fn update_request_skips_absent_fields() {
        assert!(UpdateUserRequest::default().validate().is_ok());

        let req = UpdateUserRequest {
            username: Some("bad name".into()),
            ..Default::default()
        };
        assert!(req.validate().is_err());
    }
}
