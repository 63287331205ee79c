//! Input rules shared by the project, buddy and action endpoints.
//!
//! Every validator trims its input and returns the trimmed value on success,
//! so handlers store exactly what was checked.

use std::sync::LazyLock;

use regex::Regex;

use crate::errors::AppError;

pub const MIN_PROJECT_NAME_LENGTH: usize = 3;
pub const MAX_PROJECT_NAME_LENGTH: usize = 100;
pub const MAX_ACTION_MESSAGE_LENGTH: usize = 500;

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

/// Accepts `local@domain.tld`-shaped addresses: one `@`, no whitespace, and a
/// dot in the domain with at least one character on each side.
pub fn validate_email(email: &str) -> Result<String, AppError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AppError::Validation("Email is required".to_string()));
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err(AppError::Validation(
            "Please enter a valid email address".to_string(),
        ));
    }
    Ok(email.to_string())
}

pub fn validate_project_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    let len = name.chars().count();
    if len == 0 {
        return Err(AppError::Validation("Project name is required".to_string()));
    }
    if len < MIN_PROJECT_NAME_LENGTH {
        return Err(AppError::Validation(format!(
            "Project name must be at least {MIN_PROJECT_NAME_LENGTH} characters"
        )));
    }
    if len > MAX_PROJECT_NAME_LENGTH {
        return Err(AppError::Validation(format!(
            "Project name must be less than {MAX_PROJECT_NAME_LENGTH} characters"
        )));
    }
    Ok(name.to_string())
}

pub fn validate_action_message(message: &str) -> Result<String, AppError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(AppError::Validation("Message is required".to_string()));
    }
    if message.chars().count() > MAX_ACTION_MESSAGE_LENGTH {
        return Err(AppError::Validation(format!(
            "Message must be less than {MAX_ACTION_MESSAGE_LENGTH} characters"
        )));
    }
    Ok(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_of(err: AppError) -> String {
        match err {
            AppError::Validation(msg) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_email_valid() {
        assert_eq!(validate_email("  ada@example.com ").unwrap(), "ada@example.com");
        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email("first.last+tag@sub.example.org").is_ok());
        assert!(validate_email("ada@mail.example.co.uk").is_ok());
    }

    #[test]
    fn test_email_required() {
        assert_eq!(message_of(validate_email("   ").unwrap_err()), "Email is required");
    }

    #[test]
    fn test_email_invalid_shapes() {
        for bad in [
            "plainaddress",
            "@example.com",
            "ada@",
            "ada@example",
            "ada@.com",
            "ada@example.",
            "ada@@example.com",
            "ada lovelace@example.com",
        ] {
            let err = validate_email(bad).unwrap_err();
            assert_eq!(message_of(err), "Please enter a valid email address", "{bad}");
        }
    }

    #[test]
    fn test_project_name_trimmed() {
        assert_eq!(
            validate_project_name("  Run a marathon  ").unwrap(),
            "Run a marathon"
        );
    }

    #[test]
    fn test_project_name_required() {
        assert_eq!(
            message_of(validate_project_name("").unwrap_err()),
            "Project name is required"
        );
    }

    #[test]
    fn test_project_name_too_short() {
        assert_eq!(
            message_of(validate_project_name(" ab ").unwrap_err()),
            "Project name must be at least 3 characters"
        );
        assert!(validate_project_name("abc").is_ok());
    }

    #[test]
    fn test_project_name_too_long() {
        assert!(validate_project_name(&"x".repeat(100)).is_ok());
        assert_eq!(
            message_of(validate_project_name(&"x".repeat(101)).unwrap_err()),
            "Project name must be less than 100 characters"
        );
    }

    #[test]
    fn test_project_name_counts_chars_not_bytes() {
        assert!(validate_project_name(&"é".repeat(100)).is_ok());
    }

    #[test]
    fn test_action_message_rules() {
        assert_eq!(
            message_of(validate_action_message(" \n ").unwrap_err()),
            "Message is required"
        );
        assert!(validate_action_message(&"m".repeat(500)).is_ok());
        assert_eq!(
            message_of(validate_action_message(&"m".repeat(501)).unwrap_err()),
            "Message must be less than 500 characters"
        );
    }
}
