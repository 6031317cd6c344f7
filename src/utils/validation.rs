//! Input validation primitives.
//!
//! Provides ergonomic helpers for common validation patterns plus the
//! naming rules enforced before any user-supplied string reaches an
//! external tool.

use crate::error::{Error, Result};

/// Require an Option to contain a value.
pub fn require<T>(opt: Option<T>, field: &str, message: &str) -> Result<T> {
    opt.ok_or_else(|| Error::validation_invalid_argument(field, message, None))
}

/// Require a string to be non-empty after trimming.
///
/// Returns a reference to the trimmed string on success.
pub fn require_non_empty<'a>(value: &'a str, field: &str, message: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(Error::validation_invalid_argument(field, message, None))
    } else {
        Ok(trimmed)
    }
}

/// Validate a repository name: non-empty, no whitespace anywhere.
pub fn repo_name<'a>(value: &'a str) -> Result<&'a str> {
    let trimmed = require_non_empty(value, "repoName", "Repository name cannot be empty")?;
    if trimmed.chars().any(char::is_whitespace) {
        return Err(Error::validation_invalid_argument(
            "repoName",
            "Repository name cannot contain whitespace",
            Some(value.to_string()),
        ));
    }
    Ok(trimmed)
}

/// Validate a user identifier: ASCII letters and digits only.
pub fn user_identifier<'a>(value: &'a str) -> Result<&'a str> {
    let trimmed = require_non_empty(value, "user", "Username cannot be empty")?;
    if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::validation_invalid_argument(
            "user",
            "Username must be alphanumeric",
            Some(value.to_string()),
        ));
    }
    Ok(trimmed)
}

/// Validate an artifact name: letters, digits, underscore, hyphen.
pub fn artifact_name<'a>(value: &'a str) -> Result<&'a str> {
    let trimmed = require_non_empty(value, "name", "Artifact name cannot be empty")?;
    let rule = regex::Regex::new(r"^[A-Za-z0-9_-]+$").expect("artifact name rule");
    if !rule.is_match(trimmed) {
        return Err(Error::validation_invalid_argument(
            "name",
            "Artifact name may only contain letters, digits, underscore, and hyphen",
            Some(value.to_string()),
        ));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_returns_value_when_some() {
        let result = require(Some("value"), "field", "msg");
        assert_eq!(result.unwrap(), "value");
    }

    #[test]
    fn require_returns_error_when_none() {
        let result: Result<&str> = require(None, "field", "Missing field");
        assert!(result.is_err());
    }

    #[test]
    fn require_non_empty_trims_whitespace() {
        let result = require_non_empty("  hello  ", "field", "msg");
        assert_eq!(result.unwrap(), "hello");
    }

    #[test]
    fn require_non_empty_fails_for_whitespace_only() {
        let result = require_non_empty("   ", "field", "Cannot be empty");
        assert!(result.is_err());
    }

    #[test]
    fn repo_name_rejects_empty() {
        assert!(repo_name("").is_err());
        assert!(repo_name("   ").is_err());
    }

    #[test]
    fn repo_name_rejects_interior_whitespace() {
        assert!(repo_name("my repo").is_err());
        assert!(repo_name("my\trepo").is_err());
    }

    #[test]
    fn repo_name_accepts_hyphenated_names() {
        assert_eq!(repo_name("proj-x").unwrap(), "proj-x");
    }

    #[test]
    fn user_identifier_rejects_punctuation() {
        assert!(user_identifier("jane.doe").is_err());
        assert!(user_identifier("jane doe").is_err());
        assert_eq!(user_identifier("jdoe42").unwrap(), "jdoe42");
    }

    #[test]
    fn artifact_name_enforces_charset() {
        assert_eq!(artifact_name("daily_load-v2").unwrap(), "daily_load-v2");
        assert!(artifact_name("bad name").is_err());
        assert!(artifact_name("semi;colon").is_err());
        assert!(artifact_name("").is_err());
    }
}
