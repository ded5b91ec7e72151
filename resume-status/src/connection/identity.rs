//! User identity validation.

use regex::Regex;
use std::sync::LazyLock;

use crate::errors::InvalidIdentityError;

// Broker destinations are matched as patterns, so wildcard and template
// characters (`*`, `?`, `{`, `}`) must never reach a SUBSCRIBE.
#[allow(clippy::expect_used)]
static IDENTITY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._@-]+$").expect("identity pattern is valid"));

/// Checks that an identity can be used as the last segment of a destination.
///
/// Only letters, digits, `.`, `_`, `@` and `-` are accepted, so a valid
/// identity is always a literal channel name and two different valid
/// identities always produce two different channels.
pub fn validate_identity(identity: &str) -> Result<(), InvalidIdentityError> {
    if identity.is_empty() {
        return Err(InvalidIdentityError::empty());
    }
    if identity.contains('/') {
        return Err(InvalidIdentityError::new(identity, "identity must not contain '/'"));
    }
    if !IDENTITY_PATTERN.is_match(identity) {
        return Err(InvalidIdentityError::new(
            identity,
            "identity may only contain letters, digits, '.', '_', '@' and '-'",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_uuid() {
        assert!(validate_identity("3f2b8c1e-9a4d-4e2f-8b7a-1c2d3e4f5a6b").is_ok());
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(validate_identity(""), Err(InvalidIdentityError::empty()));
    }

    #[test]
    fn test_rejects_separator() {
        let err = validate_identity("u1/../u2").unwrap_err();
        assert_eq!(err.reason, "identity must not contain '/'");
    }

    #[test]
    fn test_rejects_whitespace() {
        assert!(validate_identity("user 1").is_err());
        assert!(validate_identity("user\n1").is_err());
        assert!(validate_identity(" ").is_err());
    }

    #[test]
    fn test_rejects_broker_wildcards() {
        for identity in ["*", "**", "user-*", "user?", "{id}", "a{b}"] {
            let err = validate_identity(identity).unwrap_err();
            assert_eq!(err.identity, identity);
        }
    }

    #[test]
    fn test_accepts_email_like_identity() {
        assert!(validate_identity("jane.doe@example.com").is_ok());
        assert!(validate_identity("user_42").is_ok());
    }
}
