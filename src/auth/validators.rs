use super::models::RegisterRequest;
use crate::common::{ValidationResult, Validator};
use crate::services::identity::MIN_PASSWORD_LENGTH;

impl Validator for RegisterRequest {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        let email = self.email.trim();
        if email.is_empty() {
            result.add_error("email", "Email is required");
        } else if !looks_like_email(email) {
            result.add_error("email", "Email address is not valid");
        } else if email.len() > 255 {
            result.add_error("email", "Email must not exceed 255 characters");
        }

        let username = self.username.trim();
        if username.is_empty() {
            result.add_error("username", "Username is required");
        } else if username.len() > 50 {
            result.add_error("username", "Username must not exceed 50 characters");
        } else if !username
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            result.add_error(
                "username",
                "Username may only contain letters, digits, underscores and hyphens",
            );
        }

        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            result.add_error("password", "Password must be at least 6 characters");
        }

        result
    }
}

/// Minimal structural check: one '@' with non-empty local part and a domain
/// containing a dot. Real validation happens when the address is used.
fn looks_like_email(value: &str) -> bool {
    let mut parts = value.splitn(2, '@');
    let local = parts.next().unwrap_or("");
    let domain = parts.next().unwrap_or("");

    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, username: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_valid_request_passes() {
        let result = request("ana@example.com", "ana", "hunter22").validate();
        assert!(result.is_valid());
    }

    #[test]
    fn test_invalid_email_is_rejected() {
        for email in ["", "no-at-sign", "@example.com", "ana@", "ana@nodot", "ana@.com"] {
            let result = request(email, "ana", "hunter22").validate();
            assert!(!result.is_valid(), "email {:?} should be rejected", email);
        }
    }

    #[test]
    fn test_bad_username_is_rejected() {
        assert!(!request("a@b.com", "", "hunter22").validate().is_valid());
        assert!(!request("a@b.com", "has spaces", "hunter22").validate().is_valid());
        assert!(!request("a@b.com", &"x".repeat(51), "hunter22").validate().is_valid());
    }

    #[test]
    fn test_short_password_is_rejected() {
        let result = request("a@b.com", "ana", "12345").validate();
        assert!(!result.is_valid());
        assert_eq!(result.errors()[0].field, "password");
    }
}
