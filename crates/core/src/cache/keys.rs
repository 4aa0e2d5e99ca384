use crate::keys::canonicalize;

/// Returns the cache key for a single user.
pub fn user_key(user_id: &str) -> String {
    format!("user:{user_id}")
}

/// Returns the cache key mapping an email address to a user id.
///
/// The email is case-folded, matching the email index.
pub fn user_email_key(email: &str) -> String {
    format!("user:email:{}", canonicalize(email))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_key() {
        assert_eq!(user_key("u1"), "user:u1");
    }

    #[test]
    fn test_user_email_key_is_case_folded() {
        assert_eq!(user_email_key("Test@Example.com"), "user:email:test@example.com");
        assert_eq!(user_email_key("a@B.com"), user_email_key("A@b.COM"));
    }

    #[test]
    fn test_keys_do_not_collide() {
        // A user id never contains ':' so the email namespace stays apart.
        assert_ne!(user_key("email"), user_email_key(""));
    }
}
