use std::fmt;

use zeroize::Zeroizing;

/// Email/password pair for an explicit login.
///
/// Never persisted. The password buffer is zeroed when the value is dropped,
/// which the session manager does as soon as the login attempt completes.
pub struct Credentials {
    email: String,
    password: Zeroizing<String>,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: Zeroizing::new(password.into()),
        }
    }

    /// Build credentials from optional request fields.
    /// Returns `None` when either field is missing or blank.
    pub fn from_parts(email: Option<String>, password: Option<String>) -> Option<Self> {
        match (email, password) {
            (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
                Some(Self::new(email.trim(), password))
            }
            _ => None,
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_requires_both_fields() {
        assert!(Credentials::from_parts(None, Some("pw".into())).is_none());
        assert!(Credentials::from_parts(Some("a@b.c".into()), None).is_none());
        assert!(Credentials::from_parts(Some("  ".into()), Some("pw".into())).is_none());
        assert!(Credentials::from_parts(Some("a@b.c".into()), Some(String::new())).is_none());

        let creds = Credentials::from_parts(Some(" a@b.c ".into()), Some("pw".into()))
            .expect("both fields present");
        assert_eq!(creds.email(), "a@b.c");
        assert_eq!(creds.password(), "pw");
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("a@b.c", "hunter2");
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("a@b.c"));
        assert!(!rendered.contains("hunter2"));
    }
}
