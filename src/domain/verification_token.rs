use uuid::Uuid;

/// Opaque credential proving control of an email address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationToken(String);

impl VerificationToken {
    /// Backed by a v4 UUID, so every token carries 122 bits of OS randomness.
    pub fn generate() -> VerificationToken {
        Self(Uuid::new_v4().to_string())
    }

    pub fn parse(token: String) -> Result<VerificationToken, String> {
        if token.trim().is_empty() {
            return Err(String::from("verification token cannot be empty"));
        }

        Ok(Self(token))
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.0 == candidate
    }
}

impl AsRef<str> for VerificationToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<VerificationToken> for String {
    fn from(token: VerificationToken) -> Self {
        token.0
    }
}
