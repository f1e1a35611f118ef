use validator::validate_email;

/// Address exactly as the visitor typed it. Lookups are case-sensitive, so no
/// normalisation happens here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberEmail(String);

impl SubscriberEmail {
    pub fn parse(email: String) -> Result<SubscriberEmail, String> {
        if !validate_email(&email) {
            return Err(format!("{} is not a valid email address", email));
        }

        Ok(Self(email))
    }
}

impl TryFrom<String> for SubscriberEmail {
    type Error = String;

    fn try_from(email: String) -> Result<Self, Self::Error> {
        Self::parse(email)
    }
}

impl AsRef<str> for SubscriberEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubscriberEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
