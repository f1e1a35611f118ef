use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::verification_token::VerificationToken;

pub struct IssuedToken {
    pub token: VerificationToken,
    pub link: String,
}

/// Mints a fresh token and the link that proves ownership of `email` when clicked.
pub fn issue(base_host: &str, email: &SubscriberEmail) -> IssuedToken {
    let token = VerificationToken::generate();
    let link = format!(
        "https://{}/verify?token={}&email={}",
        base_host,
        token.as_ref(),
        urlencoding::encode(email.as_ref())
    );

    IssuedToken { token, link }
}
