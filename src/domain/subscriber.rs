use chrono::{DateTime, Utc};

use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::verification_token::VerificationToken;

#[derive(Debug, Clone)]
pub struct Subscriber {
    pub email: SubscriberEmail,
    pub subscribed_at: DateTime<Utc>,
    pub verification_token: VerificationToken,
    pub verified: bool,
}

/// The only mutations a stored subscriber accepts. There is no way back to unverified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriberChange {
    RotateToken(VerificationToken),
    MarkVerified,
}

impl Subscriber {
    pub fn new(email: SubscriberEmail, verification_token: VerificationToken) -> Subscriber {
        Subscriber {
            email,
            subscribed_at: Utc::now(),
            verification_token,
            verified: false,
        }
    }

    /// True while the record can still move forward from the state the caller observed.
    pub fn accepts_change_from(&self, expected_token: &VerificationToken) -> bool {
        !self.verified && &self.verification_token == expected_token
    }

    pub fn apply(&mut self, change: SubscriberChange) {
        match change {
            SubscriberChange::RotateToken(token) => self.verification_token = token,
            SubscriberChange::MarkVerified => self.verified = true,
        }
    }
}
