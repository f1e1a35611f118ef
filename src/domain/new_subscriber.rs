use serde::Deserialize;

use crate::domain::subscriber_email::SubscriberEmail;

#[derive(Debug)]
pub struct NewSubscriber {
    pub email: SubscriberEmail,
}

#[derive(Deserialize, Debug)]
pub struct NewSubscriberBody {
    pub email: Option<String>,
}

impl TryFrom<NewSubscriberBody> for NewSubscriber {
    type Error = String;

    fn try_from(body: NewSubscriberBody) -> Result<Self, Self::Error> {
        let email = match body.email {
            Some(email) if !email.trim().is_empty() => email,
            _ => return Err(String::from("email is required")),
        };
        let email = SubscriberEmail::parse(email)?;

        Ok(NewSubscriber { email })
    }
}
