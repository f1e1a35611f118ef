use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use std::time;

use crate::domain::subscriber_email::SubscriberEmail;
use crate::notifier::{Notifier, NotifierError};

const REQUEST_TIMEOUT: time::Duration = time::Duration::from_secs(10);

pub struct EmailClient {
    http_client: Client,
    base_url: String,
    sender: SubscriberEmail,
    api_key: Secret<String>,
}

#[derive(serde::Serialize)]
pub struct SendEmailBody {
    personalizations: Vec<SengridPersonalization>,
    from: SengridEmail,
    template_id: String,
}

#[derive(serde::Serialize)]
struct SengridEmail {
    email: String,
}

#[derive(serde::Serialize)]
struct SengridPersonalization {
    to: Vec<SengridEmail>,
    dynamic_template_data: VerificationTemplateData,
}

#[derive(serde::Serialize)]
struct VerificationTemplateData {
    verification_link: String,
}

impl EmailClient {
    pub fn new(
        base_url: String,
        sender: SubscriberEmail,
        api_key: Secret<String>,
        timeout: Option<time::Duration>,
    ) -> Result<EmailClient, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(timeout.unwrap_or(REQUEST_TIMEOUT))
            .build()?;

        Ok(EmailClient {
            http_client,
            base_url,
            sender,
            api_key,
        })
    }

    #[tracing::instrument(
        name = "Send a templated email",
        skip(self, recipient),
        fields(recipient = %recipient.as_ref())
    )]
    pub async fn send_email(
        &self,
        recipient: &SubscriberEmail,
        template_id: &str,
        verification_link: &str,
    ) -> Result<(), reqwest::Error> {
        let url = format!("{}/mail/send", self.base_url);
        let body = SendEmailBody {
            from: SengridEmail {
                email: String::from(self.sender.as_ref()),
            },
            personalizations: vec![SengridPersonalization {
                to: vec![SengridEmail {
                    email: String::from(recipient.as_ref()),
                }],
                dynamic_template_data: VerificationTemplateData {
                    verification_link: String::from(verification_link),
                },
            }],
            template_id: String::from(template_id),
        };

        self.http_client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&body)
            .send()
            .await?
            .error_for_status()?; // return an error when server response status code is 4xx or 5xx

        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailClient {
    async fn send_verification(
        &self,
        recipient: &SubscriberEmail,
        template: &str,
        verification_link: &str,
    ) -> Result<(), NotifierError> {
        self.send_email(recipient, template, verification_link)
            .await
            .map_err(NotifierError::from)
    }
}
