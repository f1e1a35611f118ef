use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};

use super::{link_host, DependencyError, MessageBody, MAX_ATTEMPTS};
use crate::config::{MissingSettings, SubscriptionSettings};
use crate::domain::subscriber::SubscriberChange;
use crate::domain::subscription_redirect::{RedirectCode, SubscriptionRedirect};
use crate::domain::verification_token::VerificationToken;
use crate::notifier::Notifier;
use crate::store::SubscriberStore;
use crate::token_issuer::{self, IssuedToken};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Parameters {
    pub token: Option<String>,
    pub email: Option<String>,
}

impl Parameters {
    /// Reads `token` and `email` from a raw query string.
    ///
    /// The first occurrence of a key wins and empty values count as absent. A query that
    /// cannot be decoded at all yields no parameters, so the caller still redirects.
    pub fn from_query(query: &str) -> Self {
        let pairs = match web::Query::<Vec<(String, String)>>::from_query(query) {
            Ok(pairs) => pairs.into_inner(),
            Err(err) => {
                tracing::warn!(error.message = %err, "Ignoring an undecodable query string");
                return Parameters::default();
            }
        };
        let first = |key: &str| {
            pairs
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.clone())
                .filter(|value| !value.trim().is_empty())
        };

        Parameters {
            token: first("token"),
            email: first("email"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified(VerificationToken),
    AlreadyVerified(VerificationToken),
    Reissued,
    UnknownEmail,
}

impl VerifyOutcome {
    fn redirect(self, email: String) -> SubscriptionRedirect {
        match self {
            VerifyOutcome::Verified(token) => SubscriptionRedirect::new(RedirectCode::Verified)
                .email(Some(email))
                .token(Some(token)),
            VerifyOutcome::AlreadyVerified(token) => {
                SubscriptionRedirect::new(RedirectCode::AlreadyVerified)
                    .email(Some(email))
                    .token(Some(token))
            }
            // A stale link is not an error: a fresh one is already on its way
            VerifyOutcome::Reissued => {
                SubscriptionRedirect::new(RedirectCode::Unauthorized).email(Some(email))
            }
            VerifyOutcome::UnknownEmail => {
                SubscriptionRedirect::new(RedirectCode::NotFound).email(Some(email))
            }
        }
    }
}

#[tracing::instrument(
    name = "Verify a subscription",
    skip_all,
    fields(
        subscriber_email = tracing::field::Empty,
        token = tracing::field::Empty
    )
)]
pub async fn verify(
    req: HttpRequest,
    store: web::Data<dyn SubscriberStore>,
    notifier: web::Data<dyn Notifier>,
    settings: web::Data<SubscriptionSettings>,
) -> HttpResponse {
    let Parameters { token, email } = Parameters::from_query(req.query_string());
    let span = tracing::Span::current();
    span.record("subscriber_email", &tracing::field::debug(&email));
    span.record("token", &tracing::field::debug(&token));

    let root_domain = match settings.root_domain() {
        Some(root_domain) => root_domain,
        None => {
            let error = MissingSettings(vec!["root_domain"]);

            tracing::error!(error.message = %error, "Cannot redirect without a root domain");

            return HttpResponse::BadRequest().json(MessageBody {
                message: error.to_string(),
            });
        }
    };

    let redirect = match settings.require() {
        Err(MissingSettings(missing)) => {
            tracing::error!(missing = ?missing, "Verification is not configured");

            SubscriptionRedirect::new(RedirectCode::Internal)
                .email(email)
                .error("configuration")
                .missing_vars(missing)
        }
        Ok(required) => match (email, token) {
            (Some(email), Some(token)) => {
                let result = tokio::time::timeout(
                    settings.request_timeout,
                    verify_subscriber(
                        store.get_ref(),
                        notifier.get_ref(),
                        &email,
                        &token,
                        link_host(&req, &required.root_domain),
                        &required.email_template,
                    ),
                )
                .await
                .map_err(DependencyError::from)
                .and_then(|result| result);

                match result {
                    Ok(outcome) => outcome.redirect(email),
                    Err(err) => {
                        tracing::error!(error.cause_chain = ?err, "Failed to verify a subscription");

                        SubscriptionRedirect::new(RedirectCode::Internal)
                            .email(Some(email))
                            .error(err.kind())
                    }
                }
            }
            (email, token) => {
                tracing::warn!("Verification link is missing its token or email");

                SubscriptionRedirect::new(RedirectCode::Unauthorized)
                    .email(email)
                    .token(token)
            }
        },
    };

    HttpResponse::MovedPermanently()
        .insert_header((header::LOCATION, redirect.location(root_domain)))
        .finish()
}

/// Moves a subscriber to verified when `token` is the one it currently holds.
///
/// A mismatching token on an unverified subscriber rotates the token and resends the
/// link instead of failing, so duplicate clicks and out of order emails recover by
/// themselves.
#[tracing::instrument(
    name = "Verify a subscriber",
    skip(store, notifier, token, template)
)]
pub async fn verify_subscriber(
    store: &dyn SubscriberStore,
    notifier: &dyn Notifier,
    email: &str,
    token: &str,
    base_host: &str,
    template: &str,
) -> Result<VerifyOutcome, DependencyError> {
    for _ in 0..MAX_ATTEMPTS {
        let subscriber = match store.find(email).await? {
            Some(subscriber) => subscriber,
            None => return Ok(VerifyOutcome::UnknownEmail),
        };

        if subscriber.verified {
            return Ok(VerifyOutcome::AlreadyVerified(subscriber.verification_token));
        }

        if !subscriber.verification_token.matches(token) {
            let IssuedToken { token, link } = token_issuer::issue(base_host, &subscriber.email);
            let change = SubscriberChange::RotateToken(token);

            if !store
                .update(email, &subscriber.verification_token, change)
                .await?
            {
                tracing::warn!("Subscriber changed concurrently, re-reading it");
                continue;
            }

            notifier
                .send_verification(&subscriber.email, template, &link)
                .await?;

            return Ok(VerifyOutcome::Reissued);
        }

        if !store
            .update(
                email,
                &subscriber.verification_token,
                SubscriberChange::MarkVerified,
            )
            .await?
        {
            tracing::warn!("Subscriber changed concurrently, re-reading it");
            continue;
        }

        return Ok(VerifyOutcome::Verified(subscriber.verification_token));
    }

    Err(DependencyError::Contention)
}
