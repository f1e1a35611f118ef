use actix_web::http::header::{self, HeaderValue};
use actix_web::http::{Method, StatusCode};
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use std::time;

use super::{header_value, within_root_domain, DependencyError, MessageBody, MAX_ATTEMPTS};
use crate::config::{MissingSettings, RequiredSettings, SubscriptionSettings};
use crate::domain::new_subscriber::{NewSubscriber, NewSubscriberBody};
use crate::domain::subscriber::{Subscriber, SubscriberChange};
use crate::notifier::Notifier;
use crate::store::SubscriberStore;
use crate::token_issuer::{self, IssuedToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Created,
    AlreadyVerified,
    Reissued,
}

impl SubscribeOutcome {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SubscribeOutcome::Created | SubscribeOutcome::Reissued => StatusCode::CREATED,
            SubscribeOutcome::AlreadyVerified => StatusCode::OK,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            SubscribeOutcome::Created => "Subscription successful, verification email sent.",
            SubscribeOutcome::AlreadyVerified => "Already subscribed and verified.",
            SubscribeOutcome::Reissued => {
                "Already subscribed but not verified, new verification email sent."
            }
        }
    }
}

#[derive(thiserror::Error)]
pub enum SubscribeError {
    #[error(transparent)]
    Configuration(#[from] MissingSettings),
    #[error("Origin is not allowed to subscribe.")]
    Forbidden,
    #[error("Method {0} is not allowed, use POST.")]
    MethodNotAllowed(Method),
    #[error("Invalid subscription request: {0}")]
    Validation(String),
    #[error(transparent)]
    Dependency(#[from] DependencyError),
}

impl std::fmt::Debug for SubscribeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        super::error_chain_fmt(self, f)
    }
}

impl ResponseError for SubscribeError {
    fn status_code(&self) -> StatusCode {
        match self {
            SubscribeError::Configuration(_) => StatusCode::BAD_REQUEST,
            SubscribeError::Forbidden => StatusCode::FORBIDDEN,
            SubscribeError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            SubscribeError::Validation(_) => StatusCode::BAD_REQUEST,
            SubscribeError::Dependency(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            // Dependency details stay in the logs
            SubscribeError::Dependency(_) => {
                String::from("Something went wrong, please try again later.")
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(MessageBody { message })
    }
}

#[tracing::instrument(
    name = "Subscribe handler",
    skip_all,
    fields(
        method = %req.method(),
        subscriber_email = tracing::field::Empty
    )
)]
pub async fn subscribe(
    req: HttpRequest,
    body: web::Bytes,
    store: web::Data<dyn SubscriberStore>,
    notifier: web::Data<dyn Notifier>,
    settings: web::Data<SubscriptionSettings>,
) -> HttpResponse {
    let required = match settings.require() {
        Ok(required) => required,
        Err(missing) => return reject(missing.into()),
    };
    let origin = match allowed_origin(&req, &required.root_domain) {
        Some(origin) => origin,
        None => return reject(SubscribeError::Forbidden),
    };

    let response = if req.method() == Method::OPTIONS {
        HttpResponse::NoContent()
            .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"))
            .insert_header((header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"))
            .finish()
    } else {
        let result = handle_subscription(
            &req,
            &body,
            &required,
            store.get_ref(),
            notifier.get_ref(),
            settings.request_timeout,
        )
        .await;

        match result {
            Ok(outcome) => HttpResponse::build(outcome.status_code()).json(MessageBody {
                message: String::from(outcome.message()),
            }),
            Err(err) => reject(err),
        }
    };

    with_cors(response, origin)
}

async fn handle_subscription(
    req: &HttpRequest,
    body: &[u8],
    required: &RequiredSettings,
    store: &dyn SubscriberStore,
    notifier: &dyn Notifier,
    deadline: time::Duration,
) -> Result<SubscribeOutcome, SubscribeError> {
    if req.method() != Method::POST {
        return Err(SubscribeError::MethodNotAllowed(req.method().clone()));
    }

    let body: NewSubscriberBody = serde_json::from_slice(body)
        .map_err(|err| SubscribeError::Validation(err.to_string()))?;
    let new_subscriber: NewSubscriber = body.try_into().map_err(SubscribeError::Validation)?;

    tracing::Span::current().record(
        "subscriber_email",
        &tracing::field::display(new_subscriber.email.as_ref()),
    );

    let outcome = tokio::time::timeout(
        deadline,
        subscribe_email(
            store,
            notifier,
            &new_subscriber,
            &required.root_domain,
            &required.email_template,
        ),
    )
    .await
    .map_err(DependencyError::from)??;

    Ok(outcome)
}

/// Runs the subscription state machine for an already validated email.
///
/// The store is always written before the email goes out, so a delivery failure leaves
/// the latest token persisted and a retry of the request resends a working link.
///
/// Losing the insert to a concurrent first subscription of the same address reports
/// `Created` without rotating or sending: the winner's email already carries the token.
#[tracing::instrument(
    name = "Subscribe an email address",
    skip(store, notifier, new_subscriber, template),
    fields(subscriber_email = %new_subscriber.email.as_ref())
)]
pub async fn subscribe_email(
    store: &dyn SubscriberStore,
    notifier: &dyn Notifier,
    new_subscriber: &NewSubscriber,
    base_host: &str,
    template: &str,
) -> Result<SubscribeOutcome, DependencyError> {
    let email = &new_subscriber.email;
    let mut lost_insert = false;

    for _ in 0..MAX_ATTEMPTS {
        match store.find(email.as_ref()).await? {
            None => {
                let IssuedToken { token, link } = token_issuer::issue(base_host, email);
                let subscriber = Subscriber::new(email.clone(), token);

                if !store.insert(&subscriber).await? {
                    tracing::warn!("Subscriber was created concurrently, re-reading it");
                    lost_insert = true;
                    continue;
                }

                notifier.send_verification(email, template, &link).await?;

                return Ok(SubscribeOutcome::Created);
            }
            Some(subscriber) if subscriber.verified => {
                return Ok(SubscribeOutcome::AlreadyVerified);
            }
            Some(_) if lost_insert => {
                return Ok(SubscribeOutcome::Created);
            }
            Some(subscriber) => {
                let IssuedToken { token, link } = token_issuer::issue(base_host, email);
                let change = SubscriberChange::RotateToken(token);

                if !store
                    .update(email.as_ref(), &subscriber.verification_token, change)
                    .await?
                {
                    tracing::warn!("Subscriber changed concurrently, re-reading it");
                    continue;
                }

                notifier.send_verification(email, template, &link).await?;

                return Ok(SubscribeOutcome::Reissued);
            }
        }
    }

    Err(DependencyError::Contention)
}

fn reject(error: SubscribeError) -> HttpResponse {
    match &error {
        SubscribeError::Dependency(_) => {
            tracing::error!(error.cause_chain = ?error, "Failed to process a subscription");
        }
        _ => {
            tracing::warn!(error.message = %error, "Rejected a subscription request");
        }
    }

    error.error_response()
}

fn allowed_origin<'a>(req: &'a HttpRequest, root_domain: &str) -> Option<&'a str> {
    let origin = header_value(req, header::ORIGIN)?;

    within_root_domain(origin, root_domain).then_some(origin)
}

fn with_cors(mut response: HttpResponse, origin: &str) -> HttpResponse {
    if let Ok(origin) = HeaderValue::from_str(origin) {
        let headers = response.headers_mut();

        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    }

    response
}
