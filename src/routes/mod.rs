use actix_web::{http::header, HttpRequest};
use reqwest::Url;

mod errors;
mod health_check;
mod subscribe;
mod verify;

pub use errors::{error_chain_fmt, DependencyError};
pub use health_check::health_check;
pub use subscribe::{subscribe, subscribe_email, SubscribeError, SubscribeOutcome};
pub use verify::{verify, verify_subscriber, VerifyOutcome};

#[derive(serde::Serialize)]
struct MessageBody {
    message: String,
}

// Store round trips allowed before giving up on a record that keeps changing under us.
const MAX_ATTEMPTS: usize = 3;

fn header_value<'a>(req: &'a HttpRequest, name: header::HeaderName) -> Option<&'a str> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// True when `url`'s host is the root domain itself or one of its subdomains.
fn within_root_domain(url: &str, root_domain: &str) -> bool {
    let host = match Url::parse(url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_lowercase))
    {
        Some(host) => host,
        None => return false,
    };
    let root_domain = root_domain.trim_end_matches('.').to_lowercase();

    host == root_domain || host.ends_with(&format!(".{}", root_domain))
}

/// Host a reissued verification link is built on.
///
/// The request's `Host` is only trusted when it lives under the root domain, any other
/// value falls back to the root domain.
fn link_host<'a>(req: &'a HttpRequest, root_domain: &'a str) -> &'a str {
    header_value(req, header::HOST)
        .filter(|host| within_root_domain(&format!("https://{}", host), root_domain))
        .unwrap_or(root_domain)
}
