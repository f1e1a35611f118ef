use reqwest::Method;
use serde_json::json;
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::{TestApp, ALLOWED_ORIGIN, ROOT_DOMAIN};
use email_subscriptions::domain::subscriber::SubscriberChange;
use email_subscriptions::store::SubscriberStore;

async fn message_of(response: reqwest::Response) -> String {
    let body: serde_json::Value = response.json().await.unwrap();

    body["message"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn subscribe_returns_201_for_a_new_email() {
    let test_app = TestApp::spawn_app().await;

    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&test_app.email_server)
        .await;

    let response = test_app.post_subscription(json!({"email": "a@x.com"})).await;

    assert_eq!(201, response.status().as_u16());
    assert_eq!(
        message_of(response).await,
        "Subscription successful, verification email sent."
    );
}

#[tokio::test]
async fn subscribe_persists_an_unverified_subscriber() {
    let test_app = TestApp::spawn_app().await;

    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&test_app.email_server)
        .await;

    test_app.post_subscription(json!({"email": "a@x.com"})).await;

    let subscriber = test_app
        .store
        .get("a@x.com")
        .expect("Subscriber was not stored.");

    assert_eq!(subscriber.email.as_ref(), "a@x.com");
    assert!(!subscriber.verified);
}

#[tokio::test]
async fn subscribe_sends_a_verification_email_with_the_stored_token() {
    let test_app = TestApp::spawn_app().await;

    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&test_app.email_server)
        .await;

    test_app.post_subscription(json!({"email": "a@x.com"})).await;

    let links = test_app.verification_links().await;
    let subscriber = test_app.store.get("a@x.com").unwrap();
    let stored_token: String = subscriber.verification_token.into();

    assert_eq!(links.len(), 1);
    assert_eq!(links[0].token, stored_token);
    assert_eq!(links[0].email, "a@x.com");
}

#[tokio::test]
async fn verification_links_point_at_the_root_domain_whatever_the_host_header() {
    let test_app = TestApp::spawn_app().await;

    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&test_app.email_server)
        .await;

    let response = test_app
        .post_subscription_with_host(json!({"email": "a@x.com"}), "evil.io")
        .await;

    assert_eq!(201, response.status().as_u16());

    let links = test_app.verification_links().await;

    assert_eq!(links[0].url.host_str(), Some(ROOT_DOMAIN));
}

#[tokio::test]
async fn resubscribing_an_unverified_email_rotates_the_token_and_resends() {
    let test_app = TestApp::spawn_app().await;

    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&test_app.email_server)
        .await;

    test_app.post_subscription(json!({"email": "a@x.com"})).await;
    let response = test_app.post_subscription(json!({"email": "a@x.com"})).await;

    assert_eq!(201, response.status().as_u16());
    assert_eq!(
        message_of(response).await,
        "Already subscribed but not verified, new verification email sent."
    );

    let links = test_app.verification_links().await;
    let stored_token: String = test_app
        .store
        .get("a@x.com")
        .unwrap()
        .verification_token
        .into();

    assert_ne!(links[0].token, links[1].token);
    assert_eq!(links[1].token, stored_token);
}

#[tokio::test]
async fn resubscribing_a_verified_email_is_idempotent() {
    let test_app = TestApp::spawn_app().await;

    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&test_app.email_server)
        .await;

    test_app.post_subscription(json!({"email": "a@x.com"})).await;
    let token = test_app.store.get("a@x.com").unwrap().verification_token;
    test_app
        .store
        .update("a@x.com", &token, SubscriberChange::MarkVerified)
        .await
        .unwrap();

    for _ in 0..2 {
        let response = test_app.post_subscription(json!({"email": "a@x.com"})).await;

        assert_eq!(200, response.status().as_u16());
        assert_eq!(message_of(response).await, "Already subscribed and verified.");
    }

    let subscriber = test_app.store.get("a@x.com").unwrap();
    assert!(subscriber.verified);
    assert_eq!(subscriber.verification_token, token);
}

#[tokio::test]
async fn subscribe_returns_403_when_origin_is_not_allowed() {
    let test_app = TestApp::spawn_app().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&test_app.email_server)
        .await;

    // This is a common practice and it is called table-driven tests.
    let test_cases = vec![
        (None, "missing origin"),
        (Some("https://evil.io"), "foreign origin"),
        (Some("https://evilexample.com"), "lookalike origin"),
        (Some("not a url"), "malformed origin"),
    ];

    for (origin, description) in test_cases {
        let response = test_app
            .request_subscription(Method::POST, origin, Some(json!({"email": "a@x.com"})))
            .await;

        assert_eq!(
            403,
            response.status().as_u16(),
            "The API did not fail with 403 status for a {}",
            description
        );
    }

    assert!(test_app.store.is_empty());
}

#[tokio::test]
async fn subscribe_returns_405_for_methods_other_than_post() {
    let test_app = TestApp::spawn_app().await;

    for method in [Method::GET, Method::PUT, Method::DELETE] {
        let response = test_app
            .request_subscription(method.clone(), Some(ALLOWED_ORIGIN), None)
            .await;

        assert_eq!(
            405,
            response.status().as_u16(),
            "The API did not fail with 405 status for {}",
            method
        );
    }
}

#[tokio::test]
async fn subscribe_answers_preflight_requests_from_allowed_origins() {
    let test_app = TestApp::spawn_app().await;

    let response = test_app
        .request_subscription(Method::OPTIONS, Some(ALLOWED_ORIGIN), None)
        .await;

    assert_eq!(204, response.status().as_u16());
    assert_eq!(
        response.headers()["Access-Control-Allow-Origin"],
        ALLOWED_ORIGIN
    );
    assert_eq!(
        response.headers()["Access-Control-Allow-Methods"],
        "POST, OPTIONS"
    );
}

#[tokio::test]
async fn subscribe_responses_carry_the_allowed_origin() {
    let test_app = TestApp::spawn_app().await;

    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&test_app.email_server)
        .await;

    let response = test_app.post_subscription(json!({"email": "a@x.com"})).await;

    assert_eq!(
        response.headers()["Access-Control-Allow-Origin"],
        ALLOWED_ORIGIN
    );
}

#[tokio::test]
async fn subscribe_returns_400_when_email_is_missing_or_invalid() {
    let test_app = TestApp::spawn_app().await;

    let test_cases = vec![
        (json!({}), "missing email"),
        (json!({"email": ""}), "empty email"),
        (json!({"email": "   "}), "blank email"),
        (json!({"email": "frank.test.com"}), "email without @"),
        (json!({"name": "Frank"}), "unrelated body"),
    ];

    for (invalid_body, description) in test_cases {
        let response = test_app.post_subscription(invalid_body).await;

        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 status when payload had {}",
            description
        );
    }

    assert!(test_app.store.is_empty());
}

#[tokio::test]
async fn subscribe_returns_400_when_body_is_not_json() {
    let test_app = TestApp::spawn_app().await;

    let response = test_app
        .request_subscription(Method::POST, Some(ALLOWED_ORIGIN), None)
        .await;

    assert_eq!(400, response.status().as_u16());
}

#[tokio::test]
async fn subscribe_returns_400_when_required_configuration_is_missing() {
    let test_app = TestApp::spawn_app_with(|config| config.set_email_template(None)).await;

    let response = test_app.post_subscription(json!({"email": "a@x.com"})).await;

    assert_eq!(400, response.status().as_u16());
    assert!(message_of(response).await.contains("email_template"));
    assert!(test_app.store.is_empty());
}

#[tokio::test]
async fn subscribe_returns_500_but_keeps_the_subscriber_when_email_delivery_fails() {
    let test_app = TestApp::spawn_app().await;

    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&test_app.email_server)
        .await;

    let response = test_app.post_subscription(json!({"email": "a@x.com"})).await;

    assert_eq!(500, response.status().as_u16());
    assert_eq!(
        message_of(response).await,
        "Something went wrong, please try again later."
    );

    let links = test_app.verification_links().await;
    let stored_token: String = test_app
        .store
        .get("a@x.com")
        .expect("Subscriber should survive a failed email.")
        .verification_token
        .into();

    assert_eq!(links[0].token, stored_token);
}
