use reqwest::{redirect, Method, Response, Url};
use std::collections::HashMap;
use std::sync::{Arc, Once};
use wiremock::MockServer;

use email_subscriptions::{
    config::{get_configuration, Settings},
    startup::Application,
    store::InMemorySubscriberStore,
    telemetry::{get_subscriber, init_subscriber},
};

pub const ROOT_DOMAIN: &str = "example.com";
pub const ALLOWED_ORIGIN: &str = "https://www.example.com";

static TRACING: Once = Once::new();

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemorySubscriberStore>,
    pub email_server: MockServer,
    api_client: reqwest::Client,
}

/// Verification link as it was handed to the email provider.
pub struct VerificationLink {
    pub url: Url,
    pub token: String,
    pub email: String,
}

impl TestApp {
    pub async fn spawn_app() -> TestApp {
        Self::spawn_app_with(|_| {}).await
    }

    pub async fn spawn_app_with(customise: impl FnOnce(&mut Settings)) -> TestApp {
        // Set TEST_LOG to get the bunyan output of a test run
        TRACING.call_once(|| {
            let name = String::from("test");
            let env_filter = String::from("debug");

            if std::env::var("TEST_LOG").is_ok() {
                init_subscriber(get_subscriber(name, env_filter, std::io::stdout));
            } else {
                init_subscriber(get_subscriber(name, env_filter, std::io::sink));
            }
        });

        let mut config = get_configuration().expect("Missing configuration file.");
        let email_server = MockServer::start().await;

        // We are using port 0 as way to define a different port per each test. Port 0 is a special case that operating systems
        // take into account: when port is 0, the OS will search for the first available port
        config.set_app_host(String::from("127.0.0.1"));
        config.set_app_port(0);
        config.set_email_client_base_url(email_server.uri());
        config.set_root_domain(Some(String::from(ROOT_DOMAIN)));
        config.set_db_name(Some(String::from("subscriptions_test")));
        config.set_email_template(Some(String::from("d-test-template")));
        customise(&mut config);

        let store = Arc::new(InMemorySubscriberStore::new());
        let application = Application::build_with_store(config, store.clone())
            .expect("Failed to build application.");
        let address = format!("http://127.0.0.1:{}", application.get_port());

        tokio::spawn(application.run_until_stop());

        // Redirects are asserted on, never followed
        let api_client = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .unwrap();

        TestApp {
            address,
            store,
            email_server,
            api_client,
        }
    }

    pub async fn post_subscription(&self, body: serde_json::Value) -> Response {
        self.request_subscription(Method::POST, Some(ALLOWED_ORIGIN), Some(body))
            .await
    }

    pub async fn post_subscription_with_host(&self, body: serde_json::Value, host: &str) -> Response {
        self.api_client
            .post(format!("{}/subscribe", self.address))
            .header("Origin", ALLOWED_ORIGIN)
            .header("Host", host)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn request_subscription(
        &self,
        method: Method,
        origin: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Response {
        let mut request = self
            .api_client
            .request(method, format!("{}/subscribe", self.address));

        if let Some(origin) = origin {
            request = request.header("Origin", origin);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        request.send().await.expect("Failed to execute request.")
    }

    pub async fn get_verify(&self, query: &str) -> Response {
        self.api_client
            .get(format!("{}/verify?{}", self.address, query))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_verify_with_host(&self, query: &str, host: &str) -> Response {
        self.api_client
            .get(format!("{}/verify?{}", self.address, query))
            .header("Host", host)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Clicks the link against the test server, whatever host the link was built for.
    pub async fn follow_verification_link(&self, link: &VerificationLink) -> Response {
        self.get_verify(link.url.query().unwrap()).await
    }

    pub fn get_verification_link(&self, request: &wiremock::Request) -> VerificationLink {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        let raw_link = body["personalizations"][0]["dynamic_template_data"]["verification_link"]
            .as_str()
            .unwrap();
        let url = Url::parse(raw_link).unwrap();
        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();

        assert_eq!(url.scheme(), "https");
        assert_eq!(url.path(), "/verify");

        VerificationLink {
            token: query["token"].clone(),
            email: query["email"].clone(),
            url,
        }
    }

    pub async fn verification_links(&self) -> Vec<VerificationLink> {
        self.email_server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|request| self.get_verification_link(request))
            .collect()
    }
}

/// Location of a verify response, which must always be a permanent redirect.
pub fn redirect_location(response: &Response) -> Url {
    assert_eq!(response.status().as_u16(), 301);

    let location = response
        .headers()
        .get("Location")
        .expect("Redirect without a Location header.")
        .to_str()
        .unwrap();

    Url::parse(location).unwrap()
}
