use config::{Config, ConfigError, File};
use secrecy::{ExposeSecret, Secret};
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::{
    postgres::{PgConnectOptions, PgSslMode},
    ConnectOptions,
};
use std::time;

use crate::domain::subscriber_email::SubscriberEmail;

#[derive(Debug)]
pub enum Environment {
    Development,
    Production,
}

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub email_client: EmailClientSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    // Host the subscription status page lives on. Origins must belong to it.
    pub root_domain: Option<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub request_timeout_milliseconds: u64,
}

#[derive(serde::Deserialize, Clone)]
pub struct EmailClientSettings {
    pub base_url: String,
    pub sender_email: String,
    pub api_key: Secret<String>,
    // Template id registered on the email provider side
    pub template_id: Option<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub backend: StoreBackend,
    pub username: String,
    // secrecy protects secret information and prevents them to be exposed (eg: via logs)
    pub password: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub name: Option<String>,
    pub require_ssl: bool,
}

/// Settings the subscription handlers check on every request.
///
/// They are optional at process start: a missing value fails the request that needs it
/// instead of preventing the server from booting.
#[derive(Clone, Debug)]
pub struct SubscriptionSettings {
    pub root_domain: Option<String>,
    pub db_name: Option<String>,
    pub email_template: Option<String>,
    pub request_timeout: time::Duration,
}

#[derive(Clone, Debug)]
pub struct RequiredSettings {
    pub root_domain: String,
    pub db_name: String,
    pub email_template: String,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("Missing required configuration: {}", .0.join(", "))]
pub struct MissingSettings(pub Vec<&'static str>);

impl Settings {
    pub fn get_address(&self) -> String {
        format!(
            "{}:{}",
            self.application.get_host(),
            self.application.get_port()
        )
    }

    pub fn get_db_options(&self) -> PgConnectOptions {
        self.database.get_db_options()
    }

    pub fn get_email_client_sender(&self) -> Result<SubscriberEmail, String> {
        self.email_client.get_sender_email()
    }

    pub fn get_email_client_base_url(&self) -> String {
        self.email_client.get_base_url()
    }

    pub fn get_email_client_api(&self) -> Secret<String> {
        self.email_client.get_api_key()
    }

    pub fn get_email_client_timeout(&self) -> time::Duration {
        self.email_client.get_timeout()
    }

    pub fn set_email_client_base_url(&mut self, new_base_url: String) {
        self.email_client.set_base_url(new_base_url)
    }

    pub fn set_email_template(&mut self, template_id: Option<String>) {
        self.email_client.template_id = template_id
    }

    pub fn set_db_name(&mut self, db_name: Option<String>) {
        self.database.set_name(db_name)
    }

    pub fn set_app_host(&mut self, host: String) {
        self.application.host = host;
    }

    pub fn set_app_port(&mut self, port: u16) {
        self.application.port = port;
    }

    pub fn set_root_domain(&mut self, root_domain: Option<String>) {
        self.application.root_domain = root_domain;
    }

    pub fn subscription_settings(&self) -> SubscriptionSettings {
        SubscriptionSettings {
            root_domain: self.application.root_domain.clone(),
            db_name: self.database.name.clone(),
            email_template: self.email_client.template_id.clone(),
            request_timeout: time::Duration::from_millis(
                self.application.request_timeout_milliseconds,
            ),
        }
    }
}

impl DatabaseSettings {
    pub fn get_db_options(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };

        let mut db_options = PgConnectOptions::new()
            .host(&self.host)
            .password(self.password.expose_secret())
            .username(&self.username)
            .port(self.port)
            .ssl_mode(ssl_mode);

        if let Some(name) = &self.name {
            db_options = db_options.database(name);
        }

        db_options.log_statements(tracing::log::LevelFilter::Trace);

        db_options
    }

    pub fn set_name(&mut self, new_db_name: Option<String>) {
        self.name = new_db_name
    }
}

impl ApplicationSettings {
    pub fn get_port(&self) -> u16 {
        self.port
    }

    pub fn get_host(&self) -> String {
        self.host.clone()
    }
}

impl EmailClientSettings {
    pub fn get_sender_email(&self) -> Result<SubscriberEmail, String> {
        SubscriberEmail::parse(self.sender_email.clone())
    }

    pub fn get_base_url(&self) -> String {
        self.base_url.clone()
    }

    pub fn get_api_key(&self) -> Secret<String> {
        self.api_key.clone()
    }

    pub fn get_timeout(&self) -> time::Duration {
        time::Duration::from_millis(self.timeout_milliseconds)
    }

    pub fn set_base_url(&mut self, new_base_url: String) {
        self.base_url = new_base_url
    }
}

impl SubscriptionSettings {
    pub fn root_domain(&self) -> Option<&str> {
        present(&self.root_domain)
    }

    /// Resolves every setting the handlers need, listing all the missing ones at once.
    pub fn require(&self) -> Result<RequiredSettings, MissingSettings> {
        let root_domain = present(&self.root_domain);
        let db_name = present(&self.db_name);
        let email_template = present(&self.email_template);

        match (root_domain, db_name, email_template) {
            (Some(root_domain), Some(db_name), Some(email_template)) => Ok(RequiredSettings {
                root_domain: root_domain.to_owned(),
                db_name: db_name.to_owned(),
                email_template: email_template.to_owned(),
            }),
            _ => {
                let missing = [
                    ("root_domain", root_domain),
                    ("db_name", db_name),
                    ("email_template", email_template),
                ]
                .into_iter()
                .filter(|(_, value)| value.is_none())
                .map(|(key, _)| key)
                .collect();

                Err(MissingSettings(missing))
            }
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            unknown_env => Err(format!(
                "{} is not supported environment. Use either 'development' or 'production'.",
                unknown_env
            )),
        }
    }
}

pub fn get_configuration() -> Result<Settings, ConfigError> {
    let root_path = std::env::current_dir().expect("Failed to determine the current directory");
    let config_directory = root_path.join("config");
    // Uses development environment by default
    let enviroment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "development".into())
        .try_into()
        .expect("Failed to parse APP_ENVIRONMENT");
    let config_base_filepath = config_directory.join("base");
    let config_env_filepath = config_directory.join(enviroment.as_str());

    // It merges the base configuration file with the one from the specific environment (development or production)
    let settings = Config::builder()
        .add_source(File::from(config_base_filepath).required(true))
        .add_source(File::from(config_env_filepath).required(true))
        // Merge settings from environment variables with a prefix of APP and "__" separator
        // E.g APP_APPLICATION__PORT would set Settings.application.port
        .add_source(config::Environment::with_prefix("app").separator("__"))
        .build()?;

    tracing::info!("Application environment = {:?}", enviroment);

    // Try to convert the value from the configuration file into a Settings type
    settings.try_deserialize()
}
