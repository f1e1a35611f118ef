use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::net::TcpListener;
use std::sync::Arc;
use tracing_actix_web::TracingLogger;

use crate::config::{DatabaseSettings, Settings, StoreBackend, SubscriptionSettings};
use crate::email_client::EmailClient;
use crate::notifier::Notifier;
use crate::routes::{health_check, subscribe, verify};
use crate::store::{InMemorySubscriberStore, PostgresSubscriberStore, SubscriberStore};

pub struct Application {
    pub port: u16,
    pub server: Server,
}

impl Application {
    pub async fn build(config: Settings) -> Result<Self, std::io::Error> {
        let store: Arc<dyn SubscriberStore> = match config.database.backend {
            StoreBackend::Postgres => Arc::new(PostgresSubscriberStore::new(
                get_connection_db_pool(&config.database),
            )),
            StoreBackend::Memory => Arc::new(InMemorySubscriberStore::new()),
        };

        Self::build_with_store(config, store)
    }

    /// Builds the application around an already constructed store.
    pub fn build_with_store(
        config: Settings,
        store: Arc<dyn SubscriberStore>,
    ) -> Result<Self, std::io::Error> {
        let sender_email = config
            .get_email_client_sender()
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;
        let email_client = EmailClient::new(
            config.get_email_client_base_url(),
            sender_email,
            config.get_email_client_api(),
            Some(config.get_email_client_timeout()),
        )
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))?;

        let listener = TcpListener::bind(config.get_address())?;
        let port = listener.local_addr()?.port();
        let server = run(
            listener,
            store,
            Arc::new(email_client),
            config.subscription_settings(),
        )?;

        Ok(Self { port, server })
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stop(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub fn run(
    listener: TcpListener,
    store: Arc<dyn SubscriberStore>,
    notifier: Arc<dyn Notifier>,
    settings: SubscriptionSettings,
) -> Result<Server, std::io::Error> {
    let store = web::Data::from(store);
    let notifier = web::Data::from(notifier);
    let settings = web::Data::new(settings);

    let server = HttpServer::new(move || {
        // App is where your application logic lives: routing, middlewares, request handler, etc
        App::new()
            // 'wrap' method adds a middleware to the App. This specific middleware provide incoming
            // request logger
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
            // Every method reaches the handler: it answers preflights and rejects the rest itself
            .route("/subscribe", web::to(subscribe))
            .route("/verify", web::get().to(verify))
            .app_data(store.clone())
            .app_data(notifier.clone())
            .app_data(settings.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}

pub fn get_connection_db_pool(config: &DatabaseSettings) -> Pool<Postgres> {
    PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(config.get_db_options())
}
