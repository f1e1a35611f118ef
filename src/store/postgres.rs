use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};

use super::{StoreError, SubscriberStore};
use crate::domain::subscriber::{Subscriber, SubscriberChange};
use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::verification_token::VerificationToken;

pub struct PostgresSubscriberStore {
    db_pool: PgPool,
}

impl PostgresSubscriberStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriberStore for PostgresSubscriberStore {
    #[tracing::instrument(name = "Fetch a subscriber by email", skip(self))]
    async fn find(&self, email: &str) -> Result<Option<Subscriber>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT email, subscribed_at, verification_token, verified
            FROM subscribers
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db_pool)
        .await
        .map_err(|err| {
            tracing::error!("Failed to execute query: {:?}", err);
            err
        })?;

        row.map(subscriber_from_row).transpose()
    }

    #[tracing::instrument(
        name = "Insert a new subscriber into the database",
        skip(self, subscriber),
        fields(subscriber_email = %subscriber.email.as_ref())
    )]
    async fn insert(&self, subscriber: &Subscriber) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO subscribers (email, subscribed_at, verification_token, verified)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(subscriber.email.as_ref())
        .bind(subscriber.subscribed_at)
        .bind(subscriber.verification_token.as_ref())
        .bind(subscriber.verified)
        .execute(&self.db_pool)
        .await
        .map_err(|err| {
            tracing::error!("Failed to execute query: {:?}", err);
            err
        })?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(name = "Update a pending subscriber", skip(self, expected_token))]
    async fn update(
        &self,
        email: &str,
        expected_token: &VerificationToken,
        change: SubscriberChange,
    ) -> Result<bool, StoreError> {
        let query = match &change {
            SubscriberChange::RotateToken(token) => sqlx::query(
                r#"
                UPDATE subscribers
                SET verification_token = $3
                WHERE email = $1 AND verification_token = $2 AND verified = FALSE
                "#,
            )
            .bind(email)
            .bind(expected_token.as_ref())
            .bind(token.as_ref()),
            SubscriberChange::MarkVerified => sqlx::query(
                r#"
                UPDATE subscribers
                SET verified = TRUE
                WHERE email = $1 AND verification_token = $2 AND verified = FALSE
                "#,
            )
            .bind(email)
            .bind(expected_token.as_ref()),
        };

        let result = query.execute(&self.db_pool).await.map_err(|err| {
            tracing::error!("Failed to execute query: {:?}", err);
            err
        })?;

        Ok(result.rows_affected() == 1)
    }
}

fn subscriber_from_row(row: PgRow) -> Result<Subscriber, StoreError> {
    Ok(Subscriber {
        email: SubscriberEmail::parse(row.try_get("email")?).map_err(StoreError::Malformed)?,
        subscribed_at: row.try_get("subscribed_at")?,
        verification_token: VerificationToken::parse(row.try_get("verification_token")?)
            .map_err(StoreError::Malformed)?,
        verified: row.try_get("verified")?,
    })
}
