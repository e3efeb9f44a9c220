//! PostgreSQL message repository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row, postgres::PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

use crate::domain::{
    AppError, Chain, DatabaseError, MessageRecord, MessageRepository, NewMessage,
};

/// PostgreSQL connection pool configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

const SELECT_COLUMNS: &str = "id, chain, sender, receiver, message, tx_signature, \
                              token_address, fee_paid, created_at";

/// PostgreSQL message store with connection pooling
pub struct PostgresMessageStore {
    pool: PgPool,
}

impl PostgresMessageStore {
    /// Create a new PostgreSQL store with custom configuration
    pub async fn new(database_url: &str, config: PostgresConfig) -> Result<Self, AppError> {
        info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a new PostgreSQL store with default configuration
    pub async fn with_defaults(database_url: &str) -> Result<Self, AppError> {
        Self::new(database_url, PostgresConfig::default()).await
    }

    /// Run database migrations using sqlx migrate
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Migration(e.to_string())))?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying connection pool (for testing)
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Parse a database row into a MessageRecord
    fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<MessageRecord, AppError> {
        let chain_str: String = row.get("chain");
        let chain: Chain = chain_str.parse().map_err(|_| {
            AppError::Database(DatabaseError::Query(format!(
                "Unknown chain value in row: {chain_str}"
            )))
        })?;

        Ok(MessageRecord {
            id: row.get("id"),
            chain,
            sender: row.get("sender"),
            receiver: row.get("receiver"),
            message: row.get("message"),
            tx_signature: row.get("tx_signature"),
            token_address: row.get("token_address"),
            fee_paid: row.get("fee_paid"),
            created_at: row.get("created_at"),
        })
    }

    async fn fetch_messages(
        &self,
        where_clause: &str,
        wallet: &str,
        limit: i64,
    ) -> Result<Vec<MessageRecord>, AppError> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM messages WHERE {where_clause} \
             ORDER BY created_at DESC LIMIT $2"
        );
        let rows = sqlx::query(&query)
            .bind(wallet)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn count_where(&self, where_clause: &str, wallet: &str) -> Result<i64, AppError> {
        let query = format!("SELECT COUNT(*) AS total FROM messages WHERE {where_clause}");
        let row = sqlx::query(&query)
            .bind(wallet)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;
        Ok(row.get("total"))
    }
}

#[async_trait]
impl MessageRepository for PostgresMessageStore {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        Ok(())
    }

    #[instrument(skip(self, message), fields(tx_signature = %message.tx_signature))]
    async fn insert_message(&self, message: &NewMessage) -> Result<MessageRecord, AppError> {
        let id = uuid::Uuid::new_v4();
        let now = Utc::now();

        // The unique constraint on tx_signature surfaces as a Duplicate
        // error here; the caller decides whether that is a conflict or an
        // idempotent replay.
        sqlx::query(
            r#"
            INSERT INTO messages (id, chain, sender, receiver, message,
                                  tx_signature, token_address, fee_paid, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(id)
        .bind(message.chain.as_str())
        .bind(&message.sender)
        .bind(&message.receiver)
        .bind(&message.message)
        .bind(&message.tx_signature)
        .bind(&message.token_address)
        .bind(message.fee_paid)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::from(e)))?;

        Ok(MessageRecord {
            id,
            chain: message.chain,
            sender: message.sender.clone(),
            receiver: message.receiver.clone(),
            message: message.message.clone(),
            tx_signature: message.tx_signature.clone(),
            token_address: message.token_address.clone(),
            fee_paid: message.fee_paid,
            created_at: now,
        })
    }

    #[instrument(skip(self))]
    async fn find_by_signature(
        &self,
        tx_signature: &str,
    ) -> Result<Option<MessageRecord>, AppError> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM messages WHERE tx_signature = $1");
        let row = sqlx::query(&query)
            .bind(tx_signature)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Query(e.to_string())))?;

        match row {
            Some(row) => Ok(Some(Self::row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn sent_by(&self, wallet: &str, limit: i64) -> Result<Vec<MessageRecord>, AppError> {
        self.fetch_messages("sender = $1", wallet, limit).await
    }

    #[instrument(skip(self))]
    async fn received_by(&self, wallet: &str, limit: i64) -> Result<Vec<MessageRecord>, AppError> {
        self.fetch_messages("receiver = $1", wallet, limit).await
    }

    #[instrument(skip(self))]
    async fn sent_or_received(
        &self,
        wallet: &str,
        limit: i64,
    ) -> Result<Vec<MessageRecord>, AppError> {
        self.fetch_messages("sender = $1 OR receiver = $1", wallet, limit)
            .await
    }

    #[instrument(skip(self))]
    async fn count_sent(&self, wallet: &str) -> Result<i64, AppError> {
        self.count_where("sender = $1", wallet).await
    }

    #[instrument(skip(self))]
    async fn count_received(&self, wallet: &str) -> Result<i64, AppError> {
        self.count_where("receiver = $1", wallet).await
    }
}
