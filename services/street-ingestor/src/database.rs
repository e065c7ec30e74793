use crate::config::{is_plain_identifier, DatabaseConfig};
use crate::errors::{IngestError, Result};
use crate::models::StreetDetail;
use crate::sink::DocumentSink;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::time::Duration;
use tracing::{error, info};

/// JSONB document collection in PostgreSQL, one row per inserted document
pub struct PgDocumentSink {
    pool: PgPool,
    collection: String,
    insert_sql: String,
}

impl PgDocumentSink {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&config.url)
            .await
            .map_err(|e| {
                error!("Error connecting to PostgreSQL: {}", e);
                IngestError::Database(e)
            })?;

        let sink = Self::from_pool(pool, &config.collection)?;
        sink.ensure_collection().await?;

        info!("Connected to PostgreSQL collection {}", sink.collection);
        Ok(sink)
    }

    pub fn from_pool(pool: PgPool, collection: &str) -> Result<Self> {
        if !is_plain_identifier(collection) {
            return Err(IngestError::Config(format!(
                "Invalid collection name: {}",
                collection
            )));
        }

        Ok(Self {
            pool,
            collection: collection.to_string(),
            insert_sql: format!("INSERT INTO {} (document) VALUES ($1)", collection),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ensure_collection(&self) -> Result<()> {
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id BIGSERIAL PRIMARY KEY,
                document JSONB NOT NULL,
                inserted_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
            self.collection
        );

        sqlx::query(&ddl).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentSink for PgDocumentSink {
    async fn insert_one(&self, detail: &StreetDetail) -> Result<()> {
        sqlx::query(&self.insert_sql)
            .bind(Json(detail.clone()))
            .execute(&self.pool)
            .await
            .map_err(|e| IngestError::Sink(e.to_string()))?;
        Ok(())
    }
}
