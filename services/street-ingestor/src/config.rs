use config::{ConfigError, Environment, File};
use message_bus::{NatsConfig, QueueConfig};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub nats: BrokerConfig,
    pub database: DatabaseConfig,
    pub source: SourceConfig,
    pub consumer: ConsumerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BrokerConfig {
    pub url: String,
    pub queue: String,
    pub durable_name: String,
    /// Defaults to `{queue}.dead`
    pub dead_letter_subject: Option<String>,
    pub ack_wait_secs: u64,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub collection: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourceConfig {
    pub base_url: String,
    pub resource_id: String,
    pub timeout_secs: u64,
    pub page_limit: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConsumerConfig {
    pub max_deliveries: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://data.gov.il/api/3/action/datastore_search".to_string(),
            resource_id: "1b14e41c-85b3-4c21-bdce-9fe48185ffca".to_string(),
            timeout_secs: 30,
            page_limit: 1000,
        }
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self { max_deliveries: 5 }
    }
}

impl BrokerConfig {
    pub fn client_config(&self) -> NatsConfig {
        NatsConfig {
            url: self.url.clone(),
            connection_name: "street-ingestor".to_string(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }

    pub fn queue_config(&self) -> QueueConfig {
        let mut queue = QueueConfig::new(self.queue.clone());
        queue.durable_name = self.durable_name.clone();
        queue.ack_wait = Duration::from_secs(self.ack_wait_secs);
        if let Some(subject) = &self.dead_letter_subject {
            queue.dead_letter_subject = subject.clone();
        }
        queue
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let source = SourceConfig::default();

        let mut builder = config::Config::builder()
            // Start with default configuration
            .set_default("nats.url", "nats://localhost:4222")?
            .set_default("nats.queue", "q1")?
            .set_default("nats.durable_name", "street-ingestor")?
            .set_default("nats.ack_wait_secs", 30)?
            .set_default("nats.connect_timeout_secs", 5)?
            .set_default("database.url", "postgres://localhost:5432/streets")?
            .set_default("database.max_connections", 5)?
            .set_default("database.collection", "streets")?
            .set_default("source.base_url", source.base_url)?
            .set_default("source.resource_id", source.resource_id)?
            .set_default("source.timeout_secs", 30)?
            .set_default("source.page_limit", 1000)?
            .set_default("consumer.max_deliveries", 5)?;

        // Add environment-specific config file if it exists
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(File::with_name(&config_file).required(false));
        } else {
            builder = builder.add_source(
                File::with_name(&format!("config/{}", environment)).required(false),
            );
        }

        // Override with environment variables
        builder = builder.add_source(
            Environment::with_prefix("STREET_INGESTOR")
                .separator("__")
                .try_parsing(true),
        );

        // Special handling for common env vars
        if let Ok(nats_url) = env::var("NATS_URL") {
            builder = builder.set_override("nats.url", nats_url)?;
        }

        if let Ok(db_url) = env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", db_url)?;
        }

        if let Ok(api_url) = env::var("STREETS_API_URL") {
            builder = builder.set_override("source.base_url", api_url)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.nats.url.is_empty() {
            return Err("NATS URL is required".to_string());
        }

        if !is_plain_identifier(&self.nats.queue) {
            return Err(format!(
                "Queue name '{}' may only contain letters, digits and '_'",
                self.nats.queue
            ));
        }

        let queue = self.nats.queue_config();
        if queue.dead_letter_subject.is_empty() || queue.dead_letter_subject == queue.subject() {
            return Err(format!(
                "Dead-letter subject '{}' must be set and differ from {}",
                queue.dead_letter_subject,
                queue.subject()
            ));
        }

        if self.database.url.is_empty() {
            return Err("Database URL is required".to_string());
        }

        if !is_plain_identifier(&self.database.collection) {
            return Err(format!(
                "Collection name '{}' may only contain letters, digits and '_'",
                self.database.collection
            ));
        }

        if self.source.base_url.is_empty() || self.source.resource_id.is_empty() {
            return Err("Street catalog URL and resource id are required".to_string());
        }

        if self.source.page_limit == 0 {
            return Err("Catalog page limit must be greater than 0".to_string());
        }

        if self.consumer.max_deliveries == 0 {
            return Err("Max deliveries must be at least 1".to_string());
        }

        Ok(())
    }
}

/// Letters, digits and underscores, not starting with a digit
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            nats: BrokerConfig {
                url: "nats://localhost:4222".to_string(),
                queue: "q1".to_string(),
                durable_name: "street-ingestor".to_string(),
                dead_letter_subject: None,
                ack_wait_secs: 30,
                connect_timeout_secs: 5,
            },
            database: DatabaseConfig {
                url: "postgres://localhost:5432/streets".to_string(),
                max_connections: 5,
                collection: "streets".to_string(),
            },
            source: SourceConfig::default(),
            consumer: ConsumerConfig::default(),
        }
    }

    #[test]
    fn test_sample_is_valid() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = sample();
        config.database.collection = "streets; DROP TABLE x".to_string();
        assert!(config.validate().is_err());

        let mut config = sample();
        config.consumer.max_deliveries = 0;
        assert!(config.validate().is_err());

        let mut config = sample();
        config.source.page_limit = 0;
        assert!(config.validate().is_err());

        let mut config = sample();
        config.nats.queue = "q.1".to_string();
        assert!(config.validate().is_err());

        let mut config = sample();
        config.nats.dead_letter_subject = Some("q1.records".to_string());
        assert!(config.validate().is_err());

        let mut config = sample();
        config.nats.dead_letter_subject = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_queue_config_mapping() {
        let queue = sample().nats.queue_config();
        assert_eq!(queue.name, "q1");
        assert_eq!(queue.subject(), "q1.records");
        assert_eq!(queue.durable_name, "street-ingestor");
        assert_eq!(queue.ack_wait, Duration::from_secs(30));
        assert_eq!(queue.dead_letter_subject, "q1.dead");
    }

    #[test]
    fn test_dead_letter_subject_follows_queue() {
        let mut config = sample();
        config.nats.queue = "q2".to_string();
        let queue = config.nats.queue_config();
        assert_eq!(queue.dead_letter_subject, "q2.dead");
        assert_eq!(queue.dead_letter_stream(), "q2_dlq");

        config.nats.dead_letter_subject = Some("streets.failed".to_string());
        assert_eq!(config.nats.queue_config().dead_letter_subject, "streets.failed");
    }

    #[test]
    fn test_from_env_queue_override_moves_dead_letter_subject() {
        env::set_var("STREET_INGESTOR__NATS__QUEUE", "q2");
        let config = Config::from_env();
        env::remove_var("STREET_INGESTOR__NATS__QUEUE");

        let config = config.unwrap();
        assert!(config.validate().is_ok());
        let queue = config.nats.queue_config();
        assert_eq!(queue.subject(), "q2.records");
        assert_eq!(queue.dead_letter_subject, "q2.dead");
    }

    #[test]
    fn test_plain_identifier() {
        assert!(is_plain_identifier("streets"));
        assert!(is_plain_identifier("_streets_2"));
        assert!(!is_plain_identifier("2streets"));
        assert!(!is_plain_identifier(""));
        assert!(!is_plain_identifier("public.streets"));
    }
}
