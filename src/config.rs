use clap::{Args, Parser, ValueEnum};

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub database: DatabaseConfig,

    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub rate_limit: RateLimitConfig,

    #[command(flatten)]
    pub messaging: MessagingConfig,

    #[command(flatten)]
    pub repair: RepairConfig,

    #[command(flatten)]
    pub storage: StorageConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,

    #[command(flatten)]
    pub health: HealthConfig,
}

#[derive(Clone, Debug, Args)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[arg(long = "database-url", env = "PARLEY_DATABASE_URL")]
    pub url: String,

    /// Maximum number of pooled connections
    #[arg(long = "db-max-connections", env = "PARLEY_DB_MAX_CONNECTIONS", default_value_t = 20)]
    pub max_connections: u32,

    /// Minimum number of idle connections kept open
    #[arg(long = "db-min-connections", env = "PARLEY_DB_MIN_CONNECTIONS", default_value_t = 2)]
    pub min_connections: u32,

    /// Seconds to wait for a free connection before failing
    #[arg(long = "db-acquire-timeout-secs", env = "PARLEY_DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    pub acquire_timeout_secs: u64,

    /// Seconds an idle connection may stay in the pool
    #[arg(long = "db-idle-timeout-secs", env = "PARLEY_DB_IDLE_TIMEOUT_SECS", default_value_t = 600)]
    pub idle_timeout_secs: u64,

    /// Maximum lifetime of a pooled connection in seconds
    #[arg(long = "db-max-lifetime-secs", env = "PARLEY_DB_MAX_LIFETIME_SECS", default_value_t = 1800)]
    pub max_lifetime_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "PARLEY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port for the public API
    #[arg(long, env = "PARLEY_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Port for the management API (probes, maintenance)
    #[arg(long, env = "PARLEY_MGMT_PORT", default_value_t = 9090)]
    pub mgmt_port: u16,

    /// Seconds to wait for background workers on shutdown
    #[arg(long, env = "PARLEY_SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct RateLimitConfig {
    /// Requests per second allowed per client IP
    #[arg(long = "rate-limit-per-second", env = "PARLEY_RATE_LIMIT_PER_SECOND", default_value_t = 10)]
    pub per_second: u32,

    /// Burst allowance per client IP
    #[arg(long = "rate-limit-burst", env = "PARLEY_RATE_LIMIT_BURST", default_value_t = 20)]
    pub burst: u32,
}

#[derive(Clone, Debug, Args)]
pub struct MessagingConfig {
    /// Maximum message length in characters, after trimming
    #[arg(long, env = "PARLEY_MAX_CONTENT_LENGTH", default_value_t = 2000)]
    pub max_content_length: usize,

    /// Default page size when listing conversations
    #[arg(long, env = "PARLEY_CONVERSATIONS_PAGE_SIZE", default_value_t = 20)]
    pub conversations_page_size: u32,

    /// Default page size when listing messages
    #[arg(long, env = "PARLEY_MESSAGES_PAGE_SIZE", default_value_t = 50)]
    pub messages_page_size: u32,

    /// Upper bound for any client-supplied page size
    #[arg(long, env = "PARLEY_MAX_PAGE_SIZE", default_value_t = 100)]
    pub max_page_size: u32,

    /// Retries for the conversation summary update after a message is stored
    #[arg(long, env = "PARLEY_SUMMARY_RETRY_ATTEMPTS", default_value_t = 3)]
    pub summary_retry_attempts: usize,

    /// Initial backoff between summary update retries
    #[arg(long, env = "PARLEY_SUMMARY_RETRY_BASE_DELAY_MS", default_value_t = 50)]
    pub summary_retry_base_delay_ms: u64,
}

#[derive(Clone, Debug, Args)]
pub struct RepairConfig {
    /// How often to recompute unread counters from the message log (0 disables the worker)
    #[arg(long = "repair-interval-secs", env = "PARLEY_REPAIR_INTERVAL_SECS", default_value_t = 3600)]
    pub interval_secs: u64,

    /// Number of conversations repaired per batch
    #[arg(long = "repair-batch-size", env = "PARLEY_REPAIR_BATCH_SIZE", default_value_t = 200)]
    pub batch_size: u32,
}

#[derive(Clone, Debug, Args)]
pub struct StorageConfig {
    /// S3 bucket holding media objects
    #[arg(long = "storage-bucket", env = "PARLEY_STORAGE_BUCKET")]
    pub bucket: String,

    /// S3 region
    #[arg(long = "storage-region", env = "PARLEY_STORAGE_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Custom S3 endpoint (useful for MinIO)
    #[arg(long = "storage-endpoint", env = "PARLEY_STORAGE_ENDPOINT")]
    pub endpoint: Option<String>,

    /// S3 access key
    #[arg(long = "storage-access-key", env = "PARLEY_STORAGE_ACCESS_KEY")]
    pub access_key: Option<String>,

    /// S3 secret key
    #[arg(long = "storage-secret-key", env = "PARLEY_STORAGE_SECRET_KEY")]
    pub secret_key: Option<String>,

    /// Force path style (required for many MinIO setups: http://host/bucket/key)
    #[arg(long = "storage-force-path-style", env = "PARLEY_STORAGE_FORCE_PATH_STYLE", default_value_t = false)]
    pub force_path_style: bool,

    /// Lifetime of presigned media URLs in seconds
    #[arg(long = "storage-presign-ttl-secs", env = "PARLEY_STORAGE_PRESIGN_TTL_SECS", default_value_t = 3600)]
    pub presign_ttl_secs: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// OTLP collector endpoint; telemetry export is disabled when unset
    #[arg(long = "otlp-endpoint", env = "PARLEY_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Log output format
    #[arg(long = "log-format", env = "PARLEY_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Clone, Debug, Args)]
pub struct HealthConfig {
    /// Timeout for the database readiness probe
    #[arg(long = "health-db-timeout-ms", env = "PARLEY_HEALTH_DB_TIMEOUT_MS", default_value_t = 2000)]
    pub db_timeout_ms: u64,

    /// Timeout for the blob storage readiness probe
    #[arg(long = "health-storage-timeout-ms", env = "PARLEY_HEALTH_STORAGE_TIMEOUT_MS", default_value_t = 2000)]
    pub storage_timeout_ms: u64,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Config::command().debug_assert();
    }

    #[test]
    fn test_defaults_apply() {
        let config = Config::parse_from([
            "parley-server",
            "--database-url",
            "postgres://localhost/parley",
            "--storage-bucket",
            "media",
        ]);

        assert_eq!(config.database.url, "postgres://localhost/parley");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.messaging.max_content_length, 2000);
        assert_eq!(config.messaging.conversations_page_size, 20);
        assert_eq!(config.messaging.messages_page_size, 50);
        assert_eq!(config.telemetry.log_format, LogFormat::Text);
        assert!(config.telemetry.otlp_endpoint.is_none());
    }
}
