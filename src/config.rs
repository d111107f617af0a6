/// Configuration for both binaries, loaded once from environment variables
/// and handed to each component at construction.
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    pub storage: StorageConfig,
    pub ingest: IngestConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct HttpConfig {
    pub port: u16,
    pub metrics_port: u16,
    pub cors_origin: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct QueueConfig {
    pub redis_url: String,
    /// Redis list the orchestrator pushes jobs onto.
    pub analysis_queue: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StorageConfig {
    pub bucket: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct IngestConfig {
    pub max_upload_bytes: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AnalysisConfig {
    pub worker_concurrency: usize,
    pub max_attempts: i32,
    pub job_timeout_secs: u64,
    pub backoff_base_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            http: HttpConfig {
                port: env_parse("PORT", 8000),
                metrics_port: env_parse("METRICS_PORT", 9091),
                cors_origin: std::env::var("CORS_ORIGIN")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            },
            queue: QueueConfig {
                redis_url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
                analysis_queue: std::env::var("ANALYSIS_QUEUE")
                    .unwrap_or_else(|_| "analysis_queue".to_string()),
            },
            storage: StorageConfig {
                bucket: std::env::var("GCS_BUCKET_NAME")
                    .unwrap_or_else(|_| "gar-videos".to_string()),
            },
            ingest: IngestConfig {
                max_upload_bytes: env_parse("MAX_UPLOAD_BYTES", 200 * 1024 * 1024),
            },
            analysis: AnalysisConfig {
                worker_concurrency: env_parse("WORKER_CONCURRENCY", 3),
                max_attempts: env_parse("MAX_ANALYSIS_ATTEMPTS", 3),
                job_timeout_secs: env_parse("JOB_TIMEOUT_SECS", 300),
                backoff_base_secs: env_parse("BACKOFF_BASE_SECS", 2),
            },
        }
    }
}

fn env_parse<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
