//! Worker configuration loaded from environment variables.

use std::time::Duration;

use relight_pipeline::PipelineConfig;
use relight_providers::{GeminiConfig, ProvidersConfig, ResilienceConfig, SeedreamConfig};

/// Worker configuration.
///
/// All fields except `DATABASE_URL` have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Postgres connection string.
    pub database_url: String,
    /// Bucket/key and prompt settings for the pipeline.
    pub pipeline: PipelineConfig,
    /// Provider selection and per-adapter settings.
    pub providers: ProvidersConfig,
    /// Push gateway base URL; notifications are dropped when unset.
    pub push_gateway_url: Option<String>,
    /// Dispatcher polling interval.
    pub poll_interval: Duration,
    /// Queued jobs picked up per dispatch cycle.
    pub dispatch_limit: u32,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                       |
    /// |-----------------------------|-------------------------------|
    /// | `DATABASE_URL`              | (required)                    |
    /// | `UPLOAD_BUCKET`             | `relight-uploads`             |
    /// | `LIBRARY_BUCKET`            | `relight-library`             |
    /// | `ANALYSIS_PROVIDER`         | `gemini`                      |
    /// | `EDITING_PROVIDER`          | `seedream`                    |
    /// | `ANALYSIS_ENABLED`          | `true`                        |
    /// | `EDITING_ENABLED`           | `true`                        |
    /// | `GEMINI_API_KEY`            | (empty)                       |
    /// | `SEEDREAM_API_KEY`          | (empty)                       |
    /// | `PROVIDER_TIMEOUT_SECS`     | `30`                          |
    /// | `PROVIDER_MAX_ATTEMPTS`     | `3`                           |
    /// | `BREAKER_FAILURE_THRESHOLD` | `5`                           |
    /// | `BREAKER_HALF_OPEN_SECS`    | `30`                          |
    /// | `PUSH_GATEWAY_URL`          | (unset: notifications dropped)|
    /// | `POLL_INTERVAL_MS`          | `1000`                        |
    /// | `DISPATCH_LIMIT`            | `4`                           |
    pub fn from_env() -> Self {
        let database_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let mut pipeline = PipelineConfig::default();
        pipeline.upload_bucket = env_or("UPLOAD_BUCKET", &pipeline.upload_bucket);
        pipeline.library_bucket = env_or("LIBRARY_BUCKET", &pipeline.library_bucket);

        let resilience = resilience_from_env();
        let providers = ProvidersConfig {
            analysis_kind: env_or("ANALYSIS_PROVIDER", "gemini"),
            editing_kind: env_or("EDITING_PROVIDER", "seedream"),
            gemini: GeminiConfig {
                enabled: env_flag("ANALYSIS_ENABLED", true),
                api_key: env_or("GEMINI_API_KEY", ""),
                resilience: resilience.clone(),
                ..Default::default()
            },
            seedream: SeedreamConfig {
                enabled: env_flag("EDITING_ENABLED", true),
                api_key: env_or("SEEDREAM_API_KEY", ""),
                resilience,
                ..Default::default()
            },
        };

        let push_gateway_url =
            std::env::var("PUSH_GATEWAY_URL").ok().filter(|s| !s.is_empty());

        let poll_interval =
            Duration::from_millis(env_parse("POLL_INTERVAL_MS", 1000));
        let dispatch_limit = env_parse("DISPATCH_LIMIT", 4);

        Self {
            database_url,
            pipeline,
            providers,
            push_gateway_url,
            poll_interval,
            dispatch_limit,
        }
    }
}

/// Shared resilience tunables applied to both adapters.
fn resilience_from_env() -> ResilienceConfig {
    let mut config = ResilienceConfig::default();
    config.timeout = Duration::from_secs(env_parse("PROVIDER_TIMEOUT_SECS", 30));
    config.retry.max_attempts = env_parse("PROVIDER_MAX_ATTEMPTS", 3);
    config.breaker.failure_threshold = env_parse("BREAKER_FAILURE_THRESHOLD", 5);
    config.breaker.half_open_after =
        Duration::from_secs(env_parse("BREAKER_HALF_OPEN_SECS", 30));
    config
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T
where
    T::Err: std::fmt::Debug,
{
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .unwrap_or_else(|e| panic!("{name} must be a valid value: {e:?}")),
        Err(_) => default,
    }
}
