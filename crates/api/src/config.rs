use std::str::FromStr;
use std::time::Duration;

use vidgen_provider::api::{DEFAULT_API_URL, DEFAULT_REQUEST_TIMEOUT};
use vidgen_provider::ProviderConfig;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a valid {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// How job progress is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    /// Local timed simulation; no external service involved.
    Simulated,
    /// Read-through proxy of an external provider.
    Upstream,
}

impl ProgressMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressMode::Simulated => "simulated",
            ProgressMode::Upstream => "upstream",
        }
    }

    /// Lookup policy used when `LOOKUP_POLICY` is not set.
    pub fn default_lookup(self) -> LookupPolicy {
        match self {
            ProgressMode::Simulated => LookupPolicy::Lenient,
            ProgressMode::Upstream => LookupPolicy::Strict,
        }
    }
}

impl FromStr for ProgressMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simulated" | "simulation" | "mock" => Ok(ProgressMode::Simulated),
            "upstream" | "proxy" => Ok(ProgressMode::Upstream),
            _ => Err(()),
        }
    }
}

/// What a status/progress lookup does with an id the store has never seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupPolicy {
    /// Unknown ids are an error (404).
    Strict,
    /// Unknown ids are created on first lookup and start progressing.
    Lenient,
}

impl LookupPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            LookupPolicy::Strict => "strict",
            LookupPolicy::Lenient => "lenient",
        }
    }
}

impl FromStr for LookupPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(LookupPolicy::Strict),
            "lenient" => Ok(LookupPolicy::Lenient),
            _ => Err(()),
        }
    }
}

/// Progress engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub mode: ProgressMode,
    pub lookup: LookupPolicy,
    /// Delay between simulation checkpoints.
    pub simulation_step: Duration,
    /// Base URL for simulated result and thumbnail locations.
    pub simulated_asset_base_url: String,
    /// Delay between upstream polls made by a driver.
    pub upstream_poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: ProgressMode::Simulated,
            lookup: LookupPolicy::Lenient,
            simulation_step: Duration::from_millis(500),
            simulated_asset_base_url: "https://example.com/videos".into(),
            upstream_poll_interval: Duration::from_millis(2000),
        }
    }
}

/// Retention limits enforced by the eviction sweeper.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// Terminal jobs older than this (by `updated_at`) are evicted.
    pub job_retention: Duration,
    /// Soft cap on stored jobs; only terminal jobs are evicted to meet it.
    pub max_jobs: usize,
    /// How often the sweeper runs.
    pub sweep_interval: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            job_retention: Duration::from_secs(86_400),
            max_jobs: 1000,
            sweep_interval: Duration::from_secs(300),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds (default: `10`).
    pub shutdown_timeout_secs: u64,
    pub engine: EngineConfig,
    pub retention: RetentionConfig,
    pub provider: ProviderConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            cors_origins: vec!["http://localhost:3001".into()],
            request_timeout_secs: 30,
            shutdown_timeout_secs: 10,
            engine: EngineConfig::default(),
            retention: RetentionConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                      |
    /// |-----------------------------|------------------------------|
    /// | `HOST`                      | `0.0.0.0`                    |
    /// | `PORT`                      | `3000`                       |
    /// | `CORS_ORIGINS`              | `http://localhost:3001`      |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                         |
    /// | `SHUTDOWN_TIMEOUT_SECS`     | `10`                         |
    /// | `PROGRESS_MODE`             | `simulated`                  |
    /// | `LOOKUP_POLICY`             | per mode                     |
    /// | `SIMULATION_STEP_MS`        | `500`                        |
    /// | `SIMULATED_ASSET_BASE_URL`  | `https://example.com/videos` |
    /// | `UPSTREAM_POLL_INTERVAL_MS` | `2000`                       |
    /// | `PROVIDER_API_URL`          | `https://api.openai.com/v1`  |
    /// | `PROVIDER_API_KEY`          | unset                        |
    /// | `JOB_RETENTION_SECS`        | `86400`                      |
    /// | `MAX_JOBS`                  | `1000`                       |
    /// | `EVICTION_INTERVAL_SECS`    | `300`                        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let env = Env(&lookup);

        let host = env.string("HOST").unwrap_or(defaults.host);
        let port: u16 = env.parse("PORT", "u16")?.unwrap_or(defaults.port);

        let cors_origins = match env.string("CORS_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => defaults.cors_origins,
        };

        let request_timeout_secs = env
            .parse("REQUEST_TIMEOUT_SECS", "u64")?
            .unwrap_or(defaults.request_timeout_secs);
        let shutdown_timeout_secs = env
            .parse("SHUTDOWN_TIMEOUT_SECS", "u64")?
            .unwrap_or(defaults.shutdown_timeout_secs);

        let mode = match env.string("PROGRESS_MODE") {
            Some(raw) => raw.parse().map_err(|()| ConfigError::Invalid {
                var: "PROGRESS_MODE",
                expected: "mode (simulated|upstream)",
                value: raw.clone(),
            })?,
            None => defaults.engine.mode,
        };
        let lookup_policy = match env.string("LOOKUP_POLICY") {
            Some(raw) => raw.parse().map_err(|()| ConfigError::Invalid {
                var: "LOOKUP_POLICY",
                expected: "policy (strict|lenient)",
                value: raw.clone(),
            })?,
            None => mode.default_lookup(),
        };

        let engine = EngineConfig {
            mode,
            lookup: lookup_policy,
            simulation_step: env
                .duration("SIMULATION_STEP_MS", Duration::from_millis)?
                .unwrap_or(defaults.engine.simulation_step),
            simulated_asset_base_url: env
                .string("SIMULATED_ASSET_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.engine.simulated_asset_base_url),
            upstream_poll_interval: env
                .duration("UPSTREAM_POLL_INTERVAL_MS", Duration::from_millis)?
                .unwrap_or(defaults.engine.upstream_poll_interval),
        };

        let retention = RetentionConfig {
            job_retention: env
                .parse("JOB_RETENTION_SECS", "u64")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.retention.job_retention),
            max_jobs: env
                .parse("MAX_JOBS", "usize")?
                .unwrap_or(defaults.retention.max_jobs),
            sweep_interval: env
                .duration("EVICTION_INTERVAL_SECS", Duration::from_secs)?
                .unwrap_or(defaults.retention.sweep_interval),
        };

        let provider = ProviderConfig {
            api_url: env
                .string("PROVIDER_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_key: env.string("PROVIDER_API_KEY"),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        };

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            engine,
            retention,
            provider,
        })
    }
}

/// Helper over a key lookup that treats blank values as unset.
struct Env<'a, F>(&'a F);

impl<F> Env<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn parse<T: FromStr>(
        &self,
        key: &'static str,
        expected: &'static str,
    ) -> Result<Option<T>, ConfigError> {
        match self.string(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::Invalid {
                    var: key,
                    expected,
                    value: raw,
                }),
            None => Ok(None),
        }
    }

    /// A strictly positive interval. Zero would stall a timer loop.
    fn duration(
        &self,
        key: &'static str,
        unit: fn(u64) -> Duration,
    ) -> Result<Option<Duration>, ConfigError> {
        const EXPECTED: &str = "positive integer";
        match self.parse::<u64>(key, EXPECTED)? {
            Some(0) => Err(ConfigError::Invalid {
                var: key,
                expected: EXPECTED,
                value: "0".to_string(),
            }),
            value => Ok(value.map(unit)),
        }
    }
}
