use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Which store implementation backs the clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            other => bail!("expected one of: redis, memory, got '{}'", other),
        }
    }
}

/// How failures are mapped onto HTTP status codes
///
/// `Legacy` answers every failure with 500 and a missing value with an
/// empty 200. `Refined` distinguishes client input (400), conflicts (409),
/// missing values (404), store failures (502) and deadlines (504). The
/// error body is the same in both modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMode {
    Legacy,
    Refined,
}

impl FromStr for StatusMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "legacy" => Ok(StatusMode::Legacy),
            "refined" => Ok(StatusMode::Refined),
            other => bail!("expected one of: legacy, refined, got '{}'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub redis_url: Option<String>,
    pub redis_host: String,
    pub redis_port: u16,
    pub service_host: String,
    pub service_port: u16,
    pub status_mode: StatusMode,
    /// Upper bound on each store call; `None` waits indefinitely
    pub request_timeout: Option<Duration>,
    pub cors_allowed_origins: Vec<String>,
    pub api_docs_enabled: bool,
    /// Largest accepted request body; `None` reads bodies of any size
    pub max_body_bytes: Option<usize>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let store_backend = env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "redis".to_string())
            .parse::<StoreBackend>()
            .context("STORE_BACKEND must be 'redis' or 'memory'")?;

        let redis_url = env::var("REDIS_URL").ok().filter(|url| !url.is_empty());

        let redis_host = env::var("REDIS_HOST").unwrap_or_else(|_| "redis".to_string());

        let redis_port = env::var("DB_PORT")
            .unwrap_or_else(|_| "6379".to_string())
            .parse::<u16>()
            .context("DB_PORT must be a valid port number (0-65535)")?;

        let service_host = env::var("SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let service_port = env::var("API_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("API_PORT must be a valid port number (0-65535)")?;

        let status_mode = env::var("ERROR_STATUS_MODE")
            .unwrap_or_else(|_| "legacy".to_string())
            .parse::<StatusMode>()
            .context("ERROR_STATUS_MODE must be 'legacy' or 'refined'")?;

        let request_timeout = match env::var("REQUEST_TIMEOUT_MS") {
            Ok(raw) => {
                let millis = raw
                    .parse::<u64>()
                    .context("REQUEST_TIMEOUT_MS must be a non-negative integer")?;
                (millis > 0).then(|| Duration::from_millis(millis))
            }
            Err(_) => None,
        };

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect::<Vec<_>>();
        if cors_allowed_origins.is_empty() {
            bail!("CORS_ALLOWED_ORIGINS must list at least one origin or '*'");
        }

        let api_docs_enabled = match env::var("API_DOCS_ENABLED") {
            Ok(raw) => raw
                .parse::<bool>()
                .context("API_DOCS_ENABLED must be 'true' or 'false'")?,
            Err(_) => false,
        };

        let max_body_bytes = match env::var("MAX_BODY_BYTES") {
            Ok(raw) => {
                let limit = raw
                    .parse::<usize>()
                    .context("MAX_BODY_BYTES must be a non-negative integer")?;
                (limit > 0).then_some(limit)
            }
            Err(_) => None,
        };

        Ok(Config {
            store_backend,
            redis_url,
            redis_host,
            redis_port,
            service_host,
            service_port,
            status_mode,
            request_timeout,
            cors_allowed_origins,
            api_docs_enabled,
            max_body_bytes,
        })
    }

    /// Connection URL for the Redis backend
    pub fn redis_url(&self) -> String {
        self.redis_url
            .clone()
            .unwrap_or_else(|| format!("redis://{}:{}/", self.redis_host, self.redis_port))
    }

    /// True when CORS should accept any origin
    pub fn cors_allows_any_origin(&self) -> bool {
        self.cors_allowed_origins.iter().any(|origin| origin == "*")
    }

    pub fn log_startup(&self) {
        tracing::info!("Configuration loaded:");
        tracing::info!("  Store backend: {:?}", self.store_backend);
        if self.store_backend == StoreBackend::Redis {
            tracing::info!("  Redis: {}", self.redis_url());
        }
        tracing::info!("  Error status mode: {:?}", self.status_mode);
        tracing::info!(
            "  Store call timeout: {}",
            self.request_timeout
                .map(|t| format!("{:?}", t))
                .unwrap_or_else(|| "disabled".to_string())
        );
        tracing::info!("  CORS origins: {}", self.cors_allowed_origins.join(", "));
        tracing::info!(
            "  Max body size: {}",
            self.max_body_bytes
                .map(|limit| format!("{} bytes", limit))
                .unwrap_or_else(|| "unlimited".to_string())
        );
        tracing::info!("  API docs: {}", if self.api_docs_enabled { "enabled" } else { "disabled" });
        tracing::info!("  Service listening on: {}:{}", self.service_host, self.service_port);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clear_env_vars() {
        unsafe {
            for var in [
                "STORE_BACKEND",
                "REDIS_URL",
                "REDIS_HOST",
                "DB_PORT",
                "SERVICE_HOST",
                "API_PORT",
                "ERROR_STATUS_MODE",
                "REQUEST_TIMEOUT_MS",
                "CORS_ALLOWED_ORIGINS",
                "API_DOCS_ENABLED",
                "MAX_BODY_BYTES",
            ] {
                env::remove_var(var);
            }
        }
    }

    #[test]
    #[serial]
    fn test_config_with_defaults() {
        clear_env_vars();

        let config = Config::from_env().unwrap();

        assert_eq!(config.store_backend, StoreBackend::Redis);
        assert_eq!(config.redis_url, None);
        assert_eq!(config.redis_url(), "redis://redis:6379/");
        assert_eq!(config.service_host, "0.0.0.0");
        assert_eq!(config.service_port, 3000);
        assert_eq!(config.status_mode, StatusMode::Legacy);
        assert_eq!(config.request_timeout, None);
        assert!(config.cors_allows_any_origin());
        assert!(!config.api_docs_enabled);
        assert_eq!(config.max_body_bytes, None);
    }

    #[test]
    #[serial]
    fn test_config_with_all_vars() {
        clear_env_vars();
        unsafe {
            env::set_var("STORE_BACKEND", "memory");
            env::set_var("REDIS_HOST", "cache.internal");
            env::set_var("DB_PORT", "6380");
            env::set_var("SERVICE_HOST", "127.0.0.1");
            env::set_var("API_PORT", "8443");
            env::set_var("ERROR_STATUS_MODE", "refined");
            env::set_var("REQUEST_TIMEOUT_MS", "250");
            env::set_var("CORS_ALLOWED_ORIGINS", "https://a.example, https://b.example");
            env::set_var("API_DOCS_ENABLED", "true");
            env::set_var("MAX_BODY_BYTES", "1048576");
        }

        let config = Config::from_env().unwrap();

        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.redis_url(), "redis://cache.internal:6380/");
        assert_eq!(config.service_host, "127.0.0.1");
        assert_eq!(config.service_port, 8443);
        assert_eq!(config.status_mode, StatusMode::Refined);
        assert_eq!(config.request_timeout, Some(Duration::from_millis(250)));
        assert_eq!(
            config.cors_allowed_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert!(!config.cors_allows_any_origin());
        assert!(config.api_docs_enabled);
        assert_eq!(config.max_body_bytes, Some(1048576));

        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_redis_url_overrides_host_and_port() {
        clear_env_vars();
        unsafe {
            env::set_var("REDIS_URL", "redis://:secret@10.0.0.5:7000/2");
            env::set_var("REDIS_HOST", "ignored");
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.redis_url(), "redis://:secret@10.0.0.5:7000/2");

        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_zero_timeout_means_unbounded() {
        clear_env_vars();
        unsafe {
            env::set_var("REQUEST_TIMEOUT_MS", "0");
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.request_timeout, None);

        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_invalid_port() {
        clear_env_vars();
        unsafe {
            env::set_var("API_PORT", "not-a-number");
        }

        let result = Config::from_env();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API_PORT"));

        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_db_port_out_of_range() {
        clear_env_vars();
        unsafe {
            env::set_var("DB_PORT", "99999");
        }

        let result = Config::from_env();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("DB_PORT"));

        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_invalid_status_mode() {
        clear_env_vars();
        unsafe {
            env::set_var("ERROR_STATUS_MODE", "strict");
        }

        let result = Config::from_env();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("ERROR_STATUS_MODE"));

        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_invalid_body_limit() {
        clear_env_vars();
        unsafe {
            env::set_var("MAX_BODY_BYTES", "2MB");
        }

        let result = Config::from_env();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("MAX_BODY_BYTES"));

        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_invalid_backend() {
        clear_env_vars();
        unsafe {
            env::set_var("STORE_BACKEND", "postgres");
        }

        let result = Config::from_env();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("STORE_BACKEND"));

        clear_env_vars();
    }
}
