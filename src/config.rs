use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub upload: UploadConfig,
    pub worker: WorkerConfig,
    pub reaper: ReaperConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub field_name: String,
    pub accepted_content_type: String,
    pub max_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout_secs: u64,
    pub max_output_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReaperConfig {
    pub interval_secs: u64,
    pub max_age_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub dir: Option<PathBuf>,
}

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            server: ServerConfig {
                port: parse_var("PORT", 3001)?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                cors_allowed_origins: env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "*".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            upload: UploadConfig {
                dir: env::var("UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("uploads")),
                field_name: env::var("UPLOAD_FIELD").unwrap_or_else(|_| "pdf".to_string()),
                accepted_content_type: env::var("ACCEPTED_CONTENT_TYPE")
                    .unwrap_or_else(|_| mime::APPLICATION_PDF.to_string()),
                max_bytes: parse_var("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            },
            worker: WorkerConfig {
                program: env::var("WORKER_PROGRAM").unwrap_or_else(|_| "python".to_string()),
                args: env::var("WORKER_ARGS")
                    .unwrap_or_else(|_| "python/extractor.py".to_string())
                    .split_whitespace()
                    .map(str::to_string)
                    .collect(),
                timeout_secs: parse_var("WORKER_TIMEOUT_SECS", 120)?,
                max_output_bytes: parse_var("WORKER_MAX_OUTPUT_BYTES", 16 * 1024 * 1024)?,
            },
            reaper: ReaperConfig {
                interval_secs: parse_var("REAPER_INTERVAL_SECS", 3600)?,
                max_age_secs: parse_var("ARTIFACT_MAX_AGE_SECS", 3600)?,
            },
            logging: LoggingConfig {
                dir: env::var("LOG_DIR").ok().map(PathBuf::from),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but cannot be used at runtime.
    pub fn validate(&self) -> Result<()> {
        self.reaper.validate()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: 3001,
                host: "0.0.0.0".to_string(),
                cors_allowed_origins: vec!["*".to_string()],
            },
            upload: UploadConfig {
                dir: PathBuf::from("uploads"),
                field_name: "pdf".to_string(),
                accepted_content_type: mime::APPLICATION_PDF.to_string(),
                max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            },
            worker: WorkerConfig {
                program: "python".to_string(),
                args: vec!["python/extractor.py".to_string()],
                timeout_secs: 120,
                max_output_bytes: 16 * 1024 * 1024,
            },
            reaper: ReaperConfig {
                interval_secs: 3600,
                max_age_secs: 3600,
            },
            logging: LoggingConfig { dir: None },
        }
    }
}

impl WorkerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ReaperConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    /// The sweep timer needs a non-zero period that can still be added to
    /// the clock for the first two ticks.
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            bail!("REAPER_INTERVAL_SECS must be greater than zero");
        }
        let interval = self.interval();
        let fits = Instant::now()
            .checked_add(interval)
            .and_then(|first| first.checked_add(interval))
            .is_some();
        if !fits {
            bail!(
                "REAPER_INTERVAL_SECS is too large: {}",
                self.interval_secs
            );
        }
        Ok(())
    }
}

/// Read `key` from the environment, falling back to `default` when unset.
/// A value that is set but does not parse is an error.
fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_service_contract() {
        let config = Config::default();

        assert_eq!(config.server.port, 3001);
        assert_eq!(config.upload.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.upload.accepted_content_type, "application/pdf");
        assert_eq!(config.upload.field_name, "pdf");
        assert_eq!(config.reaper.interval(), Duration::from_secs(3600));
        assert_eq!(config.reaper.max_age(), Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        env::set_var("OXIDIZED_EXTRACT_TEST_BAD_NUMBER", "five");
        let result: Result<u64> = parse_var("OXIDIZED_EXTRACT_TEST_BAD_NUMBER", 1);
        env::remove_var("OXIDIZED_EXTRACT_TEST_BAD_NUMBER");

        assert!(result.is_err());
    }

    #[test]
    fn test_reaper_interval_must_be_usable() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.reaper.interval_secs = 0;
        assert!(config.validate().is_err());

        config.reaper.interval_secs = u64::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_env_rejects_zero_reaper_interval() {
        env::set_var("REAPER_INTERVAL_SECS", "0");
        let result = Config::from_env();
        env::remove_var("REAPER_INTERVAL_SECS");

        let err = result.unwrap_err();
        assert!(err.to_string().contains("REAPER_INTERVAL_SECS"));
    }

    #[test]
    fn test_parse_var_uses_default_when_unset() {
        let value: u64 = parse_var("OXIDIZED_EXTRACT_TEST_UNSET", 42).unwrap();
        assert_eq!(value, 42);
    }
}
