use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub redis_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub store_timeout_ms: u64,
    pub bucket_window_secs: u64,
    pub bucket_retention_secs: u64,
    pub history_buckets: u64,
    pub rate_limit_window_secs: u64,
    pub rate_limit_votes: u64,
    pub seed_candidates: Vec<String>,
    pub trust_proxy_headers: bool,
    pub static_dir: Option<String>,
    pub display_utc_offset_minutes: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1/".into(),
            server_host: "::".into(),
            server_port: 3000,
            store_timeout_ms: 1000,
            bucket_window_secs: 60,
            // 保留时间要比展示窗口(10 分钟)长，容忍时钟和读取偏差
            bucket_retention_secs: 666,
            history_buckets: 10,
            rate_limit_window_secs: 5,
            rate_limit_votes: 1,
            seed_candidates: Vec::new(),
            trust_proxy_headers: false,
            static_dir: None,
            display_utc_offset_minutes: 0,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let defaults = Config::default();
        let config = Config {
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            server_host: env::var("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parse_var("SERVER_PORT", defaults.server_port)?,
            store_timeout_ms: parse_var("STORE_TIMEOUT_MS", defaults.store_timeout_ms)?,
            bucket_window_secs: parse_var("BUCKET_WINDOW_SECS", defaults.bucket_window_secs)?,
            bucket_retention_secs: parse_var(
                "BUCKET_RETENTION_SECS",
                defaults.bucket_retention_secs,
            )?,
            history_buckets: parse_var("HISTORY_BUCKETS", defaults.history_buckets)?,
            rate_limit_window_secs: parse_var(
                "RATE_LIMIT_WINDOW_SECS",
                defaults.rate_limit_window_secs,
            )?,
            rate_limit_votes: parse_var("RATE_LIMIT_VOTES", defaults.rate_limit_votes)?,
            seed_candidates: env::var("SEED_CANDIDATES")
                .map(|s| parse_candidates(&s))
                .unwrap_or_default(),
            trust_proxy_headers: parse_var("TRUST_PROXY_HEADERS", defaults.trust_proxy_headers)?,
            static_dir: env::var("STATIC_DIR").ok().filter(|s| !s.trim().is_empty()),
            display_utc_offset_minutes: parse_var(
                "DISPLAY_UTC_OFFSET_MINUTES",
                defaults.display_utc_offset_minutes,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    /// 分钟桶的保留时间必须覆盖整个展示窗口，否则重建出的历史会缺数据
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket_window_secs == 0 {
            return Err(ConfigError::Zero("BUCKET_WINDOW_SECS"));
        }
        if self.rate_limit_window_secs == 0 {
            return Err(ConfigError::Zero("RATE_LIMIT_WINDOW_SECS"));
        }
        if self.history_buckets == 0 {
            return Err(ConfigError::Zero("HISTORY_BUCKETS"));
        }
        if self.rate_limit_votes == 0 {
            return Err(ConfigError::Zero("RATE_LIMIT_VOTES"));
        }

        let window_secs = self.history_window().as_secs();
        if self.bucket_retention_secs <= window_secs {
            return Err(ConfigError::RetentionTooShort {
                retention_secs: self.bucket_retention_secs,
                window_secs,
            });
        }
        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn history_window(&self) -> Duration {
        Duration::from_secs(self.history_buckets.saturating_mul(self.bucket_window_secs))
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        _ => Ok(default),
    }
}

fn parse_candidates(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
