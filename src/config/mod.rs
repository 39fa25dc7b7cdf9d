use std::env;
use std::time::Duration;

use thiserror::Error;

/// Ten years.
const MAX_JWT_EXPIRATION_HOURS: i64 = 24 * 365 * 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub app_env: String,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub migrate: bool,
    pub is_redis: bool,
    pub redis_url: String,
    pub cache_ttl_secs: u64,
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
}

impl Config {
    /// Loads `.env` (if present) and reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Missing
    /// optional keys take their defaults; malformed values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("JWT_SECRET_KEY").ok_or(ConfigError::Missing("JWT_SECRET_KEY"))?;

        // non-positive or unparsable falls back to a day, absurdly long is an error
        let jwt_expiration_hours = match get("JWT_EXPIRATION") {
            Some(raw) => match raw.trim().trim_end_matches('h').parse::<i64>() {
                Ok(h) if h > MAX_JWT_EXPIRATION_HOURS => {
                    return Err(ConfigError::Invalid {
                        key: "JWT_EXPIRATION",
                        value: raw,
                    });
                }
                Ok(h) if h > 0 => h,
                _ => 24,
            },
            None => 24,
        };

        let database_url = match get("DATABASE_URL") {
            Some(url) => url,
            None => {
                let user = get("DB_USER").ok_or(ConfigError::Missing("DB_USER"))?;
                let password = get("DB_PASSWORD").unwrap_or_default();
                let host = get("DB_HOST").unwrap_or_else(|| "localhost".into());
                let port: u16 = parse_or("DB_PORT", get("DB_PORT"), 5432)?;
                let name = get("DB_NAME").ok_or(ConfigError::Missing("DB_NAME"))?;
                let sslmode = get("DB_SSLMODE").unwrap_or_else(|| "disable".into());
                format!("postgres://{user}:{password}@{host}:{port}/{name}?sslmode={sslmode}")
            }
        };

        let is_redis = parse_bool("IS_REDIS", get("IS_REDIS"), true)?;
        let redis_url = match get("REDIS_URI") {
            Some(uri) if uri.starts_with("redis://") || uri.starts_with("rediss://") => uri,
            Some(uri) => format!("redis://{uri}"),
            None if is_redis => return Err(ConfigError::Missing("REDIS_URI")),
            None => String::new(),
        };

        let rate_limit_window_secs = match get("RATE_LIMIT_DURATION") {
            Some(raw) => parse_duration_secs(&raw).ok_or(ConfigError::Invalid {
                key: "RATE_LIMIT_DURATION",
                value: raw,
            })?,
            None => 60,
        };

        Ok(Config {
            app_env: get("APP_ENV").unwrap_or_else(|| "development".into()),
            server_host: get("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            server_port: parse_or("SERVER_PORT", get("SERVER_PORT").or_else(|| get("APP_PORT")), 3021)?,
            api_base_uri: get("API_BASE_URI").unwrap_or_else(|| "/api".into()),
            database_url,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", get("DB_MAX_CONNECTIONS"), 10)?,
            migrate: parse_bool("MIGRATE", get("MIGRATE"), false)?,
            is_redis,
            redis_url,
            cache_ttl_secs: parse_or("REDIS_EXP", get("REDIS_EXP"), 300)?,
            rate_limit_enabled: parse_bool("RATE_LIMIT_ENABLED", get("RATE_LIMIT_ENABLED"), true)?,
            rate_limit_requests: parse_or("RATE_LIMIT", get("RATE_LIMIT"), 100)?,
            rate_limit_window_secs,
            jwt_secret,
            jwt_expiration_hours,
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn parse_bool(key: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match raw.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "true" | "1" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "false" | "0" | "no" | "off") => Ok(false),
        Some(_) => Err(ConfigError::Invalid {
            key,
            value: raw.unwrap_or_default(),
        }),
    }
}

/// Accepts `90`, `90s`, `5m` or `2h`.
fn parse_duration_secs(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let (number, unit) = match raw.char_indices().last()? {
        (idx, c) if c.is_ascii_alphabetic() => (&raw[..idx], c),
        _ => (raw, 's'),
    };
    let value: u64 = number.trim().parse().ok()?;
    match unit {
        's' => Some(value),
        'm' => value.checked_mul(60),
        'h' => value.checked_mul(3600),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn builds_dsn_from_parts() {
        let config = Config::from_lookup(lookup(&[
            ("JWT_SECRET_KEY", "s3cret"),
            ("DB_USER", "app"),
            ("DB_PASSWORD", "pw"),
            ("DB_HOST", "db"),
            ("DB_PORT", "5433"),
            ("DB_NAME", "restaurant"),
            ("IS_REDIS", "false"),
        ]))
        .unwrap();

        assert_eq!(
            config.database_url,
            "postgres://app:pw@db:5433/restaurant?sslmode=disable"
        );
        assert!(!config.is_redis);
        assert_eq!(config.jwt_expiration_hours, 24);
        assert_eq!(config.rate_limit_window_secs, 60);
    }

    #[test]
    fn database_url_wins_over_parts() {
        let config = Config::from_lookup(lookup(&[
            ("JWT_SECRET_KEY", "s3cret"),
            ("DATABASE_URL", "postgres://localhost/x"),
            ("REDIS_URI", "localhost:6379"),
            ("JWT_EXPIRATION", "48h"),
            ("RATE_LIMIT_DURATION", "2m"),
        ]))
        .unwrap();

        assert_eq!(config.database_url, "postgres://localhost/x");
        assert_eq!(config.redis_url, "redis://localhost:6379");
        assert_eq!(config.jwt_expiration_hours, 48);
        assert_eq!(config.rate_limit_window(), Duration::from_secs(120));
    }

    #[test]
    fn non_positive_expiration_falls_back_to_a_day() {
        let config = Config::from_lookup(lookup(&[
            ("JWT_SECRET_KEY", "s3cret"),
            ("DATABASE_URL", "postgres://localhost/x"),
            ("IS_REDIS", "false"),
            ("JWT_EXPIRATION", "0"),
        ]))
        .unwrap();
        assert_eq!(config.jwt_expiration_hours, 24);
    }

    #[test]
    fn expiration_beyond_ten_years_is_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("JWT_SECRET_KEY", "s3cret"),
            ("DATABASE_URL", "postgres://localhost/x"),
            ("IS_REDIS", "false"),
            ("JWT_EXPIRATION", "100000000000h"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "JWT_EXPIRATION", .. }));
    }

    #[test]
    fn secret_is_required() {
        let err = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/x")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("JWT_SECRET_KEY")));
    }

    #[test]
    fn redis_uri_required_when_redis_enabled() {
        let err = Config::from_lookup(lookup(&[
            ("JWT_SECRET_KEY", "s3cret"),
            ("DATABASE_URL", "postgres://localhost/x"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("REDIS_URI")));
    }

    #[test]
    fn rejects_garbage_numbers() {
        let err = Config::from_lookup(lookup(&[
            ("JWT_SECRET_KEY", "s3cret"),
            ("DATABASE_URL", "postgres://localhost/x"),
            ("IS_REDIS", "false"),
            ("SERVER_PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SERVER_PORT", .. }));
    }

    #[test]
    fn duration_suffixes() {
        assert_eq!(parse_duration_secs("90"), Some(90));
        assert_eq!(parse_duration_secs("30s"), Some(30));
        assert_eq!(parse_duration_secs("1m"), Some(60));
        assert_eq!(parse_duration_secs("2h"), Some(7200));
        assert_eq!(parse_duration_secs("3d"), None);
        assert_eq!(parse_duration_secs("m"), None);
        assert_eq!(parse_duration_secs("18446744073709551615h"), None);
    }
}
