use std::time::Duration;

use anyhow::{anyhow, Context, Result};

const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_BASE_URL: &str = "http://together-app.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub worker_poll_interval: Duration,
    pub bcrypt_cost: u32,
    pub smtp: Option<SmtpConfig>,
    pub app_base_url: String,
}

impl AppConfig {
    /// Loads `.env` (if any) and reads the process environment once.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;

        let database_max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 20u32)?;
        let port = parse_or(&lookup, "PORT", 3000u16)?;
        let poll_secs = parse_or(&lookup, "WORKER_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        if poll_secs == 0 {
            return Err(anyhow!("WORKER_POLL_INTERVAL_SECS must be greater than zero"));
        }
        let bcrypt_cost = parse_or(&lookup, "BCRYPT_COST", bcrypt::DEFAULT_COST)?;

        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("") | Some("compact") => LogFormat::Compact,
            Some("json") => LogFormat::Json,
            Some(other) => return Err(anyhow!("LOG_FORMAT must be 'compact' or 'json', got '{}'", other)),
        };

        Ok(Self {
            database_url,
            database_max_connections,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            log_level: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            log_format,
            worker_poll_interval: Duration::from_secs(poll_secs),
            bcrypt_cost,
            smtp: smtp_from_lookup(&lookup)?,
            app_base_url: lookup("APP_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with("memory://")
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        _ => Ok(default),
    }
}

// SMTP is all-or-nothing: a partial block is a misconfiguration.
fn smtp_from_lookup<F>(lookup: &F) -> Result<Option<SmtpConfig>>
where
    F: Fn(&str) -> Option<String>,
{
    let keys = [
        "SMTP_SERVER",
        "SMTP_PORT",
        "SMTP_USERNAME",
        "SMTP_PASSWORD",
        "SMTP_FROM",
    ];
    let present = keys.iter().filter(|key| lookup(key).is_some()).count();
    if present == 0 {
        return Ok(None);
    }
    if present != keys.len() {
        return Err(anyhow!(
            "incomplete SMTP configuration: set all of {}",
            keys.join(", ")
        ));
    }

    let port: u16 = lookup("SMTP_PORT")
        .unwrap_or_default()
        .parse()
        .context("SMTP_PORT must be a valid u16 integer")?;

    Ok(Some(SmtpConfig {
        server: lookup("SMTP_SERVER").unwrap_or_default(),
        port,
        username: lookup("SMTP_USERNAME").unwrap_or_default(),
        password: lookup("SMTP_PASSWORD").unwrap_or_default(),
        from: lookup("SMTP_FROM").unwrap_or_default(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = AppConfig::from_lookup(lookup_from(&[("DATABASE_URL", "memory://")]))
            .expect("config");
        assert_eq!(config.port, 3000);
        assert_eq!(config.worker_poll_interval, Duration::from_secs(60));
        assert_eq!(config.log_format, LogFormat::Compact);
        assert!(config.smtp.is_none());
        assert!(config.uses_memory_store());
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
    }

    #[test]
    fn missing_database_url_is_an_error() {
        assert!(AppConfig::from_lookup(lookup_from(&[])).is_err());
    }

    #[test]
    fn poll_interval_is_configurable_but_not_zero() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/together"),
            ("WORKER_POLL_INTERVAL_SECS", "5"),
        ]))
        .expect("config");
        assert_eq!(config.worker_poll_interval, Duration::from_secs(5));
        assert!(!config.uses_memory_store());

        let zero = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "memory://"),
            ("WORKER_POLL_INTERVAL_SECS", "0"),
        ]));
        assert!(zero.is_err());
    }

    #[test]
    fn partial_smtp_block_is_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "memory://"),
            ("SMTP_SERVER", "smtp.example.com"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn full_smtp_block_is_parsed() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "memory://"),
            ("SMTP_SERVER", "smtp.example.com"),
            ("SMTP_PORT", "587"),
            ("SMTP_USERNAME", "together"),
            ("SMTP_PASSWORD", "secret"),
            ("SMTP_FROM", "Together <together@example.com>"),
            ("LOG_FORMAT", "json"),
        ]))
        .expect("config");
        let smtp = config.smtp.expect("smtp");
        assert_eq!(smtp.port, 587);
        assert_eq!(config.log_format, LogFormat::Json);
    }
}
