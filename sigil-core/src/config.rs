//! Configuration management

use crate::error::{ErrorContext, SigilError, SigilResult};
use crate::logging::LoggingConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

/// Secret shipped in generated config files. `validate` warns while it is in use.
pub const PLACEHOLDER_SECRET: &str = "change-me-in-production";

/// Two weeks, in seconds.
pub const DEFAULT_MAX_AGE: i64 = 14 * 24 * 60 * 60;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SigilConfig {
    pub session: SessionSettings,
    pub database: DatabaseSettings,
    pub logging: LoggingConfig,
}

/// Which backend holds session state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Whole state lives in the signed cookie value
    #[default]
    Cookie,
    /// Cookie carries a signed row id; state lives in the record store
    Database,
}

impl FromStr for BackendKind {
    type Err = SigilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cookie" => Ok(BackendKind::Cookie),
            "database" | "db" => Ok(BackendKind::Database),
            other => Err(crate::validation_error!(
                format!("Unknown session backend '{}'", other),
                "session.backend",
                "config"
            )),
        }
    }
}

/// What a database-backed read does with a row whose signature has expired
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiredRowPolicy {
    /// Leave the row for an external sweeper (`sigil sweep`)
    #[default]
    Keep,
    /// Delete the row as soon as a read finds it expired
    PurgeOnRead,
}

/// SameSite attribute of the session cookie
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    Strict,
    #[default]
    Lax,
    None,
}

/// Session behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Shared secret for every signer in the process
    pub secret_key: String,
    /// Signature lifetime in seconds; also the cookie Max-Age
    pub max_age: i64,
    pub backend: BackendKind,
    pub cookie_name: String,
    pub cookie_path: String,
    pub cookie_domain: Option<String>,
    pub cookie_secure: bool,
    pub cookie_same_site: SameSitePolicy,
    pub expired_rows: ExpiredRowPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            secret_key: PLACEHOLDER_SECRET.to_string(),
            max_age: DEFAULT_MAX_AGE,
            backend: BackendKind::default(),
            cookie_name: "session".to_string(),
            cookie_path: "/".to_string(),
            cookie_domain: None,
            cookie_secure: false,
            cookie_same_site: SameSitePolicy::default(),
            expired_rows: ExpiredRowPolicy::default(),
        }
    }
}

/// Durable store for the database backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// sqlx connection URL, e.g. `sqlite:data/sessions.db` or `sqlite::memory:`
    pub url: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite:sigil-sessions.db".to_string(),
        }
    }
}

impl SigilConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> SigilResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SigilError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: SigilConfig = toml::from_str(&content).map_err(|e| SigilError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> SigilResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| SigilError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        std::fs::write(path, content).map_err(|e| SigilError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Override values from the environment
    ///
    /// Recognised: `SIGIL_SECRET_KEY`, `SIGIL_MAX_AGE`, `SIGIL_BACKEND`, `DATABASE_URL`.
    pub fn apply_env(&mut self) -> SigilResult<()> {
        if let Ok(secret) = std::env::var("SIGIL_SECRET_KEY") {
            self.session.secret_key = secret;
        }
        if let Ok(max_age) = std::env::var("SIGIL_MAX_AGE") {
            self.session.max_age = max_age.trim().parse().map_err(|_| {
                crate::validation_error!(
                    format!("SIGIL_MAX_AGE is not an integer: {}", max_age),
                    "session.max_age",
                    "config"
                )
            })?;
        }
        if let Ok(backend) = std::env::var("SIGIL_BACKEND") {
            self.session.backend = backend.parse()?;
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = url;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SigilResult<()> {
        if self.session.secret_key.is_empty() {
            return Err(SigilError::Config {
                message: "session.secret_key must not be empty".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set session.secret_key or SIGIL_SECRET_KEY"),
            });
        }

        if self.session.secret_key == PLACEHOLDER_SECRET {
            warn!("session.secret_key is the placeholder value; sessions can be forged");
        }

        if self.session.max_age <= 0 {
            return Err(SigilError::Config {
                message: "session.max_age must be greater than 0".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set session.max_age to a positive number of seconds"),
            });
        }

        let name = &self.session.cookie_name;
        if name.is_empty() || name.contains(|c: char| c == ';' || c == '=' || c.is_whitespace()) {
            return Err(crate::validation_error!(
                format!("Invalid cookie name '{}'", name),
                "session.cookie_name",
                "config"
            ));
        }

        if self.session.backend == BackendKind::Database && self.database.url.is_empty() {
            return Err(SigilError::Config {
                message: "database.url is required for the database backend".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set database.url or DATABASE_URL"),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SigilConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.session.backend, BackendKind::Cookie);
        assert_eq!(config.session.expired_rows, ExpiredRowPolicy::Keep);
        assert_eq!(config.session.max_age, 1_209_600);
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("cookie".parse::<BackendKind>().unwrap(), BackendKind::Cookie);
        assert_eq!(" Database ".parse::<BackendKind>().unwrap(), BackendKind::Database);
        assert!("redis".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SigilConfig::default();
        config.session.max_age = 0;
        assert!(config.validate().is_err());

        let mut config = SigilConfig::default();
        config.session.secret_key.clear();
        assert!(config.validate().is_err());

        let mut config = SigilConfig::default();
        config.session.cookie_name = "bad name".to_string();
        let err = config.validate().unwrap_err();
        assert_eq!(err.field(), Some("session.cookie_name"));

        let mut config = SigilConfig::default();
        config.session.backend = BackendKind::Database;
        config.database.url.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SigilConfig = toml::from_str(
            r#"
            [session]
            secret_key = "s3cret"
            backend = "database"
            expired_rows = "purge_on_read"
            "#,
        )
        .unwrap();

        assert_eq!(config.session.secret_key, "s3cret");
        assert_eq!(config.session.backend, BackendKind::Database);
        assert_eq!(config.session.expired_rows, ExpiredRowPolicy::PurgeOnRead);
        assert_eq!(config.session.cookie_name, "session");
        assert_eq!(config.database.url, "sqlite:sigil-sessions.db");
    }
}
