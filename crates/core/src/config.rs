use std::{fmt, time::Duration};

use serde::{Deserialize, Deserializer, de};

use crate::datetime;

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DEFAULT_LOGIN_ATTEMPTS: u32 = 3;
const DEFAULT_LOGIN_RETRY_DELAY_SECS: u64 = 30;
const DEFAULT_RECONNECT_DELAY_SECS: u64 = 10;
const DEFAULT_NATIVE_STATEMENT_CACHE_SIZE: u32 = 20;
const DEFAULT_LOB_CHUNK_SIZE: usize = 32 * 1024;
const DEFAULT_DATABASE_NAME: &str = "default";

/// Target identity of a connection. No URL or DSN parsing happens here.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionDescriptor {
    pub database: String,
    pub user: String,
    pub password: String,
}

impl ConnectionDescriptor {
    pub fn new(
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Label attached to log spans for this connection.
    pub name: String,
    /// Login attempts for ODBC-family backends; the call interface makes one.
    pub login_attempts: u32,
    pub login_retry_delay_secs: u64,
    pub reconnect_delay_secs: u64,
    pub native_statement_cache: bool,
    pub native_statement_cache_size: u32,
    pub lob_chunk_size: usize,
    /// `chrono` format used to parse date parameters and render date columns.
    #[serde(deserialize_with = "date_format")]
    pub date_format: String,
    pub warnings_as_errors: bool,
    /// Collection type arrays are constructed as on the call interface when a
    /// parameter does not name one.
    pub array_type_name: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_DATABASE_NAME.to_string(),
            login_attempts: DEFAULT_LOGIN_ATTEMPTS,
            login_retry_delay_secs: DEFAULT_LOGIN_RETRY_DELAY_SECS,
            reconnect_delay_secs: DEFAULT_RECONNECT_DELAY_SECS,
            native_statement_cache: true,
            native_statement_cache_size: DEFAULT_NATIVE_STATEMENT_CACHE_SIZE,
            lob_chunk_size: DEFAULT_LOB_CHUNK_SIZE,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            warnings_as_errors: false,
            array_type_name: None,
        }
    }
}

impl DatabaseConfig {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Checks settings that serde alone cannot, for configs built in code.
    pub fn validate(&self) -> Result<(), String> {
        datetime::validate_format(&self.date_format)
    }

    /// Zero delays; used by tests and tools that manage backoff themselves.
    #[must_use]
    pub fn without_delays(mut self) -> Self {
        self.login_retry_delay_secs = 0;
        self.reconnect_delay_secs = 0;
        self
    }

    #[must_use]
    pub fn login_retry_delay(&self) -> Duration {
        Duration::from_secs(self.login_retry_delay_secs)
    }

    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

fn date_format<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let format = String::deserialize(deserializer)?;
    datetime::validate_format(&format).map_err(de::Error::custom)?;
    Ok(format)
}

#[cfg(test)]
mod tests {
    use super::{ConnectionDescriptor, DatabaseConfig};

    #[test]
    fn descriptor_debug_hides_password() {
        let descriptor = ConnectionDescriptor::new("FINDB", "router", "s3cret");
        let rendered = format!("{descriptor:?}");
        assert!(rendered.contains("router"));
        assert!(!rendered.contains("s3cret"));
    }

    #[test]
    fn defaults_match_login_and_reconnect_policy() {
        let config = DatabaseConfig::default();
        assert_eq!(config.login_attempts, 3);
        assert_eq!(config.login_retry_delay().as_secs(), 30);
        assert_eq!(config.reconnect_delay().as_secs(), 10);
        assert!(config.without_delays().reconnect_delay().is_zero());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: DatabaseConfig = serde_yaml::from_str("name: router\nlob_chunk_size: 1024\n")
            .expect("valid config");
        assert_eq!(config.name, "router");
        assert_eq!(config.lob_chunk_size, 1024);
        assert_eq!(config.login_attempts, 3);

        let unknown = serde_yaml::from_str::<DatabaseConfig>("pool_size: 4\n");
        assert!(unknown.is_err());
    }

    #[test]
    fn invalid_date_formats_are_rejected() {
        let error = serde_yaml::from_str::<DatabaseConfig>("date_format: \"%Y-%Q\"\n")
            .expect_err("unknown specifier");
        assert!(error.to_string().contains("not a valid date format"), "{error}");

        let config = DatabaseConfig {
            date_format: "%Q".to_string(),
            ..DatabaseConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(DatabaseConfig::default().validate().is_ok());
    }
}
