//! Konfiguration
//!
//! App-ID und Access Token kommen out-of-band aus der Umgebung,
//! nie aus Benutzereingaben.

use thiserror::Error;

pub const APP_ID_VAR: &str = "CALLS_APP_ID";
pub const USER_TOKEN_VAR: &str = "CALLS_USER_TOKEN";

/// App-ID und Token des Loopback-Backends im Demo-Binary
pub const LOOPBACK_APP_ID: &str = "loopback-app";
pub const LOOPBACK_ACCESS_TOKEN: &str = "loopback-token";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration value {0}")]
    Missing(&'static str),

    #[error("Configuration value {0} is empty")]
    Empty(&'static str),
}

#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub app_id: String,
    pub access_token: String,
}

impl AppConfig {
    pub fn new(app_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            access_token: access_token.into(),
        }
    }

    /// Liest die Konfiguration aus `CALLS_APP_ID` und `CALLS_USER_TOKEN`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Konfiguration passend zum Loopback-Backend
    pub fn loopback() -> Self {
        Self::new(LOOPBACK_APP_ID, LOOPBACK_ACCESS_TOKEN)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &'static str| -> Result<String, ConfigError> {
            let value = lookup(key).ok_or(ConfigError::Missing(key))?;
            let value = value.trim();
            if value.is_empty() {
                return Err(ConfigError::Empty(key));
            }
            Ok(value.to_string())
        };

        Ok(Self {
            app_id: read(APP_ID_VAR)?,
            access_token: read(USER_TOKEN_VAR)?,
        })
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("app_id", &self.app_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}
