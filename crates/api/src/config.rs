//! Runtime configuration.
//!
//! Sources, later ones winning: built-in defaults, `config/default.toml`,
//! `config/{APP_ENV}.toml`, then `PROPDESK__SECTION__KEY` environment
//! variables.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use propdesk_auth::TokenSettings;
use propdesk_observability::LogFormat;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub log: LogSettings,
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub bind: String,
}

#[derive(Clone, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

impl core::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("jwt_secret", &"<redacted>")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish()
    }
}

impl AuthSettings {
    pub fn token_settings(&self) -> TokenSettings {
        TokenSettings {
            access_ttl_secs: self.access_ttl_secs,
            refresh_ttl_secs: self.refresh_ttl_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl ApiConfig {
    /// Load from files and environment. `auth.jwt_secret` has no default.
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".into());

        Self::builder()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                Environment::with_prefix("PROPDESK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Defaults plus a TOML document; used by tests and tooling.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Self::builder()?
            .add_source(File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.bind", "0.0.0.0:8080")?
            .set_default("auth.access_ttl_secs", 900_i64)?
            .set_default("auth.refresh_ttl_secs", 1_209_600_i64)?
            .set_default("log.format", "json")?
            .set_default("storage.backend", "memory")?
            .set_default("storage.max_connections", 10_i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_everything_but_the_secret() {
        let cfg = ApiConfig::from_toml(
            r#"
            [auth]
            jwt_secret = "0123456789abcdef0123456789abcdef"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.server.bind, "0.0.0.0:8080");
        assert_eq!(cfg.auth.token_settings(), TokenSettings::default());
        assert_eq!(cfg.log.format, LogFormat::Json);
        assert_eq!(cfg.storage.backend, StorageBackend::Memory);
        assert_eq!(cfg.storage.max_connections, 10);
        assert!(cfg.storage.database_url.is_none());
    }

    #[test]
    fn missing_secret_is_an_error() {
        assert!(ApiConfig::from_toml("").is_err());
    }

    #[test]
    fn overrides_apply() {
        let cfg = ApiConfig::from_toml(
            r#"
            [server]
            bind = "127.0.0.1:9000"
            [auth]
            jwt_secret = "0123456789abcdef0123456789abcdef"
            access_ttl_secs = 60
            [log]
            format = "pretty"
            [storage]
            backend = "postgres"
            database_url = "postgres://localhost/propdesk"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.server.bind, "127.0.0.1:9000");
        assert_eq!(cfg.auth.access_ttl_secs, 60);
        assert_eq!(cfg.log.format, LogFormat::Pretty);
        assert_eq!(cfg.storage.backend, StorageBackend::Postgres);
        assert_eq!(cfg.storage.database_url.as_deref(), Some("postgres://localhost/propdesk"));
    }

    #[test]
    fn secret_is_not_printed() {
        let cfg = ApiConfig::from_toml(
            r#"
            [auth]
            jwt_secret = "super-secret-super-secret-super-secret"
            "#,
        )
        .unwrap();
        assert!(!format!("{cfg:?}").contains("super-secret"));
    }
}
