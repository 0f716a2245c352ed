use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::models::PROXY_TIMEOUT;

/// Fallback backend location when neither a config file nor the environment names one.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";

/// Environment variable that overrides `backend.base_url`.
pub const BACKEND_URL_ENV: &str = "GRANT_API_URL";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub sessions: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Where and how the proxy reaches the proposal service.
#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub upload_path: String,
    pub single_upload_path: String,
    pub chunk_init_path: String,
    pub chunk_path: String,
    pub chunk_finalize_path: String,
    pub health_path: String,
    pub generate_path: String,
}

/// Chunk-session bookkeeping kept by the proxy.
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Idle time after which an unfinished session is dropped
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let defaults = Settings::default();

        let s = Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", defaults.server.port)?
            .set_default("backend.base_url", defaults.backend.base_url)?
            .set_default("backend.timeout_secs", defaults.backend.timeout_secs)?
            .set_default("backend.upload_path", defaults.backend.upload_path)?
            .set_default(
                "backend.single_upload_path",
                defaults.backend.single_upload_path,
            )?
            .set_default("backend.chunk_init_path", defaults.backend.chunk_init_path)?
            .set_default("backend.chunk_path", defaults.backend.chunk_path)?
            .set_default(
                "backend.chunk_finalize_path",
                defaults.backend.chunk_finalize_path,
            )?
            .set_default("backend.health_path", defaults.backend.health_path)?
            .set_default("backend.generate_path", defaults.backend.generate_path)?
            .set_default("sessions.ttl_secs", defaults.sessions.ttl_secs)?
            .set_default(
                "sessions.sweep_interval_secs",
                defaults.sessions.sweep_interval_secs,
            )?
            .add_source(File::with_name("config/default").required(false))
            // Per-environment file, e.g. config/production.toml
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, never checked in
            .add_source(File::with_name("config/local").required(false))
            // Eg. `APP_BACKEND__BASE_URL=https://... ./grant-upload-gateway`
            .add_source(
                Environment::with_prefix("app")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_override_option("backend.base_url", env::var(BACKEND_URL_ENV).ok())?
            .build()?;

        s.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            backend: BackendConfig {
                base_url: DEFAULT_BACKEND_URL.to_string(),
                timeout_secs: PROXY_TIMEOUT.as_secs(),
                upload_path: "/upload_documents".to_string(),
                single_upload_path: "/upload_documents".to_string(),
                chunk_init_path: "/upload/init".to_string(),
                chunk_path: "/upload/chunk".to_string(),
                chunk_finalize_path: "/upload/finalize".to_string(),
                health_path: "/health".to_string(),
                generate_path: "/generate_grant_proposal".to_string(),
            },
            sessions: SessionConfig {
                ttl_secs: 60 * 60,
                sweep_interval_secs: 5 * 60,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // process environment is shared by every test thread
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_env_layering() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var(BACKEND_URL_ENV);
        env::set_var("APP_BACKEND__BASE_URL", "http://from-app-env:9001");
        env::set_var("APP_SESSIONS__TTL_SECS", "120");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.backend.base_url, "http://from-app-env:9001");
        assert_eq!(settings.sessions.ttl(), Duration::from_secs(120));

        env::set_var(BACKEND_URL_ENV, "http://grant-api:9002");
        let settings = Settings::new().unwrap();
        assert_eq!(settings.backend.base_url, "http://grant-api:9002");

        env::remove_var(BACKEND_URL_ENV);
        env::remove_var("APP_BACKEND__BASE_URL");
        env::remove_var("APP_SESSIONS__TTL_SECS");
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.backend.base_url, DEFAULT_BACKEND_URL);
        assert_eq!(settings.backend.timeout(), Duration::from_secs(600));
        assert_eq!(settings.sessions.ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn test_sweep_interval_never_zero() {
        let sessions = SessionConfig {
            ttl_secs: 1,
            sweep_interval_secs: 0,
        };
        assert_eq!(sessions.sweep_interval(), Duration::from_secs(1));
    }
}
