//! Application configuration

use std::env;

const ENV_HOST: &str = "HOST";
const ENV_PORT: &str = "PORT";
const ENV_BIGDATA_API_KEY: &str = "BIGDATA_API_KEY";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;

/// Application configuration
///
/// External collaborator base URLs are resolved by the individual clients
/// (knowledge graph, workflow engine, traces); the Postgres connection is
/// resolved in the `db` module.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// API key for the external Bigdata services; the service refuses to
    /// start without one
    pub bigdata_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            bigdata_api_key: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let port = env::var(ENV_PORT)
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let host = env::var(ENV_HOST).unwrap_or_else(|_| DEFAULT_HOST.to_string());

        let bigdata_api_key = env::var(ENV_BIGDATA_API_KEY)
            .ok()
            .filter(|key| !key.trim().is_empty());

        Self {
            host,
            port,
            bigdata_api_key,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
