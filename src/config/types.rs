use std::path::Path;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use super::storage::StorageConfig;

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0: backend API, session persistence and logging.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ConfigV1 {
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the backend lives and how requests are sent to it.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_in_ms")]
    pub timeout_in_ms: u64,
    /// Send cookies along with every request (needed for cookie-based refresh tokens).
    #[serde(default = "default_with_credentials")]
    pub with_credentials: bool,
    #[serde(default)]
    pub endpoints: EndpointConfig,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        ApiConfig {
            base_url: base_url.into(),
            timeout_in_ms: default_timeout_in_ms(),
            with_credentials: default_with_credentials(),
            endpoints: EndpointConfig::default(),
        }
    }
}

/// Paths of the authentication endpoints, relative to `base_url`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
#[serde(default)]
pub struct EndpointConfig {
    pub signin: String,
    pub me: String,
    pub refresh: String,
    pub logout: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        EndpointConfig {
            signin: "/auth/signin".to_string(),
            me: "/auth/me".to_string(),
            refresh: "/auth/refresh".to_string(),
            logout: "/auth/logout".to_string(),
        }
    }
}

/// Session persistence: the storage entry name and its backend.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct SessionConfig {
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            storage_key: default_storage_key(),
            storage: StorageConfig::default(),
        }
    }
}

fn default_timeout_in_ms() -> u64 {
    10_000
}

fn default_with_credentials() -> bool {
    true
}

fn default_storage_key() -> String {
    "auth-storage".to_string()
}

/// Load config from the given YAML file, with `PORTAL_`-prefixed environment
/// variables layered on top (`PORTAL_API__BASE_URL` sets `api.base_url`).
pub fn load_config_from(path: &Path) -> Result<ConfigV1, figment::Error> {
    let figment = Figment::new()
        .merge(Yaml::file(path))
        .merge(Env::prefixed("PORTAL_").split("__"));
    match figment.extract::<Config>()? {
        Config::ConfigV1(c) => Ok(c),
    }
}

/// Load config from "config.yaml" in the current directory, exiting on error.
pub fn load_config() -> ConfigV1 {
    match load_config_from(Path::new("./config.yaml")) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() {
    let schema = schema_for!(Config);
    match serde_json::to_string_pretty(&schema) {
        Ok(rendered) => println!("{}", rendered),
        Err(e) => eprintln!("Failed to render configuration schema: {}", e),
    }
}
