use serde::Deserialize;
use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

const DEFAULT_BUCKET_NAME: &str = "replaste-h5";
const DEFAULT_OBJECT_PATH: &str = "model1.onnx";
const DEFAULT_STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub log_level: LogLevel,
    pub storage: StorageConfig,
    pub model: ModelConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

impl ServerConfig {
    pub fn get_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub bucket_name: String,
    #[serde(default = "default_storage_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub access_token: Option<String>,
}

fn default_storage_endpoint() -> String {
    DEFAULT_STORAGE_ENDPOINT.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub object_path: String,
    #[serde(default)]
    pub local_path: Option<PathBuf>,
    #[serde(default = "default_model_instances")]
    pub num_instances: usize,
}

fn default_model_instances() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

pub trait Validatable {
    fn validate(&self) -> Result<(), String>;
}

impl Validatable for ServerConfig {
    fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("server.port must be non-zero".to_string());
        }
        if self.max_upload_bytes == 0 {
            return Err("server.max_upload_bytes must be non-zero".to_string());
        }
        Ok(())
    }
}

impl Validatable for StorageConfig {
    fn validate(&self) -> Result<(), String> {
        if self.bucket_name.trim().is_empty() {
            return Err("storage.bucket_name must not be empty".to_string());
        }
        if self.endpoint.trim().is_empty() {
            return Err("storage.endpoint must not be empty".to_string());
        }
        Ok(())
    }
}

impl Validatable for ModelConfig {
    fn validate(&self) -> Result<(), String> {
        if self.object_path.trim().is_empty() {
            return Err("model.object_path must not be empty".to_string());
        }
        if self.num_instances == 0 {
            return Err("model.num_instances must be at least 1".to_string());
        }
        if let Some(path) = &self.local_path {
            if !Path::new(path).exists() {
                return Err(format!("Model file not found: {:?}", path));
            }
        }
        Ok(())
    }
}

impl Validatable for Config {
    fn validate(&self) -> Result<(), String> {
        self.server.validate()?;
        self.storage.validate()?;
        self.model.validate()
    }
}

/// Selects `configuration/{name}.yaml`; read from `APP_ENVIRONMENT`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn file_name(&self) -> &'static str {
        match self {
            Environment::Local => "local.yaml",
            Environment::Production => "production.yaml",
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Environment::Local),
            "production" => Ok(Environment::Production),
            unknown => Err(format!(
                "unknown APP_ENVIRONMENT `{}`, expected `local` or `production`",
                unknown
            )),
        }
    }
}

/// Minimum level for the crate's own logs; `RUST_LOG` still wins.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(try_from = "String")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(level: String) -> Result<Self, Self::Error> {
        match level.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            unknown => Err(format!(
                "unsupported log_level `{}`, expected `debug`, `info` or `warn`",
                unknown
            )),
        }
    }
}

/// Loads the configuration from `./configuration` and the environment.
///
/// Later sources win: built-in defaults, `base.yaml`, `{APP_ENVIRONMENT}.yaml`,
/// `APP_*` variables, then the plain deployment variables `BUCKET_NAME`,
/// `MODEL_PATH` and `PORT`.
pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let configuration_directory = std::env::current_dir()
        .map_err(|e| config::ConfigError::Foreign(Box::new(e)))?
        .join("configuration");

    let environment = match std::env::var("APP_ENVIRONMENT") {
        Ok(name) => name.parse::<Environment>().map_err(config::ConfigError::Message)?,
        Err(_) => Environment::Local,
    };

    let builder = config::Config::builder()
        .set_default("log_level", "info")?
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", i64::from(DEFAULT_PORT))?
        .set_default("storage.bucket_name", DEFAULT_BUCKET_NAME)?
        .set_default("model.object_path", DEFAULT_OBJECT_PATH)?
        .add_source(
            config::File::from(configuration_directory.join("base.yaml")).required(false),
        )
        .add_source(
            config::File::from(configuration_directory.join(environment.file_name()))
                .required(false),
        )
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .set_override_option("storage.bucket_name", std::env::var("BUCKET_NAME").ok())?
        .set_override_option("model.object_path", std::env::var("MODEL_PATH").ok())?
        .set_override_option("server.port", std::env::var("PORT").ok())?;

    let settings = builder.build()?.try_deserialize::<Config>()?;

    settings
        .validate()
        .map_err(|e| config::ConfigError::Message(format!("invalid configuration: {}", e)))?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> Config {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                max_upload_bytes: default_max_upload_bytes(),
            },
            log_level: LogLevel::Info,
            storage: StorageConfig {
                bucket_name: "bucket".to_string(),
                endpoint: default_storage_endpoint(),
                access_token: None,
            },
            model: ModelConfig {
                object_path: "model.onnx".to_string(),
                local_path: None,
                num_instances: 1,
            },
        }
    }

    #[test]
    fn test_server_address() {
        let config = sample_config();
        assert_eq!(config.server.get_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_validate_accepts_sample() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_bucket() {
        let mut config = sample_config();
        config.storage.bucket_name = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_instances() {
        let mut config = sample_config();
        config.model.num_instances = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_missing_local_model() {
        let mut config = sample_config();
        config.model.local_path = Some(PathBuf::from("/definitely/not/here/model.onnx"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::try_from("DEBUG".to_string()), Ok(LogLevel::Debug));
        assert_eq!(LogLevel::try_from(" warn ".to_string()), Ok(LogLevel::Warn));
        assert!(LogLevel::try_from("trace".to_string()).is_err());
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!("Production".parse::<Environment>(), Ok(Environment::Production));
        assert_eq!(Environment::Local.file_name(), "local.yaml");
        assert!("staging".parse::<Environment>().is_err());
    }
}
