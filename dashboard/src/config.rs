use log::debug;
use serde::Deserialize;
use thiserror::Error;

mod dashboard_config;
pub use dashboard_config::{DashboardConfig, Proxy, RestSourceConfig, StreamConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file error: {message}")]
    FileError { message: String },
    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

pub struct Config {
    settings: config::Config,
}

impl Config {
    pub fn from_json(filepath: &str) -> Result<Self, ConfigError> {
        Self::load(filepath, config::FileFormat::Json)
    }

    pub fn from_yaml(filepath: &str) -> Result<Self, ConfigError> {
        Self::load(filepath, config::FileFormat::Yaml)
    }

    pub fn from_toml(filepath: &str) -> Result<Self, ConfigError> {
        Self::load(filepath, config::FileFormat::Toml)
    }

    fn load(filepath: &str, format: config::FileFormat) -> Result<Self, ConfigError> {
        config::builder::ConfigBuilder::<config::builder::DefaultState>::default()
            .add_source(config::File::with_name(filepath).format(format))
            .build()
            .map(|settings| {
                debug!("settings: {:?}", settings);
                Config { settings }
            })
            .map_err(|e| ConfigError::FileError {
                message: format!("{}: {}", filepath, e),
            })
    }

    pub fn get<'de, T: Deserialize<'de>>(&self, key: &str) -> Result<T, ConfigError> {
        self.settings
            .get::<T>(key)
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
    }

    // 缺失返回None，格式错误仍然报错
    pub fn get_optional<'de, T: Deserialize<'de>>(
        &self,
        key: &str,
    ) -> Result<Option<T>, ConfigError> {
        match self.settings.get::<T>(key) {
            Ok(value) => Ok(Some(value)),
            Err(config::ConfigError::NotFound(_)) => Ok(None),
            Err(e) => Err(ConfigError::ParseError {
                message: e.to_string(),
            }),
        }
    }
}
