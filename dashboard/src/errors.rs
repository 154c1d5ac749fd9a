use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error(transparent)]
    Market(#[from] market::MarketError),
}

impl DashboardError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
