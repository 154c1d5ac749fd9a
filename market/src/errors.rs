use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketError {
    #[error("Parameters invalid: {message}")]
    ParametersInvalid { message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Parse result error: {message}")]
    ParseResultError { message: String },

    #[error(transparent)]
    Cache(#[from] cache::CacheError),
}

impl MarketError {
    pub fn parameters_invalid<S: Into<String>>(message: S) -> Self {
        Self::ParametersInvalid {
            message: message.into(),
        }
    }

    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::ParseResultError {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MarketError>;
