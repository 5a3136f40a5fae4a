//! @ai:module:intent Define error types for the crank runner
//! @ai:module:layer domain
//! @ai:module:public_api Error, Result
//! @ai:module:stateless true

use crate::bridge::CorrelationId;
use crate::engine::EngineError;
use crate::store::StoreError;
use thiserror::Error;

/// @ai:intent Unified error type for orchestrator, runner and bridge operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("engine failure: {0}")]
    Engine(#[from] EngineError),

    #[error("storage failure: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("correlation {0} was abandoned before it resolved")]
    Abandoned(CorrelationId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Toml(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Toml(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
