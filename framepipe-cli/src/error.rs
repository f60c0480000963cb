use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] framepipe::ConfigError),

    #[error("Failed to parse config file {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Encoder error: {0}")]
    Encoder(#[from] framepipe::EncoderError),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("Converter {0:?} is not available")]
    ConverterUnavailable(String),
}
