use std::io;

use thiserror::Error;

/// Exit code shells use for "command not found".
pub const EXIT_CODE_NOT_FOUND: i32 = 127;

/// Errors raised by a frame splitter.
#[derive(Error, Debug)]
pub enum FramingError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Converter output is not a PNG stream (bad signature)")]
    InvalidSignature,

    #[error("PNG chunk length {0} exceeds the format limit")]
    ChunkTooLarge(u32),
}

/// Terminal failures reported by a [`PngEncoder`](crate::PngEncoder).
///
/// Each variant is delivered at most once, as the last event of the encoder.
#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("Converter \"{path}\" was not found")]
    NotFound {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Converter \"{path}\" was not found (exit code 127)")]
    NotFoundExit { path: String },

    #[error("Unexpected error when launching converter \"{path}\": {source}")]
    Launch {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Unexpected converter exit with code 0")]
    UnexpectedExit,

    #[error("Converter failed {}", describe_exit(.code))]
    Failed { code: Option<i32> },

    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("Unexpected converter error: {0}")]
    Io(#[source] io::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("with exit code {code}"),
        None => "after being terminated by a signal".to_string(),
    }
}

impl EncoderError {
    /// Whether the converter binary could not be found, either at spawn time or
    /// through the legacy exit code 127.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::NotFoundExit { .. })
    }

    /// Exit code carried by the error, if any.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::NotFoundExit { .. } => Some(EXIT_CODE_NOT_FOUND),
            Self::UnexpectedExit => Some(0),
            Self::Failed { code } => *code,
            _ => None,
        }
    }

    /// Classify a failed spawn.
    pub(crate) fn spawn_failed(path: &str, source: io::Error) -> Self {
        let path = path.to_string();
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound { path, source }
        } else {
            Self::Launch { path, source }
        }
    }
}
