//! Encoder configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default backpressure threshold of the converter input, in bytes.
pub const DEFAULT_HIGH_WATER_MARK: usize = 16 * 1024;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid image size {0:?}, expected WIDTHxHEIGHT")]
    InvalidImageSize(String),

    #[error("Invalid frame rate {0}, must be a positive number")]
    InvalidFrameRate(f64),

    #[error("Converter path must not be empty")]
    EmptyConverterPath,

    #[error("Input high water mark must be greater than zero")]
    ZeroHighWaterMark,
}

/// Fixed output dimensions passed to the converter as `-s WIDTHxHEIGHT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for ImageSize {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidImageSize(s.to_string());

        let (width, height) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let width: u32 = width.parse().map_err(|_| invalid())?;
        let height: u32 = height.parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }

        Ok(Self { width, height })
    }
}

impl TryFrom<String> for ImageSize {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ImageSize> for String {
    fn from(size: ImageSize) -> Self {
        size.to_string()
    }
}

/// Settings captured by a [`PngEncoder`](crate::PngEncoder) at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Path to the converter binary
    #[serde(default = "default_converter_path")]
    pub converter_path: String,
    /// Output frame rate
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,
    /// Fixed output image size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<ImageSize>,
    /// Buffered input bytes at which `write` starts reporting backpressure
    #[serde(default = "default_high_water_mark")]
    pub input_high_water_mark: usize,
    /// Additional arguments placed before the input flag
    #[serde(default)]
    pub input_args: Vec<String>,
    /// Additional arguments placed before the output marker
    #[serde(default)]
    pub output_args: Vec<String>,
}

fn default_converter_path() -> String {
    "ffmpeg".to_string()
}

fn default_frame_rate() -> f64 {
    5.0
}

fn default_high_water_mark() -> usize {
    DEFAULT_HIGH_WATER_MARK
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            converter_path: default_converter_path(),
            frame_rate: default_frame_rate(),
            image_size: None,
            input_high_water_mark: default_high_water_mark(),
            input_args: Vec::new(),
            output_args: Vec::new(),
        }
    }
}

impl EncoderConfig {
    pub fn with_converter_path(mut self, path: impl Into<String>) -> Self {
        self.converter_path = path.into();
        self
    }

    pub fn with_frame_rate(mut self, frame_rate: f64) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    pub fn with_image_size(mut self, size: ImageSize) -> Self {
        self.image_size = Some(size);
        self
    }

    pub fn with_high_water_mark(mut self, bytes: usize) -> Self {
        self.input_high_water_mark = bytes;
        self
    }

    /// Check values that would otherwise only fail once the converter runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.converter_path.trim().is_empty() {
            return Err(ConfigError::EmptyConverterPath);
        }
        if !self.frame_rate.is_finite() || self.frame_rate <= 0.0 {
            return Err(ConfigError::InvalidFrameRate(self.frame_rate));
        }
        if self.input_high_water_mark == 0 {
            return Err(ConfigError::ZeroHighWaterMark);
        }
        Ok(())
    }
}
