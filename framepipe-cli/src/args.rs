//! Command-line arguments and how they map onto an [`EncoderConfig`].

use std::path::{Path, PathBuf};

use clap::Parser;
use framepipe::{EncoderConfig, ImageSize};
use tracing::debug;

use crate::error::AppError;

/// Extract PNG frames from a video stream using ffmpeg.
#[derive(Debug, Parser)]
#[command(name = "framepipe", version, about)]
pub struct Args {
    /// Video file to read, or `-` for stdin
    pub input: PathBuf,

    /// Directory the frames are written to
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// File name prefix of written frames
    #[arg(long, default_value = "frame")]
    pub prefix: String,

    /// JSON file with encoder settings; flags below take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Converter binary (ffmpeg or a compatible tool)
    #[arg(long)]
    pub converter: Option<String>,

    /// Frames per second to extract
    #[arg(short = 'r', long)]
    pub frame_rate: Option<f64>,

    /// Fixed output size, e.g. 640x360
    #[arg(short, long)]
    pub size: Option<ImageSize>,

    /// Write the converter's own log output to this file instead of the debug log
    #[arg(long)]
    pub converter_log: Option<PathBuf>,

    /// Only check that the converter can be run
    #[arg(long)]
    pub check: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Also write logs to daily rotated files in this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

impl Args {
    pub fn reads_stdin(&self) -> bool {
        self.input == Path::new("-")
    }

    /// Build the encoder configuration: defaults, then the config file, then flags.
    pub fn encoder_config(&self) -> Result<EncoderConfig, AppError> {
        let mut config = match &self.config {
            Some(path) => load_config_file(path)?,
            None => EncoderConfig::default(),
        };

        if let Some(converter) = &self.converter {
            config.converter_path = converter.clone();
        }
        if let Some(frame_rate) = self.frame_rate {
            config.frame_rate = frame_rate;
        }
        if let Some(size) = self.size {
            config.image_size = Some(size);
        }

        config.validate()?;
        debug!(?config, "Resolved encoder configuration");
        Ok(config)
    }
}

fn load_config_file(path: &Path) -> Result<EncoderConfig, AppError> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|source| AppError::ConfigFile {
        path: path.to_path_buf(),
        source,
    })
}
