//! Converter command line.

use crate::config::EncoderConfig;

/// Input format of the converter's output pipe.
pub const OUTPUT_FORMAT: &str = "image2pipe";
/// Image codec of every produced frame.
pub const OUTPUT_CODEC: &str = "png";
/// Placeholder for "standard input" / "standard output".
pub const PIPE: &str = "-";

/// Program and arguments a converter is spawned with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Build the converter invocation for `config`.
    ///
    /// Reads video from stdin and writes a PNG sequence to stdout:
    /// `-i - -f image2pipe [-s WxH] -vcodec png -r RATE -`.
    pub fn from_config(config: &EncoderConfig) -> Self {
        let mut args = Vec::new();

        args.extend(config.input_args.iter().cloned());
        args.extend(["-i".to_string(), PIPE.to_string()]);
        args.extend(["-f".to_string(), OUTPUT_FORMAT.to_string()]);

        if let Some(size) = config.image_size {
            args.extend(["-s".to_string(), size.to_string()]);
        }

        args.extend(["-vcodec".to_string(), OUTPUT_CODEC.to_string()]);
        args.extend(["-r".to_string(), config.frame_rate.to_string()]);
        args.extend(config.output_args.iter().cloned());
        args.push(PIPE.to_string());

        Self {
            program: config.converter_path.clone(),
            args,
        }
    }

    /// Value following `flag`, if present.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        let index = self.args.iter().position(|arg| arg == flag)?;
        self.args.get(index + 1).map(String::as_str)
    }
}
