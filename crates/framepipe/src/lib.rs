//! # framepipe
//!
//! Turns a continuous video byte stream into a stream of still PNG images by
//! piping it through an external converter process (`ffmpeg` by default).
//!
//! [`PngEncoder`] is the entry point: bytes go in through
//! [`write`](PngEncoder::write), complete images come out as
//! [`EncoderEvent::Data`], and the converter's lifecycle is reported as a
//! single terminal [`EncoderEvent::End`] or [`EncoderEvent::Error`].
//!
//! ```no_run
//! use framepipe::{EncoderConfig, EncoderEvent, PngEncoder};
//!
//! # async fn run(video: Vec<u8>) {
//! let mut encoder = PngEncoder::new(EncoderConfig::default().with_frame_rate(2.0));
//! encoder.write(video);
//! encoder.end();
//!
//! while let Some(event) = encoder.next_event().await {
//!     match event {
//!         EncoderEvent::Data(png) => println!("frame of {} bytes", png.len()),
//!         EncoderEvent::Error(e) => eprintln!("{e}"),
//!         EncoderEvent::Drain | EncoderEvent::End => {}
//!     }
//! }
//! # }
//! ```

mod command;
pub mod config;
pub mod converter;
mod diagnostics;
mod encoder;
pub mod error;
mod input;
pub mod invocation;
pub mod splitter;
mod supervisor;

pub use command::NoWindowExt;
pub use config::{ConfigError, EncoderConfig, ImageSize};
pub use converter::{ConverterProcess, ConverterSpawner, ProcessSpawner, detect_version};
pub use diagnostics::DiagnosticSink;
pub use encoder::{EncoderEvent, EncoderState, PngEncoder};
pub use error::{EncoderError, FramingError};
pub use invocation::Invocation;
pub use splitter::{FrameSplitter, PngSplitter, SplitterFactory, png_splitter_factory};
