use std::time::Instant;

use bytes::BytesMut;
use clap::Parser;
use framepipe::{DiagnosticSink, EncoderEvent, PngEncoder, detect_version};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, error, info, warn};

mod args;
mod error;
mod logging;
mod output;

use args::Args;
use error::AppError;
use output::FrameWriter;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const READ_CHUNK_SIZE: usize = 64 * 1024;

/// What woke the main loop up.
enum Step {
    Event(Option<EncoderEvent>),
    Read(std::io::Result<usize>),
    Interrupted,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let _guard = match logging::init_logging(args.verbose, args.log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(args).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), AppError> {
    let config = args.encoder_config()?;

    let version = detect_version(&config.converter_path).await;
    match &version {
        Some(version) => info!("Using converter: {version}"),
        None => warn!(
            "Could not determine version of converter {:?}",
            config.converter_path
        ),
    }
    if args.check {
        return match version {
            Some(_) => Ok(()),
            None => Err(AppError::ConverterUnavailable(config.converter_path)),
        };
    }

    let input: Box<dyn AsyncRead + Unpin + Send> = if args.reads_stdin() {
        Box::new(tokio::io::stdin())
    } else {
        Box::new(tokio::fs::File::open(&args.input).await?)
    };

    let diagnostics = match &args.converter_log {
        Some(path) => DiagnosticSink::writer(tokio::fs::File::create(path).await?),
        None => DiagnosticSink::Tracing,
    };

    let mut writer = FrameWriter::create(&args.output_dir, &args.prefix).await?;
    let encoder = PngEncoder::new(config).with_diagnostics(diagnostics);

    let started = Instant::now();
    extract(encoder, input, &mut writer).await?;

    info!(
        frames = writer.written(),
        bytes = writer.total_bytes(),
        elapsed = ?started.elapsed(),
        "Wrote {} frames to {}",
        writer.written(),
        args.output_dir.display()
    );
    Ok(())
}

/// Feed `input` through the encoder, honouring backpressure, and write every
/// frame until the converter finishes.
async fn extract(
    mut encoder: PngEncoder,
    mut input: Box<dyn AsyncRead + Unpin + Send>,
    writer: &mut FrameWriter,
) -> Result<(), AppError> {
    let mut buf = BytesMut::with_capacity(READ_CHUNK_SIZE);
    let mut input_done = false;
    let mut paused = false;
    let mut written_any = false;

    loop {
        let step = tokio::select! {
            event = encoder.next_event() => Step::Event(event),
            read = input.read_buf(&mut buf), if !input_done && !paused => Step::Read(read),
            _ = tokio::signal::ctrl_c(), if !input_done => Step::Interrupted,
        };

        match step {
            Step::Event(Some(EncoderEvent::Data(image))) => {
                writer.write(image).await?;
            }
            Step::Event(Some(EncoderEvent::Drain)) => paused = false,
            Step::Event(Some(EncoderEvent::Error(e))) => return Err(e.into()),
            Step::Event(Some(EncoderEvent::End)) | Step::Event(None) => return Ok(()),
            Step::Read(Ok(0)) => {
                debug!("Input exhausted");
                input_done = true;
                encoder.end();
                if !written_any {
                    warn!("Input was empty, nothing to convert");
                    return Ok(());
                }
            }
            Step::Read(Ok(_)) => {
                written_any = true;
                paused = !encoder.write(buf.split().freeze());
                if buf.capacity() < READ_CHUNK_SIZE {
                    buf.reserve(READ_CHUNK_SIZE);
                }
            }
            Step::Read(Err(e)) => return Err(e.into()),
            Step::Interrupted => {
                info!("Interrupted, waiting for the converter to finish");
                input_done = true;
                encoder.end();
                if !written_any {
                    return Ok(());
                }
            }
        }
    }
}
