//! Converter supervision: pipe wiring and exit classification.

use std::io;

use bytes::Bytes;
use futures::StreamExt;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tracing::{debug, warn};

use crate::converter::{ConverterOutput, ConverterProcess, ExitFuture};
use crate::diagnostics::{DiagnosticSink, forward_diagnostics};
use crate::error::{EXIT_CODE_NOT_FOUND, EncoderError, FramingError};
use crate::input::InputPipe;
use crate::splitter::{FrameSplitter, SplitterCodec};

/// Raw observations about the converter, in the order they happened.
#[derive(Debug)]
pub(crate) enum Signal {
    Frame(Bytes),
    Drain,
    Framing(FramingError),
    Exit(Option<i32>),
    WaitFailed(io::Error),
}

/// How a converter termination is reported to the caller.
#[derive(Debug)]
pub(crate) enum Termination {
    End,
    Error(EncoderError),
}

/// Classify a converter exit.
///
/// `ending` is whether the caller asked for the input to be closed.
pub(crate) fn classify_exit(code: Option<i32>, ending: bool, program: &str) -> Termination {
    match code {
        Some(0) if ending => Termination::End,
        Some(0) => Termination::Error(EncoderError::UnexpectedExit),
        Some(EXIT_CODE_NOT_FOUND) => Termination::Error(EncoderError::NotFoundExit {
            path: program.to_string(),
        }),
        code => Termination::Error(EncoderError::Failed { code }),
    }
}

/// Wire the pipes of a freshly spawned converter.
///
/// Returns the converter's input channel; everything observed on the other
/// pipes is reported through `signals`.
pub(crate) fn launch(
    runtime: &Handle,
    process: ConverterProcess,
    splitter: Box<dyn FrameSplitter>,
    diagnostics: Option<DiagnosticSink>,
    high_water_mark: usize,
    signals: mpsc::UnboundedSender<Signal>,
) -> InputPipe {
    let ConverterProcess {
        stdin,
        stdout,
        stderr,
        exit,
    } = process;

    runtime.spawn(forward_diagnostics(stderr, diagnostics));
    runtime.spawn(watch_output(stdout, exit, splitter, signals.clone()));

    InputPipe::spawn(runtime, stdin, high_water_mark, signals)
}

/// Forward every frame, then report the exit status once stdout is exhausted.
async fn watch_output(
    stdout: ConverterOutput,
    exit: ExitFuture,
    splitter: Box<dyn FrameSplitter>,
    signals: mpsc::UnboundedSender<Signal>,
) {
    let mut frames = FramedRead::new(stdout, SplitterCodec::new(splitter));
    let mut count = 0u64;

    while let Some(frame) = frames.next().await {
        match frame {
            Ok(image) => {
                count += 1;
                if signals.send(Signal::Frame(image)).is_err() {
                    debug!("Encoder dropped, no longer reading converter output");
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to split converter output");
                let _ = signals.send(Signal::Framing(e));
                // Keep the converter from blocking on a full stdout pipe.
                let mut stdout = frames.into_inner();
                if let Err(e) = tokio::io::copy(&mut stdout, &mut tokio::io::sink()).await {
                    debug!(error = %e, "Error draining converter output");
                }
                break;
            }
        }
    }

    debug!(frames = count, "Converter output finished");

    let signal = match exit.await {
        Ok(code) => {
            if code != Some(0) {
                warn!(?code, "Converter exited abnormally");
            }
            Signal::Exit(code)
        }
        Err(e) => Signal::WaitFailed(e),
    };
    let _ = signals.send(signal);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_end(t: &Termination) -> bool {
        matches!(t, Termination::End)
    }

    #[test]
    fn test_clean_exit_after_end() {
        assert!(is_end(&classify_exit(Some(0), true, "ffmpeg")));
    }

    #[test]
    fn test_clean_exit_without_end() {
        let t = classify_exit(Some(0), false, "ffmpeg");
        assert!(matches!(t, Termination::Error(EncoderError::UnexpectedExit)));
    }

    #[test]
    fn test_exit_127_in_both_states() {
        for ending in [false, true] {
            match classify_exit(Some(127), ending, "ffmpeg") {
                Termination::Error(e) => {
                    assert!(e.is_not_found());
                    assert!(e.to_string().contains("\"ffmpeg\""));
                }
                Termination::End => panic!("exit 127 must be an error"),
            }
        }
    }

    #[test]
    fn test_other_exit_codes() {
        for (code, ending) in [(Some(1), false), (Some(255), true), (None, true)] {
            match classify_exit(code, ending, "ffmpeg") {
                Termination::Error(EncoderError::Failed { code: got }) => assert_eq!(got, code),
                other => panic!("unexpected classification: {other:?}"),
            }
        }
    }
}
