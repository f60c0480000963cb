//! Stream adapter turning written video bytes into PNG frame events.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures::Stream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::EncoderConfig;
use crate::converter::{ConverterSpawner, ProcessSpawner};
use crate::diagnostics::DiagnosticSink;
use crate::error::EncoderError;
use crate::input::InputPipe;
use crate::invocation::Invocation;
use crate::splitter::{SplitterFactory, png_splitter_factory};
use crate::supervisor::{self, Signal, Termination, classify_exit};

/// Notifications produced by a [`PngEncoder`].
#[derive(Debug)]
pub enum EncoderEvent {
    /// Exactly one complete PNG image.
    Data(Bytes),
    /// Writing may resume after `write` returned `false`.
    Drain,
    /// The encoder failed; no further events follow.
    Error(EncoderError),
    /// The converter finished after `end`; no further events follow.
    End,
}

/// Lifecycle of an encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
    /// Nothing written yet, no converter exists.
    NotStarted,
    /// Converter running and accepting input.
    Active,
    /// Input closed, waiting for the converter to exit.
    Ending,
    /// The converter exited or failed.
    Terminated,
}

enum Lifecycle {
    NotStarted,
    Active(InputPipe),
    Ending,
    Terminated,
}

/// Converts a video byte stream into a stream of PNG images by piping it
/// through an external converter (`ffmpeg` by default).
///
/// The converter is spawned on the first [`write`](Self::write) and is never
/// restarted. Events are pulled with [`next_event`](Self::next_event) or by
/// using the encoder as a [`Stream`]; after `End` or `Error` the stream is
/// exhausted.
///
/// Spawning requires a Tokio runtime; the pipe tasks run on the runtime that
/// was current during the first `write`.
pub struct PngEncoder {
    config: EncoderConfig,
    spawner: Arc<dyn ConverterSpawner>,
    splitter: SplitterFactory,
    diagnostics: Option<DiagnosticSink>,
    lifecycle: Lifecycle,
    signals_tx: Option<mpsc::UnboundedSender<Signal>>,
    signals: mpsc::UnboundedReceiver<Signal>,
    /// Events classified before `end` changed the lifecycle.
    pending: VecDeque<EncoderEvent>,
    spawn_error: Option<EncoderError>,
}

impl PngEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        let (signals_tx, signals) = mpsc::unbounded_channel();
        Self {
            config,
            spawner: Arc::new(ProcessSpawner),
            splitter: png_splitter_factory(),
            diagnostics: None,
            lifecycle: Lifecycle::NotStarted,
            signals_tx: Some(signals_tx),
            signals,
            pending: VecDeque::new(),
            spawn_error: None,
        }
    }

    /// Replace the process spawner.
    pub fn with_spawner(mut self, spawner: Arc<dyn ConverterSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    /// Replace the framing stage.
    pub fn with_splitter(mut self, splitter: SplitterFactory) -> Self {
        self.splitter = splitter;
        self
    }

    /// Send the converter's stderr to `sink`.
    pub fn with_diagnostics(mut self, sink: DiagnosticSink) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn state(&self) -> EncoderState {
        match self.lifecycle {
            Lifecycle::NotStarted => EncoderState::NotStarted,
            Lifecycle::Active(_) => EncoderState::Active,
            Lifecycle::Ending => EncoderState::Ending,
            Lifecycle::Terminated => EncoderState::Terminated,
        }
    }

    /// Write a chunk of the source video.
    ///
    /// Returns the converter input's backpressure signal: `false` means the
    /// caller should wait for [`EncoderEvent::Drain`] before writing more.
    /// Chunks written after `end` or after the encoder failed are dropped and
    /// `false` is returned.
    pub fn write(&mut self, chunk: impl Into<Bytes>) -> bool {
        self.ensure_started();

        match &mut self.lifecycle {
            Lifecycle::Active(input) => input.write(chunk.into()),
            Lifecycle::Ending => {
                warn!("Write after end ignored");
                false
            }
            Lifecycle::NotStarted | Lifecycle::Terminated => false,
        }
    }

    /// Signal that no more input follows.
    ///
    /// Closes the converter's stdin once pending writes are flushed. `End` is
    /// emitted when the converter then exits cleanly. Does nothing if nothing
    /// was written yet. An exit that was already observed before this call is
    /// still classified as happening while active.
    pub fn end(&mut self) {
        if !matches!(self.lifecycle, Lifecycle::Active(_)) {
            return;
        }

        // Anything already delivered happened while the encoder was active.
        while let Ok(signal) = self.signals.try_recv() {
            let event = self.on_signal(signal);
            self.pending.push_back(event);
            if !matches!(self.lifecycle, Lifecycle::Active(_)) {
                return;
            }
        }

        match std::mem::replace(&mut self.lifecycle, Lifecycle::Ending) {
            Lifecycle::Active(input) => input.end(),
            other => self.lifecycle = other,
        }
    }

    /// Wait for the next event. Returns `None` once the encoder terminated.
    pub async fn next_event(&mut self) -> Option<EncoderEvent> {
        std::future::poll_fn(|cx| self.poll_event(cx)).await
    }

    pub fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<Option<EncoderEvent>> {
        if let Some(err) = self.spawn_error.take() {
            return Poll::Ready(Some(EncoderEvent::Error(err)));
        }
        if let Some(event) = self.pending.pop_front() {
            return Poll::Ready(Some(event));
        }

        if matches!(self.lifecycle, Lifecycle::Terminated) {
            return Poll::Ready(None);
        }

        let event = match ready!(self.signals.poll_recv(cx)) {
            Some(signal) => self.on_signal(signal),
            // Every sender is gone without an exit status being reported.
            None => self.terminate(Termination::Error(EncoderError::Io(std::io::Error::other(
                "converter supervision stopped unexpectedly",
            )))),
        };
        Poll::Ready(Some(event))
    }

    fn ensure_started(&mut self) {
        if !matches!(self.lifecycle, Lifecycle::NotStarted) {
            return;
        }
        let Some(signals) = self.signals_tx.take() else {
            return;
        };

        let invocation = Invocation::from_config(&self.config);
        debug!(
            program = %invocation.program,
            args = ?invocation.args,
            "Starting converter"
        );

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                self.fail_spawn(&invocation, std::io::Error::other(e));
                return;
            }
        };

        match self.spawner.spawn(&invocation) {
            Ok(process) => {
                let input = supervisor::launch(
                    &runtime,
                    process,
                    (self.splitter)(),
                    self.diagnostics.take(),
                    self.config.input_high_water_mark,
                    signals,
                );
                self.lifecycle = Lifecycle::Active(input);
            }
            Err(e) => self.fail_spawn(&invocation, e),
        }
    }

    fn fail_spawn(&mut self, invocation: &Invocation, source: std::io::Error) {
        warn!(program = %invocation.program, error = %source, "Failed to spawn converter");
        self.lifecycle = Lifecycle::Terminated;
        self.spawn_error = Some(EncoderError::spawn_failed(&invocation.program, source));
    }

    fn on_signal(&mut self, signal: Signal) -> EncoderEvent {
        match signal {
            Signal::Frame(image) => EncoderEvent::Data(image),
            Signal::Drain => EncoderEvent::Drain,
            Signal::Framing(e) => self.terminate(Termination::Error(e.into())),
            Signal::WaitFailed(e) => self.terminate(Termination::Error(EncoderError::Io(e))),
            Signal::Exit(code) => {
                let ending = matches!(self.lifecycle, Lifecycle::Ending);
                let termination = classify_exit(code, ending, &self.config.converter_path);
                self.terminate(termination)
            }
        }
    }

    fn terminate(&mut self, termination: Termination) -> EncoderEvent {
        self.lifecycle = Lifecycle::Terminated;
        match termination {
            Termination::End => {
                debug!("Converter finished");
                EncoderEvent::End
            }
            Termination::Error(e) => {
                warn!(error = %e, "Encoder failed");
                EncoderEvent::Error(e)
            }
        }
    }
}

impl Stream for PngEncoder {
    type Item = EncoderEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_event(cx)
    }
}

impl std::fmt::Debug for PngEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PngEncoder")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
