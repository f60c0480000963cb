//! Converter input channel with write-side backpressure.
//!
//! `write` never blocks: chunks are queued for a pump task that writes them to
//! the converter's stdin in order. The number of queued bytes is compared
//! against a high water mark to produce the backpressure signal, and a drain
//! notification is sent once the queue empties after backpressure was reported.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::debug;

use crate::converter::ConverterInput;
use crate::supervisor::Signal;

#[derive(Debug, Default)]
struct Pressure {
    queued: AtomicUsize,
    needs_drain: AtomicBool,
}

/// Write half of the converter's stdin.
#[derive(Debug)]
pub(crate) struct InputPipe {
    chunks: mpsc::UnboundedSender<Bytes>,
    pressure: Arc<Pressure>,
    high_water_mark: usize,
}

impl InputPipe {
    pub(crate) fn spawn(
        runtime: &Handle,
        stdin: ConverterInput,
        high_water_mark: usize,
        signals: mpsc::UnboundedSender<Signal>,
    ) -> Self {
        let (chunks, rx) = mpsc::unbounded_channel();
        let pressure = Arc::new(Pressure::default());

        runtime.spawn(pump(stdin, rx, pressure.clone(), signals));

        Self {
            chunks,
            pressure,
            high_water_mark,
        }
    }

    /// Queue `chunk` for the converter.
    ///
    /// Returns `false` when the caller should wait for a drain notification
    /// before writing more.
    pub(crate) fn write(&mut self, chunk: Bytes) -> bool {
        let len = chunk.len();
        let queued = self.pressure.queued.fetch_add(len, Ordering::AcqRel) + len;
        let below = queued < self.high_water_mark;
        if !below {
            // Set before the chunk is visible to the pump.
            self.pressure.needs_drain.store(true, Ordering::Release);
        }

        if self.chunks.send(chunk).is_err() {
            // The pump stopped after a write error; the exit status reports it.
            self.pressure.queued.fetch_sub(len, Ordering::AcqRel);
            return false;
        }

        below
    }

    /// Half-close stdin once every queued chunk has been written.
    pub(crate) fn end(self) {
        debug!(
            queued = self.pressure.queued.load(Ordering::Acquire),
            "Closing converter input"
        );
        // The pump shuts stdin down after the last queued chunk.
        drop(self.chunks);
    }
}

async fn pump(
    mut stdin: ConverterInput,
    mut chunks: mpsc::UnboundedReceiver<Bytes>,
    pressure: Arc<Pressure>,
    signals: mpsc::UnboundedSender<Signal>,
) {
    while let Some(chunk) = chunks.recv().await {
        let len = chunk.len();
        if let Err(e) = stdin.write_all(&chunk).await {
            // Usually EPIPE after the converter died.
            debug!(error = %e, "Converter input closed, dropping pending writes");
            return;
        }

        let left = pressure.queued.fetch_sub(len, Ordering::AcqRel) - len;
        if left == 0 && pressure.needs_drain.swap(false, Ordering::AcqRel) {
            let _ = signals.send(Signal::Drain);
        }
    }

    if let Err(e) = stdin.shutdown().await {
        debug!(error = %e, "Failed to shut down converter input");
    }
}
