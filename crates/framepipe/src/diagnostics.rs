//! Where the converter's stderr goes.

use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{AnyDelimiterCodec, FramedRead};
use tracing::debug;

use crate::converter::ConverterOutput;

/// ffmpeg rewrites its progress line with `\r`, everything else ends in `\n`.
const RECORD_DELIMITERS: &[u8] = b"\r\n";

/// Destination for the converter's diagnostic output.
pub enum DiagnosticSink {
    /// Copy stderr verbatim into a writer.
    Writer(Box<dyn AsyncWrite + Send + Unpin>),
    /// Log each stderr record at debug level under `framepipe::converter`.
    Tracing,
}

impl DiagnosticSink {
    pub fn writer<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::Writer(Box::new(writer))
    }
}

impl std::fmt::Debug for DiagnosticSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Writer(_) => f.write_str("DiagnosticSink::Writer"),
            Self::Tracing => f.write_str("DiagnosticSink::Tracing"),
        }
    }
}

/// Consume the converter's stderr until it closes.
///
/// Without a sink the output is read and dropped, so the converter never
/// blocks on a full pipe.
pub(crate) async fn forward_diagnostics(
    mut stderr: ConverterOutput,
    sink: Option<DiagnosticSink>,
) {
    match sink {
        Some(DiagnosticSink::Writer(mut writer)) => {
            if let Err(e) = tokio::io::copy(&mut stderr, &mut writer).await {
                debug!(error = %e, "Stopped forwarding converter diagnostics");
                return;
            }
            if let Err(e) = writer.shutdown().await {
                debug!(error = %e, "Failed to close diagnostic sink");
            }
        }
        Some(DiagnosticSink::Tracing) => {
            let codec = AnyDelimiterCodec::new(RECORD_DELIMITERS.to_vec(), Vec::new());
            let mut records = FramedRead::new(stderr, codec);
            while let Some(record) = records.next().await {
                let record = match record {
                    Ok(record) => record,
                    Err(e) => {
                        debug!(error = %e, "Error reading converter diagnostics");
                        break;
                    }
                };
                let record = String::from_utf8_lossy(&record);
                let record = record.trim();
                if !record.is_empty() {
                    debug!(target: "framepipe::converter", "{record}");
                }
            }
        }
        None => {
            let _ = tokio::io::copy(&mut stderr, &mut tokio::io::sink()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tokio::io::AsyncReadExt;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_tracing_sink_logs_each_record() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (mut converter_stderr, stderr) = tokio::io::duplex(1024);
        converter_stderr
            .write_all(b"frame=    1\r\r\n  Input #0  \ndone")
            .await
            .unwrap();
        drop(converter_stderr);

        forward_diagnostics(Box::new(stderr), Some(DiagnosticSink::Tracing)).await;

        let logged = String::from_utf8(captured.0.lock().clone()).unwrap();
        assert_eq!(logged.matches("framepipe::converter").count(), 3, "{logged}");
        assert!(logged.contains("frame=    1"));
        assert!(logged.contains("Input #0"));
        assert!(logged.contains("done"));
    }

    #[tokio::test]
    async fn test_writer_sink_receives_stderr_verbatim() {
        let (mut converter_stderr, stderr) = tokio::io::duplex(64);
        let (sink, mut sink_reader) = tokio::io::duplex(64);

        let task = tokio::spawn(forward_diagnostics(
            Box::new(stderr),
            Some(DiagnosticSink::writer(sink)),
        ));

        converter_stderr.write_all(b"frame=  1\rdone\n").await.unwrap();
        drop(converter_stderr);

        let mut forwarded = Vec::new();
        sink_reader.read_to_end(&mut forwarded).await.unwrap();
        assert_eq!(forwarded, b"frame=  1\rdone\n");
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_without_sink_output_is_drained() {
        let (mut converter_stderr, stderr) = tokio::io::duplex(8);
        let task = tokio::spawn(forward_diagnostics(Box::new(stderr), None));

        // Larger than the pipe capacity: only completes if someone reads.
        converter_stderr.write_all(&[b'x'; 256]).await.unwrap();
        drop(converter_stderr);
        task.await.unwrap();
    }
}
