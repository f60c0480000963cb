#![allow(dead_code)]

use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::oneshot;

use framepipe::{
    ConverterProcess, ConverterSpawner, EncoderConfig, EncoderEvent, FrameSplitter, FramingError,
    Invocation, PngEncoder, SplitterFactory,
};

const PIPE_CAPACITY: usize = 64 * 1024;
const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// Minimal PNG made of the signature, a tEXt chunk carrying `tag`, and IEND.
pub fn png(tag: &[u8]) -> Vec<u8> {
    let mut out = PNG_SIGNATURE.to_vec();
    for (kind, data) in [(b"tEXt", tag), (b"IEND", &[][..])] {
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(kind);
        out.extend_from_slice(data);
        out.extend_from_slice(&[0, 0, 0, 0]);
    }
    out
}

/// Test side of a fake converter's pipes.
pub struct FakeConverter {
    pub stdin: DuplexStream,
    pub stdout: Option<DuplexStream>,
    pub stderr: Option<DuplexStream>,
    exit: Option<oneshot::Sender<io::Result<Option<i32>>>>,
}

impl FakeConverter {
    /// Write raw bytes to the converter's stdout.
    pub async fn emit(&mut self, bytes: &[u8]) {
        let stdout = self.stdout.as_mut().expect("stdout already closed");
        stdout.write_all(bytes).await.unwrap();
    }

    pub async fn emit_stderr(&mut self, bytes: &[u8]) {
        let stderr = self.stderr.as_mut().expect("stderr already closed");
        stderr.write_all(bytes).await.unwrap();
    }

    /// Close stdout and stderr, then report `code` as the exit status.
    pub fn exit(&mut self, code: Option<i32>) {
        self.stdout.take();
        self.stderr.take();
        if let Some(exit) = self.exit.take() {
            let _ = exit.send(Ok(code));
        }
    }
}

/// Records invocations and hands out fake converters.
#[derive(Default)]
pub struct FakeSpawner {
    invocations: Mutex<Vec<Invocation>>,
    converter: Mutex<Option<FakeConverter>>,
    fail_with: Option<io::ErrorKind>,
}

impl FakeSpawner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(kind: io::ErrorKind) -> Arc<Self> {
        Arc::new(Self {
            fail_with: Some(kind),
            ..Self::default()
        })
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().clone()
    }

    pub fn spawn_count(&self) -> usize {
        self.invocations.lock().len()
    }

    pub fn take_converter(&self) -> FakeConverter {
        self.converter.lock().take().expect("converter was not spawned")
    }
}

impl ConverterSpawner for FakeSpawner {
    fn spawn(&self, invocation: &Invocation) -> io::Result<ConverterProcess> {
        self.invocations.lock().push(invocation.clone());
        if let Some(kind) = self.fail_with {
            return Err(io::Error::from(kind));
        }

        let (stdin, stdin_test) = tokio::io::duplex(PIPE_CAPACITY);
        let (stdout_test, stdout) = tokio::io::duplex(PIPE_CAPACITY);
        let (stderr_test, stderr) = tokio::io::duplex(PIPE_CAPACITY);
        let (exit_tx, exit_rx) = oneshot::channel();

        *self.converter.lock() = Some(FakeConverter {
            stdin: stdin_test,
            stdout: Some(stdout_test),
            stderr: Some(stderr_test),
            exit: Some(exit_tx),
        });

        let exit = async move {
            match exit_rx.await {
                Ok(status) => status,
                Err(_) => Err(io::Error::other("fake converter dropped")),
            }
        }
        .boxed();

        Ok(ConverterProcess {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            exit,
        })
    }
}

/// Splits on `\n`, keeping the delimiter out of the frame.
pub struct LineSplitter;

impl FrameSplitter for LineSplitter {
    fn split(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, FramingError> {
        let Some(idx) = buf.iter().position(|&b| b == b'\n') else {
            return Ok(None);
        };
        let line = buf.split_to(idx).freeze();
        let _ = buf.split_to(1);
        Ok(Some(line))
    }
}

pub fn line_splitter_factory() -> SplitterFactory {
    Arc::new(|| Box::new(LineSplitter) as Box<dyn FrameSplitter>)
}

pub fn encoder_with(spawner: &Arc<FakeSpawner>, config: EncoderConfig) -> PngEncoder {
    PngEncoder::new(config).with_spawner(spawner.clone())
}

pub async fn next(encoder: &mut PngEncoder) -> Option<EncoderEvent> {
    tokio::time::timeout(EVENT_TIMEOUT, encoder.next_event())
        .await
        .expect("timed out waiting for an encoder event")
}

/// Assert that no event arrives within a short window.
pub async fn assert_quiet(encoder: &mut PngEncoder) {
    let result = tokio::time::timeout(Duration::from_millis(50), encoder.next_event()).await;
    assert!(result.is_err(), "unexpected event: {:?}", result.ok());
}

pub fn expect_error(event: Option<EncoderEvent>) -> framepipe::EncoderError {
    match event {
        Some(EncoderEvent::Error(e)) => e,
        other => panic!("expected an error event, got {other:?}"),
    }
}
