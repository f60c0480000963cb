//! Framing stage: slices the converter's raw output into complete images.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::warn;

use crate::error::FramingError;

pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// Length, type and CRC fields around each chunk's data.
const CHUNK_HEADER_SIZE: usize = 8;
const CHUNK_CRC_SIZE: usize = 4;
const MAX_CHUNK_LENGTH: u32 = i32::MAX as u32;
const IEND: &[u8; 4] = b"IEND";

/// Turns an unbounded byte stream into an ordered sequence of complete images.
///
/// `split` is called every time new bytes arrive. It returns at most one image
/// per call and leaves any incomplete remainder in `buf`.
pub trait FrameSplitter: Send {
    fn split(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, FramingError>;
}

/// Creates a fresh splitter for every converter run.
pub type SplitterFactory = Arc<dyn Fn() -> Box<dyn FrameSplitter> + Send + Sync>;

pub fn png_splitter_factory() -> SplitterFactory {
    Arc::new(|| Box::new(PngSplitter::new()) as Box<dyn FrameSplitter>)
}

/// Splits a concatenated PNG sequence (`image2pipe` output) on `IEND` chunks.
///
/// Chunk CRCs are not checked.
#[derive(Debug, Default)]
pub struct PngSplitter {
    /// Offset of the next unread chunk header in the pending image, or 0 when
    /// the signature has not been checked yet.
    cursor: usize,
}

impl PngSplitter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameSplitter for PngSplitter {
    fn split(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, FramingError> {
        if self.cursor == 0 {
            if buf.len() < PNG_SIGNATURE.len() {
                return Ok(None);
            }
            if buf[..PNG_SIGNATURE.len()] != PNG_SIGNATURE {
                return Err(FramingError::InvalidSignature);
            }
            self.cursor = PNG_SIGNATURE.len();
        }

        loop {
            let Some(header) = buf.get(self.cursor..self.cursor + CHUNK_HEADER_SIZE) else {
                return Ok(None);
            };

            let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
            if length > MAX_CHUNK_LENGTH {
                return Err(FramingError::ChunkTooLarge(length));
            }
            let is_end = &header[4..8] == IEND;

            let chunk_end = self.cursor + CHUNK_HEADER_SIZE + length as usize + CHUNK_CRC_SIZE;
            if buf.len() < chunk_end {
                return Ok(None);
            }
            self.cursor = chunk_end;

            if is_end {
                self.cursor = 0;
                return Ok(Some(buf.split_to(chunk_end).freeze()));
            }
        }
    }
}

/// Drives a [`FrameSplitter`] from a `FramedRead`.
pub(crate) struct SplitterCodec {
    splitter: Box<dyn FrameSplitter>,
}

impl SplitterCodec {
    pub(crate) fn new(splitter: Box<dyn FrameSplitter>) -> Self {
        Self { splitter }
    }
}

impl Decoder for SplitterCodec {
    type Item = Bytes;
    type Error = FramingError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.splitter.split(src)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                // The exit status decides the outcome; a cut-off image is just dropped.
                if !buf.is_empty() {
                    warn!(
                        bytes = buf.len(),
                        "Discarding incomplete image at end of converter output"
                    );
                    buf.clear();
                }
                Ok(None)
            }
        }
    }
}
