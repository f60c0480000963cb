use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::debug;

/// Writes frames as `<prefix>_<index>.png`, numbered from 1.
pub struct FrameWriter {
    dir: PathBuf,
    prefix: String,
    written: u64,
    bytes: u64,
}

impl FrameWriter {
    pub async fn create(dir: &Path, prefix: &str) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        Ok(Self {
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
            written: 0,
            bytes: 0,
        })
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("{}_{:06}.png", self.prefix, index))
    }

    pub async fn write(&mut self, image: Bytes) -> std::io::Result<PathBuf> {
        let path = self.frame_path(self.written + 1);
        tokio::fs::write(&path, &image).await?;

        self.written += 1;
        self.bytes += image.len() as u64;
        debug!(path = %path.display(), size = image.len(), "Wrote frame");
        Ok(path)
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn total_bytes(&self) -> u64 {
        self.bytes
    }
}
