// Output assembler: appends resolved segments to the destination in index order.

use std::path::Path;

use bytes::Bytes;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::error::DownloadError;

pub struct OutputAssembler<W> {
    writer: W,
    last_index: Option<usize>,
    segments_written: usize,
    bytes_written: u64,
}

impl OutputAssembler<File> {
    /// Opens `path` for appending, creating it if needed. Any decision about an
    /// existing file must already have been made by the caller.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, DownloadError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        info!(path = %path.display(), "Saving stream");
        Ok(Self::new(file))
    }
}

impl<W: AsyncWrite + Unpin> OutputAssembler<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            last_index: None,
            segments_written: 0,
            bytes_written: 0,
        }
    }

    /// Appends the payload of segment `index`. Indices must strictly increase.
    pub async fn append(&mut self, index: usize, data: &Bytes) -> Result<(), DownloadError> {
        if let Some(last) = self.last_index {
            if index <= last {
                return Err(DownloadError::OutOfOrder { index, last });
            }
        }

        self.writer.write_all(data).await?;
        self.last_index = Some(index);
        self.segments_written += 1;
        self.bytes_written += data.len() as u64;
        debug!(index, len = data.len(), "Segment appended");
        Ok(())
    }

    /// Appends a resolved batch, already sorted by index, and flushes it.
    pub async fn append_batch(&mut self, segments: &[(usize, Bytes)]) -> Result<(), DownloadError> {
        for (index, data) in segments {
            self.append(*index, data).await?;
        }
        self.writer.flush().await?;
        Ok(())
    }

    pub fn segments_written(&self) -> usize {
        self.segments_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub async fn finish(mut self) -> Result<W, DownloadError> {
        self.writer.flush().await?;
        Ok(self.writer)
    }
}
