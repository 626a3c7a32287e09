//! Input sources for bundle images.
//!
//! The manifest and payloads can sit anywhere in the image, so sources are
//! read in full with [`read_fully`] before decoding starts.

mod http;
mod local;

pub use http::HttpRangeReader;
pub use local::LocalFileReader;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tracing::debug;

/// Bytes fetched per `read_at` call by [`read_fully`].
pub const READ_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Trait for random access reading from a data source
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;
}

/// Read the whole source into memory.
pub async fn read_fully<R: ReadAt + ?Sized>(reader: &R) -> Result<Vec<u8>> {
    let size = usize::try_from(reader.size())?;
    let mut image = vec![0u8; size];

    let mut filled = 0;
    while filled < size {
        let end = (filled + READ_CHUNK_SIZE).min(size);
        let n = reader.read_at(filled as u64, &mut image[filled..end]).await?;
        if n == 0 {
            bail!("Unexpected end of input after {} of {} bytes", filled, size);
        }
        filled += n;
    }

    debug!(bytes = size, "read bundle image");
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Serves at most `step` bytes per call to exercise the fill loop
    struct Trickle {
        data: Vec<u8>,
        step: usize,
    }

    #[async_trait]
    impl ReadAt for Trickle {
        async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
            let start = offset as usize;
            let n = buf.len().min(self.step).min(self.data.len() - start);
            buf[..n].copy_from_slice(&self.data[start..start + n]);
            Ok(n)
        }

        fn size(&self) -> u64 {
            self.data.len() as u64
        }
    }

    #[tokio::test]
    async fn reads_short_chunks_to_completion() {
        let data: Vec<u8> = (0..1000u32).map(|i| i as u8).collect();
        let reader = Trickle {
            data: data.clone(),
            step: 37,
        };
        assert_eq!(read_fully(&reader).await.unwrap(), data);
    }

    #[tokio::test]
    async fn empty_source_reads_empty() {
        let reader = Trickle {
            data: Vec::new(),
            step: 1,
        };
        assert!(read_fully(&reader).await.unwrap().is_empty());
    }
}
