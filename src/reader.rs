// WHY: The rolling window needs text in fixed-size blocks that never split a UTF-8 character;
// async buffered reads and a memory map both feed it the same way

use anyhow::{bail, Context, Result};
use memmap2::{Mmap, MmapOptions};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tracing::{debug, info};

/// Configuration for file reading behavior
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Target chunk size in bytes; chunks end on a character boundary, so they may be up to three
    /// bytes shorter
    pub block_size: usize,
    /// Buffer size for async reading (default: 8KB)
    pub buffer_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            block_size: crate::config::DEFAULT_BLOCK_SIZE,
            buffer_size: 8192, // WHY: 8KB is optimal for most filesystems and network storage
        }
    }
}

/// Async reader handing out UTF-8 chunks of roughly `block_size` bytes
pub struct ChunkReader<R> {
    inner: R,
    block_size: usize,
    pending: Vec<u8>,
    /// Bytes handed out so far
    offset: u64,
    eof: bool,
}

impl ChunkReader<BufReader<File>> {
    pub async fn open(path: &Path, config: &ReaderConfig) -> Result<Self> {
        let file = File::open(path)
            .await
            .with_context(|| format!("Failed to open file {}", path.display()))?;
        debug!("Opened {} for chunked reading", path.display());
        Ok(Self::new(
            BufReader::with_capacity(config.buffer_size, file),
            config.block_size,
        ))
    }
}

impl<R: AsyncRead + Unpin> ChunkReader<R> {
    pub fn new(inner: R, block_size: usize) -> Self {
        // a chunk must be able to hold one complete character
        let block_size = block_size.max(4);
        Self {
            inner,
            block_size,
            pending: Vec::with_capacity(block_size),
            offset: 0,
            eof: false,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.offset
    }

    /// Next chunk, or `None` at end of input; invalid UTF-8 is an error
    pub async fn next_chunk(&mut self) -> Result<Option<String>> {
        while !self.eof && self.pending.len() < self.block_size {
            let filled = self.pending.len();
            self.pending.resize(self.block_size, 0);
            let read = self.inner.read(&mut self.pending[filled..]).await;
            let n = match read {
                Ok(n) => n,
                Err(e) => {
                    self.pending.truncate(filled);
                    return Err(e).context(format!("Read failed at byte {}", self.offset));
                }
            };
            self.pending.truncate(filled + n);
            self.eof = n == 0;
        }
        if self.pending.is_empty() {
            return Ok(None);
        }

        let valid = match std::str::from_utf8(&self.pending) {
            Ok(text) => text.len(),
            // the last character continues in the next read
            Err(e) if e.error_len().is_none() && !self.eof => e.valid_up_to(),
            Err(e) => bail!(
                "UTF-8 decoding error at byte {}",
                self.offset + e.valid_up_to() as u64
            ),
        };
        let rest = self.pending.split_off(valid);
        let chunk = String::from_utf8(std::mem::replace(&mut self.pending, rest))?;
        self.offset += chunk.len() as u64;
        Ok(Some(chunk))
    }
}

/// Memory-map a file for reading
pub fn map_file(path: &Path) -> Result<Mmap> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open file {}", path.display()))?;
    // SAFETY: the map is read-only and only lives for the duration of one run over the file
    let mmap = unsafe { MmapOptions::new().map(&file) }
        .with_context(|| format!("Failed to map file {}", path.display()))?;
    info!("Mapped {} ({} bytes)", path.display(), mmap.len());
    Ok(mmap)
}

/// Split `text` into chunks of at most `block_size` bytes on character boundaries
pub fn split_chunks(text: &str, block_size: usize) -> impl Iterator<Item = &str> {
    let block_size = block_size.max(4);
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let mut end = block_size.min(rest.len());
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        let (chunk, tail) = rest.split_at(end);
        rest = tail;
        Some(chunk)
    })
}

/// Read a whole file as text
pub async fn read_text_async(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {} as UTF-8 text", path.display()))
}
