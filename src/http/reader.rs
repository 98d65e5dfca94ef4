//! Replay-capable reading over a socket half.
//!
//! Every chunk read from the socket is appended to an internal buffer. The
//! parsers in [`crate::http::parse`] look at that buffer without consuming it,
//! and once the caller knows what the bytes are it takes them back out with
//! [`ReplayReader::replay`]: the same bytes that were parsed as HTTP are the
//! ones forwarded to the peer, byte for byte.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

pub struct ReplayReader<R> {
    inner: R,
    buffer: BytesMut,
    chunk: usize,
}

impl<R: AsyncRead + Unpin> ReplayReader<R> {
    /// Wrap `inner`, reading at most `chunk` bytes per call to [`fill`](Self::fill).
    pub fn new(inner: R, chunk: usize) -> Self {
        Self {
            inner,
            buffer: BytesMut::with_capacity(chunk),
            chunk: chunk.max(1),
        }
    }

    /// Read the next chunk from the socket into the buffer.
    ///
    /// Returns the number of new bytes, `0` at end of stream. Cancel safe.
    pub async fn fill(&mut self) -> std::io::Result<usize> {
        let mut chunk = (&mut self.inner).take(self.chunk as u64);
        self.buffer.reserve(self.chunk);
        chunk.read_buf(&mut self.buffer).await
    }

    /// Bytes read but not yet replayed.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Take the first `n` buffered bytes, exactly as they were read.
    pub fn replay(&mut self, n: usize) -> Bytes {
        let n = n.min(self.buffer.len());
        self.buffer.split_to(n).freeze()
    }

    /// Take everything buffered.
    pub fn replay_all(&mut self) -> Bytes {
        self.buffer.split().freeze()
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }
}
