//! # Pull-based byte sources
//!
//! Every output of this crate, whether a remultiplexed program stream, an
//! M2TS stream or an untouched transport stream, is a [`ByteSource`]: an
//! object that produces its output one chunk at a time when asked to, and
//! says so once it never will again.
//!
//! Sources read their own input through [`std::io::Read`], and any source
//! turns back into a reader with [`ByteSource::into_reader`], so filters can
//! be stacked on top of each other or on top of an encoder's output pipe.
//! [`FilterStream`] moves the blocking pull loop onto a tokio worker for
//! async network code.

use crate::error::Result;
use bytes::{Buf, Bytes};
use futures::Stream;
use std::io::{self, BufRead, Read};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A sequential source of output chunks.
pub trait ByteSource: Send {
    /// Produces the next chunk of output, or `None` once the source is
    /// exhausted. Chunks are never empty, and after the first `None` every
    /// further call returns `None` too.
    fn next_chunk(&mut self) -> Option<Bytes>;

    /// Wraps the source into a [`Read`] + [`BufRead`] adapter.
    fn into_reader(self) -> SourceReader<Self>
    where
        Self: Sized,
    {
        SourceReader::new(self)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn next_chunk(&mut self) -> Option<Bytes> {
        (**self).next_chunk()
    }
}

/// Exposes a [`ByteSource`] as a byte stream.
pub struct SourceReader<S> {
    source: S,
    chunk: Bytes,
    finished: bool,
}

impl<S: ByteSource> SourceReader<S> {
    /// Wraps `source`.
    pub fn new(source: S) -> Self {
        Self {
            source,
            chunk: Bytes::new(),
            finished: false,
        }
    }

    /// The wrapped source.
    pub fn get_ref(&self) -> &S {
        &self.source
    }

    /// Returns the source. Bytes of a partially consumed chunk are lost.
    pub fn into_inner(self) -> S {
        self.source
    }

    fn underflow(&mut self) -> bool {
        while self.chunk.is_empty() && !self.finished {
            match self.source.next_chunk() {
                Some(chunk) => self.chunk = chunk,
                None => self.finished = true,
            }
        }
        !self.chunk.is_empty()
    }
}

impl<S: ByteSource> Read for SourceReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || !self.underflow() {
            return Ok(0);
        }
        Ok(drain_chunk(&mut self.chunk, buf))
    }
}

impl<S: ByteSource> BufRead for SourceReader<S> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.underflow();
        Ok(&self.chunk[..])
    }

    fn consume(&mut self, amt: usize) {
        self.chunk.advance(amt.min(self.chunk.len()));
    }
}

/// Copies as much of `chunk` into `buf` as fits and advances past it.
pub(crate) fn drain_chunk(chunk: &mut Bytes, buf: &mut [u8]) -> usize {
    let n = buf.len().min(chunk.len());
    buf[..n].copy_from_slice(&chunk[..n]);
    chunk.advance(n);
    n
}

/// Default chunk size of [`Passthrough`]: 348 transport stream packets.
pub const PASSTHROUGH_CHUNK_SIZE: usize = 348 * 188;

/// Forwards its input unchanged, for outputs that need no filtering.
pub struct Passthrough<R: Read> {
    input: R,
    chunk_size: usize,
    finished: bool,
}

impl<R: Read> Passthrough<R> {
    /// Forwards `input` in [`PASSTHROUGH_CHUNK_SIZE`] chunks.
    pub fn new(input: R) -> Self {
        Self::with_chunk_size(input, PASSTHROUGH_CHUNK_SIZE)
    }

    /// Forwards `input` in chunks of at most `chunk_size` bytes.
    pub fn with_chunk_size(input: R, chunk_size: usize) -> Self {
        Self {
            input,
            chunk_size: chunk_size.max(1),
            finished: false,
        }
    }

    /// Returns the upstream input.
    pub fn into_inner(self) -> R {
        self.input
    }
}

impl<R: Read + Send> ByteSource for Passthrough<R> {
    fn next_chunk(&mut self) -> Option<Bytes> {
        if self.finished {
            return None;
        }

        let mut buf = vec![0u8; self.chunk_size];
        loop {
            match self.input.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    buf.truncate(n);
                    return Some(Bytes::from(buf));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::warn!("upstream read failed, ending stream: {}", e);
                    break;
                }
            }
        }

        self.finished = true;
        None
    }
}

/// Default number of chunks buffered between the worker and the consumer.
pub const DEFAULT_STREAM_CAPACITY: usize = 16;

/// Runs a [`ByteSource`] on a blocking tokio worker and hands its chunks to
/// async code.
///
/// Dropping the stream stops the worker after its current pull and drops
/// the source, which closes the upstream input. Nothing buffered is
/// flushed.
pub struct FilterStream {
    rx: mpsc::Receiver<Bytes>,
    worker: Option<JoinHandle<u64>>,
}

impl FilterStream {
    /// Starts pulling from `source`. Must be called from within a tokio
    /// runtime.
    pub fn spawn<S: ByteSource + 'static>(source: S, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));

        let worker = tokio::task::spawn_blocking(move || {
            let mut source = source;
            let mut total = 0u64;
            while let Some(chunk) = source.next_chunk() {
                total += chunk.len() as u64;
                if tx.blocking_send(chunk).is_err() {
                    log::debug!("stream consumer went away after {} bytes", total);
                    break;
                }
            }
            log::debug!("source finished after {} bytes", total);
            total
        });

        Self {
            rx,
            worker: Some(worker),
        }
    }

    /// Waits for the next chunk; `None` once the source is exhausted.
    pub async fn next_chunk(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Writes the whole stream to `writer` and returns the number of bytes
    /// written.
    pub async fn copy_to<W: AsyncWrite + Unpin>(mut self, writer: &mut W) -> Result<u64> {
        let mut written = 0u64;
        while let Some(chunk) = self.rx.recv().await {
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        writer.flush().await?;

        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                log::warn!("stream worker failed: {}", e);
            }
        }
        Ok(written)
    }
}

impl Stream for FilterStream {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        self.rx.poll_recv(cx)
    }
}
