//! Closable byte streams.
//!
//! A [`StreamBody`] is a blocking `Read` half fed by a background pump that
//! owns the actual source (an HTTP response or any reader). Closing the body
//! through its [`BodyHandle`] stops the pump and makes pending and future
//! reads return end-of-stream, which is how a blocked render thread gets
//! released on stop.

use std::io::{self, Read};
#[cfg(test)]
use std::thread;
use std::time::Duration;

use bytes::{Buf, Bytes};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Chunks buffered between the pump and the reader.
const BODY_CHUNKS: usize = 16;
/// Read size used when pumping from a plain reader.
#[cfg(test)]
const READ_CHUNK: usize = 16 * 1024;

type Chunk = io::Result<Bytes>;

pub struct StreamBody {
    reader: BodyReader,
    handle: BodyHandle,
}

/// Cheap clonable handle used to close a body from another thread.
#[derive(Debug, Clone)]
pub struct BodyHandle {
    token: CancellationToken,
}

impl BodyHandle {
    pub fn close(&self) {
        self.token.cancel();
    }

    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl StreamBody {
    /// Stream an HTTP response body, pumped by a task on `runtime`.
    ///
    /// A response that sends nothing for `stall_timeout` ends the body with
    /// an `io::ErrorKind::TimedOut` error. Waiting on a full buffer (a paused
    /// reader) does not count as a stall.
    pub fn from_response(response: reqwest::Response, runtime: &Handle, stall_timeout: Duration) -> Self {
        let (tx, rx) = mpsc::channel(BODY_CHUNKS);
        let token = CancellationToken::new();
        runtime.spawn(pump_response(response, tx, token.clone(), stall_timeout));
        Self::new(rx, token)
    }

    /// Stream any reader, pumped by a dedicated thread.
    ///
    /// A close takes effect between reads of `reader`; a read that blocks
    /// inside `reader` itself is not interrupted.
    #[cfg(test)]
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(BODY_CHUNKS);
        let token = CancellationToken::new();
        let pump_token = token.clone();
        thread::spawn(move || pump_reader(reader, tx, pump_token));
        Self::new(rx, token)
    }

    fn new(rx: Receiver<Chunk>, token: CancellationToken) -> Self {
        Self {
            reader: BodyReader {
                rx,
                pending: Bytes::new(),
                token: token.clone(),
            },
            handle: BodyHandle { token },
        }
    }

    #[cfg(test)]
    pub fn handle(&self) -> BodyHandle {
        self.handle.clone()
    }

    pub fn into_parts(self) -> (BodyReader, BodyHandle) {
        (self.reader, self.handle)
    }
}

/// Blocking read half of a [`StreamBody`].
///
/// Must not be read from inside an async context.
pub struct BodyReader {
    rx: Receiver<Chunk>,
    pending: Bytes,
    token: CancellationToken,
}

impl Read for BodyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.pending.is_empty() {
            if self.token.is_cancelled() {
                return Ok(0);
            }
            match self.rx.blocking_recv() {
                Some(Ok(bytes)) => self.pending = bytes,
                Some(Err(e)) => return Err(e),
                None => return Ok(0),
            }
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        Ok(n)
    }
}

impl Drop for BodyReader {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn pump_response(
    mut response: reqwest::Response,
    tx: Sender<Chunk>,
    token: CancellationToken,
    stall_timeout: Duration,
) {
    loop {
        let chunk = tokio::select! {
            _ = token.cancelled() => break,
            chunk = tokio::time::timeout(stall_timeout, response.chunk()) => chunk,
        };

        let item = match chunk {
            Ok(Ok(Some(bytes))) => Ok(bytes),
            Ok(Ok(None)) => break,
            Ok(Err(e)) => Err(io::Error::other(e)),
            Err(_) => {
                warn!(?stall_timeout, "stream stalled");
                Err(io::Error::new(io::ErrorKind::TimedOut, "stream stalled"))
            }
        };
        let failed = item.is_err();

        tokio::select! {
            _ = token.cancelled() => break,
            sent = tx.send(item) => {
                if sent.is_err() {
                    break;
                }
            }
        }
        if failed {
            break;
        }
    }
    debug!(closed = token.is_cancelled(), "response pump finished");
}

#[cfg(test)]
fn pump_reader<R: Read>(mut reader: R, tx: Sender<Chunk>, token: CancellationToken) {
    let mut buf = vec![0u8; READ_CHUNK];
    while !token.is_cancelled() {
        let item = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => Ok(Bytes::copy_from_slice(&buf[..n])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => Err(e),
        };
        let failed = item.is_err();
        if tx.blocking_send(item).is_err() || failed {
            break;
        }
    }
    debug!(closed = token.is_cancelled(), "reader pump finished");
}
