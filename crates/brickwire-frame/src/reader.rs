use std::io::ErrorKind;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::codec::{decode_packet, Packet, MAX_PACKET_SIZE};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 4 * MAX_PACKET_SIZE;
const READ_CHUNK_SIZE: usize = MAX_PACKET_SIZE;

/// Reads complete packets from any `AsyncRead` stream.
///
/// Partial reads are handled internally; callers always get complete packets.
/// Bytes already received stay buffered across calls, so `read_packet` is
/// cancel safe and may be raced against timeouts or shutdown signals.
pub struct PacketReader<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: AsyncRead + Unpin> PacketReader<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Read the next complete packet.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached. An
    /// `InvalidPacketSize` error leaves the reader usable.
    pub async fn read_packet(&mut self) -> Result<Packet> {
        loop {
            if let Some(packet) = decode_packet(&mut self.buf)? {
                return Ok(packet);
            }

            self.buf.reserve(READ_CHUNK_SIZE);
            let read = match self.inner.read_buf(&mut self.buf).await {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }
        }
    }

    /// Like [`read_packet`](Self::read_packet), but returns `Ok(None)` if no
    /// complete packet arrives within `timeout`.
    pub async fn read_packet_timeout(&mut self, timeout: Duration) -> Result<Option<Packet>> {
        match tokio::time::timeout(timeout, self.read_packet()).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Number of bytes received but not yet decoded.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
