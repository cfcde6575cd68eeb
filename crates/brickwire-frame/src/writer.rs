use std::io::ErrorKind;

use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::codec::{encode_packet, Header, SequenceNumber, MAX_PACKET_SIZE};
use crate::error::{FrameError, Result};

/// Writes complete packets to any `AsyncWrite` stream.
///
/// Each packet is encoded into one buffer and written with a single
/// `write_all`, so header and payload are never interleaved with another
/// packet as long as a single task owns the writer.
pub struct PacketWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: AsyncWrite + Unpin> PacketWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(MAX_PACKET_SIZE),
        }
    }

    /// Write a complete packet and flush.
    pub async fn write_packet(&mut self, header: &Header, payload: &[u8]) -> Result<()> {
        self.buf.clear();
        encode_packet(header, payload, &mut self.buf)?;

        trace!(
            uid = header.uid,
            function_id = header.function_id.raw(),
            len = self.buf.len(),
            "writing packet"
        );
        self.inner.write_all(&self.buf).await.map_err(write_error)?;
        self.inner.flush().await.map_err(write_error)
    }

    /// Encode and send a request packet.
    pub async fn send(
        &mut self,
        uid: u32,
        function_id: u8,
        sequence_number: Option<SequenceNumber>,
        response_expected: bool,
        payload: &[u8],
    ) -> Result<()> {
        let header = Header::request(
            uid,
            function_id,
            sequence_number,
            response_expected,
            payload.len(),
        )?;
        self.write_packet(&header, payload).await
    }

    /// Flush and close the write direction of the stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        match self.inner.shutdown().await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(FrameError::Io(err)),
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

fn write_error(err: std::io::Error) -> FrameError {
    match err.kind() {
        ErrorKind::WriteZero => FrameError::ConnectionClosed,
        _ => FrameError::Io(err),
    }
}
