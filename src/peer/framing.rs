use super::error::PeerError;
use super::message::{Handshake, HANDSHAKE_LEN};
use crate::constants::{MAX_FRAME_LEN, READ_BUFFER_SIZE};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Buffered reader for length-prefixed frames.
///
/// A frame is a big-endian `u32` length followed by that many payload
/// bytes. Length zero is a keep-alive. Frames above [`MAX_FRAME_LEN`] are a
/// fatal protocol error.
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_BUFFER_SIZE),
        }
    }

    /// Reads one frame and returns its payload, which may be empty.
    pub async fn read_frame(&mut self) -> Result<Bytes, PeerError> {
        self.fill_to(4).await?;
        let len =
            u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]) as usize;

        if len > MAX_FRAME_LEN {
            return Err(PeerError::FrameTooLarge(len as u32));
        }

        self.fill_to(4 + len).await?;
        self.buf.advance(4);
        Ok(self.buf.split_to(len).freeze())
    }

    async fn fill_to(&mut self, target: usize) -> Result<(), PeerError> {
        while self.buf.len() < target {
            let n = self.inner.read_buf(&mut self.buf).await?;
            if n == 0 {
                return Err(PeerError::ConnectionClosed);
            }
        }
        Ok(())
    }
}

/// Writer emitting whole frames.
///
/// Header and payload are assembled into one buffer and written with
/// write-all semantics, so a frame is never interleaved with another.
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub async fn write_frame(&mut self, payload: &[u8]) -> Result<(), PeerError> {
        let mut frame = BytesMut::with_capacity(4 + payload.len());
        frame.put_u32(payload.len() as u32);
        frame.put_slice(payload);
        self.inner.write_all(&frame).await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), PeerError> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

/// Writes our handshake frame to the stream.
pub async fn send_handshake<S>(stream: &mut S, handshake: &Handshake) -> Result<(), PeerError>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(&handshake.encode()).await?;
    Ok(())
}

/// Reads exactly one handshake frame from the stream.
pub async fn read_handshake<S>(stream: &mut S) -> Result<Handshake, PeerError>
where
    S: AsyncRead + Unpin,
{
    let mut frame = [0u8; HANDSHAKE_LEN];
    stream.read_exact(&mut frame).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            PeerError::ConnectionClosed
        } else {
            PeerError::Io(e)
        }
    })?;
    Handshake::decode(&frame)
}
