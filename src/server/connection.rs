//! Client connection: buffered frame I/O over a TCP stream.

use std::net::SocketAddr;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{BrookError, Result};
use crate::protocol::{encode_frame, parse_request, Frame, ParseError, ParserLimits};

/// Default buffer size (4KB)
const DEFAULT_CONNECTION_BUFFER_SIZE: usize = 4 * 1024;

/// A connection to a client.
///
/// Reads accumulate into a buffer until a complete request frame (RESP
/// array or inline line) is available; writes can be batched so pipelined
/// commands are answered with a single syscall.
pub struct Connection {
    stream: TcpStream,

    /// Read buffer
    read_buf: BytesMut,

    /// Write buffer
    write_buf: BytesMut,

    /// Parser limits applied to incoming frames
    limits: ParserLimits,

    /// Remote peer address
    pub peer_addr: Option<SocketAddr>,
}

impl Connection {
    /// Create a new connection with default parser limits
    pub fn new(stream: TcpStream) -> Self {
        Self::with_limits(stream, ParserLimits::default())
    }

    /// Create a new connection with the given parser limits
    pub fn with_limits(stream: TcpStream, limits: ParserLimits) -> Self {
        let peer_addr = stream.peer_addr().ok();
        Self {
            stream,
            read_buf: BytesMut::with_capacity(DEFAULT_CONNECTION_BUFFER_SIZE),
            write_buf: BytesMut::with_capacity(DEFAULT_CONNECTION_BUFFER_SIZE),
            limits,
            peer_addr,
        }
    }

    /// Read one request frame from the connection.
    ///
    /// Returns `Ok(Some(frame))` when a frame was read, `Ok(None)` on a
    /// clean close, or `Err` on I/O failure or a framing violation. After
    /// a framing violation the read buffer is discarded so the connection
    /// can resync on the next request.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            match parse_request(&mut self.read_buf, &self.limits) {
                Ok(Some(frame)) => return Ok(Some(frame)),
                Ok(None) => {
                    // Need more data
                }
                Err(ParseError::Incomplete) => {
                    // Need more data
                }
                Err(e) => {
                    self.read_buf.clear();
                    return Err(BrookError::Protocol(e.to_string()));
                }
            }

            let n = self.stream.read_buf(&mut self.read_buf).await?;

            if n == 0 {
                // Connection closed
                if self.read_buf.is_empty() {
                    return Ok(None);
                } else {
                    return Err(BrookError::ConnectionClosed);
                }
            }
        }
    }

    /// Encode and write a frame immediately
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        encode_frame(frame, &mut self.write_buf);
        self.stream.write_all(&self.write_buf).await?;
        self.write_buf.clear();
        Ok(())
    }

    /// Buffer a frame for a later batched write
    #[inline]
    pub fn buffer_frame(&mut self, frame: &Frame) {
        encode_frame(frame, &mut self.write_buf);
    }

    /// Flush all buffered frames to the socket
    pub async fn flush_buffered(&mut self) -> Result<()> {
        if !self.write_buf.is_empty() {
            self.stream.write_all(&self.write_buf).await?;
            self.write_buf.clear();
        }
        Ok(())
    }

    /// Whether unprocessed request bytes are already buffered
    /// (pipelined commands waiting behind the current one)
    #[inline]
    pub fn has_pending_data(&self) -> bool {
        !self.read_buf.is_empty()
    }

    /// Try to parse another request from the buffer without reading from
    /// the socket. `Ok(None)` means the buffer holds no complete frame.
    pub fn try_parse_buffered(&mut self) -> Result<Option<Frame>> {
        match parse_request(&mut self.read_buf, &self.limits) {
            Ok(Some(frame)) => Ok(Some(frame)),
            Ok(None) | Err(ParseError::Incomplete) => Ok(None),
            Err(e) => {
                self.read_buf.clear();
                Err(BrookError::Protocol(e.to_string()))
            }
        }
    }
}
