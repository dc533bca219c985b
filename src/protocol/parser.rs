//! RESP request parser
//!
//! Implements an incremental parser for RESP frames plus the plaintext inline
//! form. Frames are validated with a cursor pass before any allocation, so a
//! partial frame leaves the buffer untouched and a malicious frame is
//! rejected against [`ParserLimits`] before memory is committed.

use std::io::Cursor;

use bytes::{Buf, BytesMut};

use super::Frame;

/// Protocol parser limits to prevent DoS via oversized frames.
#[derive(Debug, Clone)]
pub struct ParserLimits {
    /// Maximum bulk string size in bytes (default: 512MB)
    pub max_bulk_string_size: usize,
    /// Maximum number of elements in an array (default: 1,048,576)
    pub max_array_elements: usize,
    /// Maximum nesting depth for arrays (default: 64)
    pub max_nesting_depth: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_bulk_string_size: 512 * 1024 * 1024,
            max_array_elements: 1_048_576,
            max_nesting_depth: 64,
        }
    }
}

/// Parse error types
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Not enough data to parse a complete frame
    Incomplete,

    /// Invalid protocol format
    Invalid(String),

    /// Invalid UTF-8 in string data
    InvalidUtf8,

    /// Frame exceeds configured size limits
    FrameTooLarge(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Incomplete => write!(f, "incomplete data"),
            ParseError::Invalid(msg) => write!(f, "invalid protocol: {}", msg),
            ParseError::InvalidUtf8 => write!(f, "invalid UTF-8"),
            ParseError::FrameTooLarge(msg) => write!(f, "frame too large: {}", msg),
        }
    }
}

impl std::error::Error for ParseError {}

#[cold]
#[inline(never)]
fn invalid_byte_error(byte: u8) -> ParseError {
    ParseError::Invalid(format!("unexpected byte: {:02x}", byte))
}

#[cold]
#[inline(never)]
fn invalid_integer_error(s: &str) -> ParseError {
    ParseError::Invalid(format!("invalid integer: {}", s))
}

#[cold]
#[inline(never)]
fn expected_crlf_error() -> ParseError {
    ParseError::Invalid("expected CRLF".to_string())
}

#[cold]
#[inline(never)]
fn bulk_string_too_large_error(size: usize, max: usize) -> ParseError {
    ParseError::FrameTooLarge(format!("bulk string size {} exceeds limit {}", size, max))
}

#[cold]
#[inline(never)]
fn array_too_large_error(count: usize, max: usize) -> ParseError {
    ParseError::FrameTooLarge(format!("array element count {} exceeds limit {}", count, max))
}

#[cold]
#[inline(never)]
fn nesting_too_deep_error(depth: usize, max: usize) -> ParseError {
    ParseError::FrameTooLarge(format!("nesting depth {} exceeds limit {}", depth, max))
}

/// Parse a RESP frame from the buffer with default limits.
///
/// Returns `Ok(Some(frame))` if a complete frame was parsed,
/// `Ok(None)` if more data is needed, or `Err` if the data is invalid.
pub fn parse_frame(buf: &mut BytesMut) -> Result<Option<Frame>, ParseError> {
    parse_frame_with_limits(buf, &ParserLimits::default())
}

/// Parse a RESP frame from the buffer with configurable limits.
pub fn parse_frame_with_limits(
    buf: &mut BytesMut,
    limits: &ParserLimits,
) -> Result<Option<Frame>, ParseError> {
    if buf.is_empty() {
        return Ok(None);
    }

    // Peek with a cursor; only advance the buffer once a full frame checks out
    let mut cursor = Cursor::new(&buf[..]);

    match check_frame(&mut cursor, limits, 0) {
        Ok(len) => {
            cursor.set_position(0);
            let frame = parse_frame_internal(&mut cursor, limits, 0)?;
            buf.advance(len);
            Ok(Some(frame))
        }
        Err(ParseError::Incomplete) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Parse one client request: a RESP array when the first byte is `*`,
/// an inline command (whitespace-split tokens up to CRLF) otherwise.
///
/// Inline commands come back as the same array-of-bulk shape the RESP form
/// produces, so command parsing downstream sees a single representation.
pub fn parse_request(
    buf: &mut BytesMut,
    limits: &ParserLimits,
) -> Result<Option<Frame>, ParseError> {
    if buf.is_empty() {
        return Ok(None);
    }

    if buf[0] == b'*' {
        parse_frame_with_limits(buf, limits)
    } else {
        parse_inline(buf, limits)
    }
}

/// Parse an inline command line into an array of bulk strings.
fn parse_inline(buf: &mut BytesMut, limits: &ParserLimits) -> Result<Option<Frame>, ParseError> {
    let Some(line_end) = find_crlf(&buf[..]) else {
        if buf.len() > limits.max_bulk_string_size {
            return Err(bulk_string_too_large_error(
                buf.len(),
                limits.max_bulk_string_size,
            ));
        }
        return Ok(None);
    };

    let line = &buf[..line_end];
    let text = std::str::from_utf8(line).map_err(|_| ParseError::InvalidUtf8)?;

    let tokens: Vec<Frame> = text
        .split_ascii_whitespace()
        .map(|tok| Frame::bulk(bytes::Bytes::copy_from_slice(tok.as_bytes())))
        .collect();

    buf.advance(line_end + 2);
    Ok(Some(Frame::array(tokens)))
}

/// Locate the first CRLF in the slice, returning the index of the `\r`.
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|pair| pair == b"\r\n")
}

/// Check if a complete frame is available and return its byte length
fn check_frame(
    cursor: &mut Cursor<&[u8]>,
    limits: &ParserLimits,
    depth: usize,
) -> Result<usize, ParseError> {
    if depth > limits.max_nesting_depth {
        return Err(nesting_too_deep_error(depth, limits.max_nesting_depth));
    }

    match peek_byte(cursor)? {
        b'+' | b'-' | b':' => {
            // Line-delimited frame: read until \r\n
            find_line(cursor)?;
            Ok(cursor.position() as usize)
        }
        b'$' => {
            cursor.advance(1);
            let len = read_decimal(cursor)?;
            if len == -1 {
                // Null bulk string
                Ok(cursor.position() as usize)
            } else if len < -1 {
                Err(ParseError::Invalid("negative bulk string length".into()))
            } else {
                let len = len as usize;
                if len > limits.max_bulk_string_size {
                    return Err(bulk_string_too_large_error(len, limits.max_bulk_string_size));
                }
                // Skip the payload plus final \r\n
                let total = cursor.position() as usize + len + 2;
                if cursor.get_ref().len() < total {
                    Err(ParseError::Incomplete)
                } else {
                    cursor.set_position(total as u64);
                    Ok(total)
                }
            }
        }
        b'*' => {
            cursor.advance(1);
            let count = read_decimal(cursor)?;
            if count == -1 {
                // Null array
                Ok(cursor.position() as usize)
            } else if count < -1 {
                Err(ParseError::Invalid("negative array length".into()))
            } else {
                let count = count as usize;
                if count > limits.max_array_elements {
                    return Err(array_too_large_error(count, limits.max_array_elements));
                }
                for _ in 0..count {
                    check_frame(cursor, limits, depth + 1)?;
                }
                Ok(cursor.position() as usize)
            }
        }
        byte => Err(invalid_byte_error(byte)),
    }
}

/// Parse a frame from the cursor (assumes complete data is available)
fn parse_frame_internal(
    cursor: &mut Cursor<&[u8]>,
    limits: &ParserLimits,
    depth: usize,
) -> Result<Frame, ParseError> {
    match get_byte(cursor)? {
        b'+' => {
            let line = read_line(cursor)?;
            Ok(Frame::Simple(bytes::Bytes::copy_from_slice(line)))
        }
        b'-' => {
            let line = read_line(cursor)?;
            Ok(Frame::Error(bytes::Bytes::copy_from_slice(line)))
        }
        b':' => {
            let n = read_decimal(cursor)?;
            Ok(Frame::Integer(n))
        }
        b'$' => {
            let len = read_decimal(cursor)?;
            if len == -1 {
                Ok(Frame::null())
            } else {
                let len = len as usize;
                let data = read_bytes(cursor, len)?;
                skip_crlf(cursor)?;
                Ok(Frame::Bulk(Some(bytes::Bytes::copy_from_slice(data))))
            }
        }
        b'*' => {
            let count = read_decimal(cursor)?;
            if count == -1 {
                Ok(Frame::null_array())
            } else if count < -1 {
                Err(ParseError::Invalid("negative array length".into()))
            } else {
                let mut frames = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    frames.push(parse_frame_internal(cursor, limits, depth + 1)?);
                }
                Ok(Frame::Array(Some(frames)))
            }
        }
        byte => Err(invalid_byte_error(byte)),
    }
}

/// Peek at the next byte without advancing
#[inline]
fn peek_byte(cursor: &Cursor<&[u8]>) -> Result<u8, ParseError> {
    if cursor.position() as usize >= cursor.get_ref().len() {
        return Err(ParseError::Incomplete);
    }
    Ok(cursor.get_ref()[cursor.position() as usize])
}

/// Get the next byte and advance
#[inline]
fn get_byte(cursor: &mut Cursor<&[u8]>) -> Result<u8, ParseError> {
    if cursor.position() as usize >= cursor.get_ref().len() {
        return Err(ParseError::Incomplete);
    }
    let byte = cursor.get_ref()[cursor.position() as usize];
    cursor.advance(1);
    Ok(byte)
}

/// Find the end of a line (\r\n) and position cursor after it
#[inline]
fn find_line(cursor: &mut Cursor<&[u8]>) -> Result<(), ParseError> {
    let start = cursor.position() as usize;
    let buf = cursor.get_ref();

    for i in start..buf.len().saturating_sub(1) {
        if buf[i] == b'\r' && buf[i + 1] == b'\n' {
            cursor.set_position((i + 2) as u64);
            return Ok(());
        }
    }

    Err(ParseError::Incomplete)
}

/// Read a line (excluding \r\n)
#[inline]
fn read_line<'a>(cursor: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], ParseError> {
    let start = cursor.position() as usize;
    let buf: &'a [u8] = cursor.get_ref();

    for i in start..buf.len().saturating_sub(1) {
        if buf[i] == b'\r' && buf[i + 1] == b'\n' {
            cursor.set_position((i + 2) as u64);
            return Ok(&buf[start..i]);
        }
    }

    Err(ParseError::Incomplete)
}

/// Read a decimal number (possibly negative) followed by \r\n
#[inline]
fn read_decimal(cursor: &mut Cursor<&[u8]>) -> Result<i64, ParseError> {
    let line = read_line(cursor)?;
    let s = std::str::from_utf8(line).map_err(|_| ParseError::InvalidUtf8)?;
    s.parse().map_err(|_| invalid_integer_error(s))
}

/// Read exactly n bytes
#[inline]
fn read_bytes<'a>(cursor: &mut Cursor<&'a [u8]>, n: usize) -> Result<&'a [u8], ParseError> {
    let start = cursor.position() as usize;
    let buf: &'a [u8] = cursor.get_ref();

    if start + n > buf.len() {
        return Err(ParseError::Incomplete);
    }

    cursor.set_position((start + n) as u64);
    Ok(&buf[start..start + n])
}

/// Skip \r\n
#[inline]
fn skip_crlf(cursor: &mut Cursor<&[u8]>) -> Result<(), ParseError> {
    let pos = cursor.position() as usize;
    let buf = cursor.get_ref();

    if pos + 2 > buf.len() {
        return Err(ParseError::Incomplete);
    }

    if buf[pos] != b'\r' || buf[pos + 1] != b'\n' {
        return Err(expected_crlf_error());
    }

    cursor.advance(2);
    Ok(())
}
