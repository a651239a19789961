//! Wire framing for socket transports
//!
//! Wire format (requests and responses share it):
//! ```text
//!   [4 bytes: body length (u32 BE)]
//!   [8 bytes: correlation id (u64 BE)]
//!   [4 bytes: type tag (u32 BE)]
//!   [payload bytes (codec output)]
//! ```
//!
//! A response carries the correlation id of the request it answers.

use std::io::{self, Read};

use futures_lite::io::{AsyncRead, AsyncReadExt};
use thiserror::Error;

use crate::job::Envelope;

/// Maximum accepted frame body (16 MiB)
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const HEADER_LEN: usize = 8 + 4;

/// Errors that can occur while reading or writing frames
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid frame length: {0}")]
    InvalidLength(usize),

    #[error("truncated frame header ({0} bytes)")]
    Truncated(usize),
}

/// One envelope plus the correlation id that routes its reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub correlation: u64,
    pub envelope: Envelope,
}

impl Frame {
    pub fn new(correlation: u64, envelope: Envelope) -> Self {
        Self {
            correlation,
            envelope,
        }
    }

    /// Serialize to wire format, including the length prefix
    pub fn to_bytes(&self) -> Result<Vec<u8>, FrameError> {
        let body_len = HEADER_LEN + self.envelope.payload.len();
        if body_len > MAX_FRAME_LEN {
            return Err(FrameError::InvalidLength(body_len));
        }

        let mut buf = Vec::with_capacity(4 + body_len);
        buf.extend_from_slice(&(body_len as u32).to_be_bytes());
        buf.extend_from_slice(&self.correlation.to_be_bytes());
        buf.extend_from_slice(&self.envelope.type_tag.to_be_bytes());
        buf.extend_from_slice(&self.envelope.payload);
        Ok(buf)
    }

    /// Parse a frame body (after the length prefix)
    pub fn from_body(body: &[u8]) -> Result<Self, FrameError> {
        if body.len() < HEADER_LEN {
            return Err(FrameError::Truncated(body.len()));
        }

        let (correlation, rest) = body.split_at(8);
        let (type_tag, payload) = rest.split_at(4);

        let mut correlation_bytes = [0u8; 8];
        correlation_bytes.copy_from_slice(correlation);
        let mut tag_bytes = [0u8; 4];
        tag_bytes.copy_from_slice(type_tag);

        Ok(Self {
            correlation: u64::from_be_bytes(correlation_bytes),
            envelope: Envelope::new(u32::from_be_bytes(tag_bytes), payload.to_vec()),
        })
    }
}

fn check_len(len_buf: [u8; 4]) -> Result<usize, FrameError> {
    let len = u32::from_be_bytes(len_buf) as usize;
    if len < HEADER_LEN || len > MAX_FRAME_LEN {
        return Err(FrameError::InvalidLength(len));
    }
    Ok(len)
}

/// Read one frame from a blocking stream
///
/// Returns `Ok(None)` when the peer closed the stream between frames.
pub fn read_frame(reader: &mut impl Read) -> Result<Option<Frame>, FrameError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let mut body = vec![0u8; check_len(len_buf)?];
    reader.read_exact(&mut body)?;
    Frame::from_body(&body).map(Some)
}

/// Read one frame from an async stream
///
/// Returns `Ok(None)` when the peer closed the stream between frames.
pub async fn read_frame_async(
    reader: &mut (impl AsyncRead + Unpin),
) -> Result<Option<Frame>, FrameError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let mut body = vec![0u8; check_len(len_buf)?];
    reader.read_exact(&mut body).await?;
    Frame::from_body(&body).map(Some)
}
