//! Frame format shared by the bus and the head command surface.
//!
//! ```text
//! ┌──────────────────┬──────────────────────┬──────────────────┐
//! │ Length (4 bytes) │ Channel (null-term.) │ JSON payload     │
//! │ Big-endian u32   │ UTF-8, no NUL bytes  │ (variable size)  │
//! └──────────────────┴──────────────────────┴──────────────────┘
//! ```
//!
//! Length covers channel + terminator + payload.

use crate::error::{Error, Result};
use std::io::{Read, Write};

/// Upper bound on a frame body; larger frames are rejected outright.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Control channel a client sends on to register a subscription; the
/// payload is the channel name to subscribe to.
pub(crate) const CONTROL_SUBSCRIBE: &str = "@subscribe";

/// One decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub channel: String,
    pub payload: Vec<u8>,
}

/// Encode a frame into a reusable buffer.
pub fn encode_frame(channel: &str, payload: &[u8], buffer: &mut Vec<u8>) -> Result<()> {
    if channel.as_bytes().contains(&0) {
        return Err(Error::Protocol(format!(
            "channel name contains NUL: {:?}",
            channel
        )));
    }

    let body_len = channel.len() + 1 + payload.len();
    if body_len > MAX_FRAME_LEN {
        return Err(Error::Protocol(format!("frame too large: {} bytes", body_len)));
    }

    buffer.clear();
    buffer.reserve(4 + body_len);
    buffer.extend_from_slice(&(body_len as u32).to_be_bytes());
    buffer.extend_from_slice(channel.as_bytes());
    buffer.push(0);
    buffer.extend_from_slice(payload);
    Ok(())
}

/// Encode and write one frame.
pub fn write_frame<W: Write>(writer: &mut W, channel: &str, payload: &[u8]) -> Result<()> {
    let mut buffer = Vec::new();
    encode_frame(channel, payload, &mut buffer)?;
    writer.write_all(&buffer)?;
    Ok(())
}

/// Read one frame.
///
/// Returns `Ok(None)` when the read timed out (callers poll shutdown flags
/// between attempts); connection loss surfaces as an I/O error.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Frame>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::TimedOut => return Ok(None),
        Err(e) => return Err(Error::Io(e)),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(Error::Protocol(format!("frame too large: {} bytes", len)));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;

    let nul = body
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| Error::Protocol("frame missing channel terminator".to_string()))?;

    let channel = std::str::from_utf8(&body[..nul])
        .map_err(|_| Error::Protocol("channel name is not UTF-8".to_string()))?
        .to_string();
    let payload = body[nul + 1..].to_vec();

    Ok(Some(Frame { channel, payload }))
}
