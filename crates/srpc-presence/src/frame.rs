//! Length-prefixed frame codec for the presence IPC channel.
//!
//! Wire layout: `i32 LE opcode | i32 LE payload length | payload`. Payloads
//! are UTF-8 JSON. The length is written from `usize` and read back through
//! `u32`, so its sign bit carries no special meaning.

use bytes::{Buf, Bytes, BytesMut};
use serde::Serialize;
use thiserror::Error;

/// Size of the opcode + length header.
pub const HEADER_LEN: usize = 8;

/// Largest payload accepted in either direction.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 2 * 1024 * 1024; // 2 MiB

/// Opcodes understood by the presence consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Handshake,
    Frame,
    Close,
    Ping,
    Pong,
}

impl Opcode {
    pub fn code(self) -> i32 {
        match self {
            Opcode::Handshake => 0,
            Opcode::Frame => 1,
            Opcode::Close => 2,
            Opcode::Ping => 3,
            Opcode::Pong => 4,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Opcode::Handshake),
            1 => Some(Opcode::Frame),
            2 => Some(Opcode::Close),
            3 => Some(Opcode::Ping),
            4 => Some(Opcode::Pong),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame exceeds maximum size: len={len} max={max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("insufficient data: need={need} have={have}")]
    InsufficientData { need: usize, have: usize },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One decoded frame. The opcode is kept raw so unknown codes survive
/// decoding and can be logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: i32,
    pub payload: Bytes,
}

impl Frame {
    pub fn kind(&self) -> Option<Opcode> {
        Opcode::from_code(self.opcode)
    }

    /// Parse the payload as JSON.
    pub fn json(&self) -> Result<serde_json::Value, FrameError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

/// Encode raw payload bytes into a frame.
pub fn encode_frame(opcode: Opcode, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    if payload.len() > DEFAULT_MAX_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge {
            len: payload.len(),
            max: DEFAULT_MAX_FRAME_SIZE,
        });
    }

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&opcode.code().to_le_bytes());
    out.extend_from_slice(&(payload.len() as i32).to_le_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Serialize `value` as JSON and encode it into a frame.
pub fn encode_json<T: Serialize>(opcode: Opcode, value: &T) -> Result<Vec<u8>, FrameError> {
    let payload = serde_json::to_vec(value)?;
    encode_frame(opcode, &payload)
}

fn read_header(src: &[u8]) -> (i32, usize) {
    let opcode = i32::from_le_bytes([src[0], src[1], src[2], src[3]]);
    let len = i32::from_le_bytes([src[4], src[5], src[6], src[7]]) as u32 as usize;
    (opcode, len)
}

/// Decode a single frame from the start of `src`, returning it with the
/// number of bytes consumed.
pub fn decode_frame(src: &[u8], max_frame_size: usize) -> Result<(Frame, usize), FrameError> {
    if src.len() < HEADER_LEN {
        return Err(FrameError::InsufficientData {
            need: HEADER_LEN,
            have: src.len(),
        });
    }

    let (opcode, len) = read_header(src);
    if len > max_frame_size {
        return Err(FrameError::FrameTooLarge {
            len,
            max: max_frame_size,
        });
    }

    let need = HEADER_LEN + len;
    if src.len() < need {
        return Err(FrameError::InsufficientData {
            need,
            have: src.len(),
        });
    }

    let frame = Frame {
        opcode,
        payload: Bytes::copy_from_slice(&src[HEADER_LEN..need]),
    };
    Ok((frame, need))
}

/// Try to split one complete frame off the front of a growable read buffer.
///
/// Returns `Ok(None)` until enough bytes have arrived.
pub fn try_decode_frame_from_buffer(
    buf: &mut BytesMut,
    max_frame_size: usize,
) -> Result<Option<Frame>, FrameError> {
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }

    let (opcode, len) = read_header(&buf[..]);
    if len > max_frame_size {
        return Err(FrameError::FrameTooLarge {
            len,
            max: max_frame_size,
        });
    }

    if buf.len() < HEADER_LEN + len {
        buf.reserve(HEADER_LEN + len - buf.len());
        return Ok(None);
    }

    buf.advance(HEADER_LEN);
    let payload = buf.split_to(len).freeze();
    Ok(Some(Frame { opcode, payload }))
}
