//! Byte layout of a package stream.
//!
//! ```text
//! [4 bytes: magic "BPKS"]
//! [4 bytes: header length (big-endian u32)]
//! [N bytes: header (bincode-serialized StreamHeader)]
//! then, per record:
//!   [1 byte: FRAME_RECORD]
//!   [4 bytes: payload length (little-endian u32)]
//!   [4 bytes: CRC32 of payload (little-endian u32)]
//!   [N bytes: payload (JSON record, optionally zstd-compressed)]
//! then the trailer:
//!   [1 byte: FRAME_END]
//!   [8 bytes: record count (little-endian u64)]
//!   [32 bytes: BLAKE3 digest of every preceding byte]
//! ```
//!
//! A stream without its trailer is truncated, never an empty success.

use serde::{Deserialize, Serialize};

use crate::config::Compression;
use crate::error::{CodecError, CodecResult};

pub const MAGIC: &[u8; 4] = b"BPKS";

pub const FORMAT_VERSION: u32 = 1;

/// Upper bound on the encoded header; anything larger is corruption.
pub const MAX_HEADER_SIZE: usize = 256;

pub const FRAME_END: u8 = 0x00;
pub const FRAME_RECORD: u8 = 0x01;

/// Tag + length + CRC.
pub const FRAME_HEADER_SIZE: usize = 9;

/// Count + digest, after the tag.
pub const TRAILER_BODY_SIZE: usize = 8 + 32;

/// Self-description written once at the start of every stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamHeader {
    pub version: u32,
    pub compression: Compression,
}

impl StreamHeader {
    pub fn new(compression: Compression) -> Self {
        Self {
            version: FORMAT_VERSION,
            compression,
        }
    }

    /// Magic, length prefix and bincode body.
    pub fn to_bytes(&self) -> CodecResult<Vec<u8>> {
        let body =
            bincode::serialize(self).map_err(|e| CodecError::Serialization(e.to_string()))?;
        let mut buf = Vec::with_capacity(MAGIC.len() + 4 + body.len());
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&(body.len() as u32).to_be_bytes());
        buf.extend_from_slice(&body);
        Ok(buf)
    }

    /// Decode and check the bincode body that follows the length prefix.
    pub fn from_body(body: &[u8], offset: u64) -> CodecResult<Self> {
        let header: Self = bincode::deserialize(body)
            .map_err(|e| CodecError::malformed(offset, format!("bad stream header: {e}")))?;
        if header.version != FORMAT_VERSION {
            return Err(CodecError::malformed(
                offset,
                format!(
                    "unsupported stream version {} (expected {FORMAT_VERSION})",
                    header.version
                ),
            ));
        }
        Ok(header)
    }
}

/// Encode one record frame around an already-encoded payload.
pub fn encode_record_frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    buf.push(FRAME_RECORD);
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
    buf.extend_from_slice(payload);
    buf
}
