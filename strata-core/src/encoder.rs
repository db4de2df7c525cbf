//! Frame encoding

use crate::constants::HEADER_SIZE;
use crate::error::FrameError;
use crate::types::{Frame, FrameHeader};
use bytes::{BufMut, Bytes, BytesMut};

/// Encode a frame into bytes
///
/// The frame is encoded with the following layout (all integers big-endian):
/// 1. Magic (4 bytes): "STRF"
/// 2. Header:
///    - Version (1 byte)
///    - Archive ID (16 bytes)
///    - Total data blocks (8 bytes)
///    - Data shards, parity shards (1 byte each)
///    - Block size (4 bytes)
///    - Stripe index (8 bytes)
///    - Slot index (1 byte)
///    - Payload length (4 bytes)
///    - Checksum (4 bytes, CRC32C)
/// 3. Payload (`block_size` bytes)
///
/// The frame is verified first, so a frame whose checksum was not sealed is
/// never written.
pub fn encode_frame(frame: &Frame) -> Result<Bytes, FrameError> {
    frame.verify()?;

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + frame.payload.len());
    write_header(&frame.header, &mut buf);
    buf.put_slice(&frame.payload);

    Ok(buf.freeze())
}

/// Write the 52-byte header
pub fn write_header<B: BufMut>(header: &FrameHeader, buf: &mut B) {
    buf.put_slice(&header.prefix_bytes());
    buf.put_u32(header.checksum);
}
