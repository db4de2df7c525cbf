//! Frame decoding (strict mode)

use crate::constants::{ARCHIVE_ID_LEN, FRAME_MAGIC, HEADER_SIZE, MAX_FRAME_SIZE};
use crate::error::FrameError;
use crate::types::{ArchiveId, Frame, FrameHeader};
use bytes::{Buf, Bytes};
use std::io::Read;

/// Parse a 52-byte header without validating it
pub fn parse_header(data: &[u8]) -> Result<FrameHeader, FrameError> {
    if data.len() < HEADER_SIZE {
        return Err(FrameError::IncompleteFrame {
            expected: HEADER_SIZE,
            actual: data.len(),
        });
    }

    if &data[0..4] != FRAME_MAGIC {
        let mut bad = [0u8; 4];
        bad.copy_from_slice(&data[0..4]);
        return Err(FrameError::BadMagic(bad));
    }

    let mut buf = &data[4..HEADER_SIZE];
    let version = buf.get_u8();
    let mut archive_id = [0u8; ARCHIVE_ID_LEN];
    buf.copy_to_slice(&mut archive_id);

    Ok(FrameHeader {
        version,
        archive_id: ArchiveId::from_bytes(archive_id),
        total_blocks: buf.get_u64(),
        data_shards: buf.get_u8(),
        parity_shards: buf.get_u8(),
        block_size: buf.get_u32(),
        stripe_index: buf.get_u64(),
        slot_index: buf.get_u8(),
        payload_len: buf.get_u32(),
        checksum: buf.get_u32(),
    })
}

/// Decode a frame from a byte buffer without copying the payload
///
/// The input `buf` must contain exactly one complete frame. This function
/// performs strict validation:
/// - Validates magic and version
/// - Validates header fields against each other
/// - Validates total length against the block size
/// - Validates the checksum
pub fn decode_frame_from_bytes_zero_copy(buf: Bytes) -> Result<Frame, FrameError> {
    let header = parse_header(&buf)?;
    header.validate()?;

    let total_size = HEADER_SIZE + header.block_size as usize;
    if total_size > MAX_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge(total_size, MAX_FRAME_SIZE));
    }
    if buf.len() < total_size {
        return Err(FrameError::IncompleteFrame {
            expected: total_size,
            actual: buf.len(),
        });
    }
    if buf.len() > total_size {
        return Err(FrameError::InvalidStructure(format!(
            "{} trailing bytes after frame",
            buf.len() - total_size
        )));
    }

    let frame = Frame {
        header,
        payload: buf.slice(HEADER_SIZE..total_size),
    };
    frame.verify()?;

    Ok(frame)
}

/// Decode a frame from a byte slice
pub fn decode_frame_from_bytes(data: &[u8]) -> Result<Frame, FrameError> {
    decode_frame_from_bytes_zero_copy(Bytes::copy_from_slice(data))
}

/// Decode one frame from a reader, consuming exactly its bytes
pub fn decode_frame<R: Read>(reader: &mut R) -> Result<Frame, FrameError> {
    let mut header_buf = [0u8; HEADER_SIZE];
    read_exact(reader, &mut header_buf)?;

    let header = parse_header(&header_buf)?;
    header.validate()?;

    let mut data = vec![0u8; HEADER_SIZE + header.block_size as usize];
    data[..HEADER_SIZE].copy_from_slice(&header_buf);
    read_exact(reader, &mut data[HEADER_SIZE..])?;

    decode_frame_from_bytes_zero_copy(Bytes::from(data))
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), FrameError> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => FrameError::IncompleteFrame {
            expected: buf.len(),
            actual: 0,
        },
        _ => FrameError::InvalidStructure(e.to_string()),
    })
}
