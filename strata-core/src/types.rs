//! Core types for Strata frames

use crate::constants::{
    ARCHIVE_ID_CONTEXT, ARCHIVE_ID_LEN, CHECKSUM_OFFSET, DEFAULT_BLOCK_SIZE, DEFAULT_DATA_SHARDS,
    DEFAULT_PARITY_SHARDS, DIGEST_SIZE, FORMAT_VERSION, FRAME_MAGIC, MAX_BLOCK_SIZE, MAX_SHARDS,
    MIN_BLOCK_SIZE, TRAILER_SIZE,
};
use crate::error::{Error, FrameError};
use bytes::{BufMut, Bytes};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Identifier shared by every frame of one encoded archive.
///
/// Derived from the codec parameters and the archive contents, so encoding
/// the same archive twice with the same parameters yields the same id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchiveId([u8; ARCHIVE_ID_LEN]);

impl ArchiveId {
    /// Wrap raw id bytes
    pub const fn from_bytes(bytes: [u8; ARCHIVE_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw id bytes
    pub const fn as_bytes(&self) -> &[u8; ARCHIVE_ID_LEN] {
        &self.0
    }

    /// Derive the id of an archive encoded with `params`
    pub fn derive(params: &CodecParams, archive_len: u64, digest: &[u8; DIGEST_SIZE]) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key(ARCHIVE_ID_CONTEXT);
        hasher.update(&(params.data_shards as u64).to_be_bytes());
        hasher.update(&(params.parity_shards as u64).to_be_bytes());
        hasher.update(&(params.block_size as u64).to_be_bytes());
        hasher.update(&archive_len.to_be_bytes());
        hasher.update(digest);

        let mut id = [0u8; ARCHIVE_ID_LEN];
        id.copy_from_slice(&hasher.finalize().as_bytes()[..ARCHIVE_ID_LEN]);
        Self(id)
    }

    /// Lowercase hex rendering, as used in frame file names
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ArchiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ArchiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArchiveId({})", self.to_hex())
    }
}

impl FromStr for ArchiveId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut id = [0u8; ARCHIVE_ID_LEN];
        hex::decode_to_slice(s, &mut id)?;
        Ok(Self(id))
    }
}

impl Serialize for ArchiveId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ArchiveId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Stripe geometry chosen at encode time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecParams {
    /// Data blocks per stripe (`k`)
    pub data_shards: usize,

    /// Parity blocks per stripe (`m`)
    pub parity_shards: usize,

    /// Bytes per block
    pub block_size: usize,
}

impl CodecParams {
    /// Create parameters without validating them
    pub const fn new(data_shards: usize, parity_shards: usize, block_size: usize) -> Self {
        Self {
            data_shards,
            parity_shards,
            block_size,
        }
    }

    /// Check that the geometry can be encoded
    pub fn validate(&self) -> Result<(), Error> {
        if self.data_shards == 0 {
            return Err(Error::InvalidCodecParameters(
                "data_shards must be at least 1".to_string(),
            ));
        }
        if self.parity_shards == 0 {
            return Err(Error::InvalidCodecParameters(
                "parity_shards must be at least 1".to_string(),
            ));
        }
        if self.data_shards + self.parity_shards > MAX_SHARDS {
            return Err(Error::InvalidCodecParameters(format!(
                "data_shards + parity_shards = {} exceeds {}",
                self.data_shards + self.parity_shards,
                MAX_SHARDS
            )));
        }
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&self.block_size) {
            return Err(Error::InvalidCodecParameters(format!(
                "block_size {} outside {}..={}",
                self.block_size, MIN_BLOCK_SIZE, MAX_BLOCK_SIZE
            )));
        }
        Ok(())
    }

    /// Blocks in one stripe (`k + m`)
    pub const fn width(&self) -> usize {
        self.data_shards + self.parity_shards
    }

    /// Number of data blocks needed for an archive of `archive_len` bytes
    pub fn total_blocks_for(&self, archive_len: u64) -> u64 {
        (archive_len + TRAILER_SIZE as u64)
            .div_ceil(self.block_size as u64)
            .max(1)
    }
}

impl Default for CodecParams {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_SHARDS, DEFAULT_PARITY_SHARDS, DEFAULT_BLOCK_SIZE)
    }
}

/// Named parameter presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Lossless storage, modest redundancy
    Archive,
    /// Capture channels that lose many frames (camera, scanner)
    Scan,
}

impl Profile {
    /// Preset name
    pub fn name(&self) -> &'static str {
        match self {
            Profile::Archive => "archive",
            Profile::Scan => "scan",
        }
    }

    /// Parameters of this preset
    pub fn params(&self) -> CodecParams {
        match self {
            Profile::Archive => CodecParams::default(),
            Profile::Scan => CodecParams::new(12, 12, 768),
        }
    }
}

/// What a slot of a stripe holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// Data block with its global index
    Data(u64),
    /// All-zero block completing the final stripe
    Padding,
    /// Parity block
    Parity,
}

/// Everything that is fixed for one encoded archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Layout {
    /// Archive identifier
    pub archive_id: ArchiveId,

    /// Stripe geometry
    pub params: CodecParams,

    /// Total number of data blocks (`N`)
    pub total_blocks: u64,
}

impl Layout {
    /// Number of stripes
    pub fn stripe_count(&self) -> u64 {
        self.total_blocks.div_ceil(self.params.data_shards as u64)
    }

    /// Blocks per stripe (`k + m`)
    pub fn width(&self) -> usize {
        self.params.width()
    }

    /// Classify a slot
    pub fn slot_kind(&self, stripe: u64, slot: usize) -> SlotKind {
        let k = self.params.data_shards;
        if slot >= k {
            return SlotKind::Parity;
        }
        let global = stripe * k as u64 + slot as u64;
        if global < self.total_blocks {
            SlotKind::Data(global)
        } else {
            SlotKind::Padding
        }
    }

    /// Number of padding slots in a stripe (non-zero only for the last one)
    pub fn padding_slots(&self, stripe: u64) -> usize {
        let k = self.params.data_shards as u64;
        let first = stripe * k;
        let real = self.total_blocks.saturating_sub(first).min(k);
        (k - real) as usize
    }

    /// Position of `(stripe, slot)` in a flat per-archive table
    pub fn table_index(&self, stripe: u64, slot: usize) -> usize {
        stripe as usize * self.width() + slot
    }
}

/// Frame header containing metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Format version
    pub version: u8,

    /// Archive this frame belongs to
    pub archive_id: ArchiveId,

    /// Total number of data blocks in the archive (`N`)
    pub total_blocks: u64,

    /// Data blocks per stripe (`k`)
    pub data_shards: u8,

    /// Parity blocks per stripe (`m`)
    pub parity_shards: u8,

    /// Bytes per block
    pub block_size: u32,

    /// Stripe this frame belongs to
    pub stripe_index: u64,

    /// Slot within the stripe; `data_shards..` are parity
    pub slot_index: u8,

    /// Archive bytes carried by a data block; `block_size` for parity
    pub payload_len: u32,

    /// CRC32C over the header bytes before this field and the payload
    pub checksum: u32,
}

impl FrameHeader {
    /// Header for `(stripe, slot)` of `layout`, checksum left unset
    pub fn new(layout: &Layout, stripe_index: u64, slot_index: usize, payload_len: u32) -> Self {
        Self {
            version: FORMAT_VERSION,
            archive_id: layout.archive_id,
            total_blocks: layout.total_blocks,
            data_shards: layout.params.data_shards as u8,
            parity_shards: layout.params.parity_shards as u8,
            block_size: layout.params.block_size as u32,
            stripe_index,
            slot_index: slot_index as u8,
            payload_len,
            checksum: 0,
        }
    }

    /// Archive layout described by this header
    pub fn layout(&self) -> Layout {
        Layout {
            archive_id: self.archive_id,
            params: CodecParams::new(
                self.data_shards as usize,
                self.parity_shards as usize,
                self.block_size as usize,
            ),
            total_blocks: self.total_blocks,
        }
    }

    /// Validate the header fields against each other
    pub fn validate(&self) -> Result<(), FrameError> {
        if self.version != FORMAT_VERSION {
            return Err(FrameError::UnsupportedVersion(self.version));
        }

        let layout = self.layout();
        layout
            .params
            .validate()
            .map_err(|e| FrameError::InvalidStructure(e.to_string()))?;

        if self.total_blocks == 0 {
            return Err(FrameError::InvalidStructure(
                "archive has zero data blocks".to_string(),
            ));
        }
        if self.stripe_index >= layout.stripe_count() {
            return Err(FrameError::InvalidStructure(format!(
                "stripe {} out of range ({} stripes)",
                self.stripe_index,
                layout.stripe_count()
            )));
        }
        if self.slot_index as usize >= layout.width() {
            return Err(FrameError::InvalidStructure(format!(
                "slot {} out of range ({} slots)",
                self.slot_index,
                layout.width()
            )));
        }
        if self.payload_len > self.block_size {
            return Err(FrameError::InvalidStructure(format!(
                "payload length {} exceeds block size {}",
                self.payload_len, self.block_size
            )));
        }

        match layout.slot_kind(self.stripe_index, self.slot_index as usize) {
            SlotKind::Parity if self.payload_len != self.block_size => {
                Err(FrameError::InvalidStructure(format!(
                    "parity payload length {} differs from block size {}",
                    self.payload_len, self.block_size
                )))
            }
            SlotKind::Padding if self.payload_len != 0 => Err(FrameError::InvalidStructure(
                format!("padding block carries payload length {}", self.payload_len),
            )),
            _ => Ok(()),
        }
    }

    /// The header bytes covered by the checksum, in wire order
    pub fn prefix_bytes(&self) -> [u8; CHECKSUM_OFFSET] {
        let mut out = [0u8; CHECKSUM_OFFSET];
        let mut buf = &mut out[..];
        buf.put_slice(FRAME_MAGIC);
        buf.put_u8(self.version);
        buf.put_slice(self.archive_id.as_bytes());
        buf.put_u64(self.total_blocks);
        buf.put_u8(self.data_shards);
        buf.put_u8(self.parity_shards);
        buf.put_u32(self.block_size);
        buf.put_u64(self.stripe_index);
        buf.put_u8(self.slot_index);
        buf.put_u32(self.payload_len);
        out
    }

    /// Whether this frame carries a parity block
    pub fn is_parity(&self) -> bool {
        self.slot_index >= self.data_shards
    }
}

/// Complete Strata frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Frame header
    pub header: FrameHeader,

    /// Block bytes, always `block_size` long
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame, computing its checksum
    pub fn seal(mut header: FrameHeader, payload: Bytes) -> Self {
        header.checksum = compute_checksum(&header, &payload);
        Self { header, payload }
    }

    /// Validate header, payload length and checksum
    pub fn verify(&self) -> Result<(), FrameError> {
        self.header.validate()?;

        if self.payload.len() != self.header.block_size as usize {
            return Err(FrameError::InvalidStructure(format!(
                "Payload length mismatch: block size {}, actual {}",
                self.header.block_size,
                self.payload.len()
            )));
        }

        let actual = compute_checksum(&self.header, &self.payload);
        if actual != self.header.checksum {
            return Err(FrameError::ChecksumMismatch {
                expected: self.header.checksum,
                actual,
            });
        }

        Ok(())
    }

    /// Archive this frame belongs to
    pub fn archive_id(&self) -> ArchiveId {
        self.header.archive_id
    }

    /// `(stripe, slot)` position of this frame
    pub fn position(&self) -> (u64, usize) {
        (self.header.stripe_index, self.header.slot_index as usize)
    }
}

/// CRC32C over the checksummed header prefix followed by the payload
pub fn compute_checksum(header: &FrameHeader, payload: &[u8]) -> u32 {
    let crc = crc32c::crc32c(&header.prefix_bytes());
    crc32c::crc32c_append(crc, payload)
}
