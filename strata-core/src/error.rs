//! Error types for Strata operations

use crate::types::ArchiveId;
use std::path::PathBuf;

/// Errors raised while parsing or validating a single frame.
///
/// These never end an invocation on their own: the reconstructor and the
/// store treat a frame that fails here as missing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameError {
    /// Invalid frame magic
    #[error("Invalid frame magic: expected STRF, got {0:?}")]
    BadMagic([u8; 4]),

    /// Unsupported format version
    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(u8),

    /// Frame size exceeds maximum allowed
    #[error("Frame size {0} exceeds maximum {1}")]
    FrameTooLarge(usize, usize),

    /// Incomplete frame - not enough data
    #[error("Incomplete frame: expected {expected} bytes, got {actual}")]
    IncompleteFrame {
        /// The number of bytes expected.
        expected: usize,
        /// The number of bytes actually found.
        actual: usize,
    },

    /// Checksum mismatch
    #[error("Checksum mismatch: expected {expected:x}, got {actual:x}")]
    ChecksumMismatch {
        /// The checksum stored in the header.
        expected: u32,
        /// The checksum calculated over header and payload.
        actual: u32,
    },

    /// Header fields are inconsistent with each other
    #[error("Invalid frame structure: {0}")]
    InvalidStructure(String),
}

/// Errors that end an encode or decode invocation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// An input entry could not be opened, listed or read
    #[error("Unreadable input {path:?}: {reason}")]
    UnreadableInput {
        /// The offending path.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// An entry's archive path does not fit the archive format
    #[error("Path too long ({len} bytes, maximum {max}): {path}")]
    PathTooLong {
        /// The archive path (or symlink target) that did not fit.
        path: String,
        /// Its length in bytes.
        len: usize,
        /// The format limit.
        max: usize,
    },

    /// The input tree changed while it was being packed
    #[error("Input changed while packing {path:?}: {reason}")]
    Inconsistent {
        /// The entry that changed.
        path: PathBuf,
        /// What was observed.
        reason: String,
    },

    /// Stripe geometry cannot be encoded
    #[error("Invalid codec parameters: {0}")]
    InvalidCodecParameters(String),

    /// A frame of another archive was offered to an archive's frame table
    #[error("Frame belongs to archive {found}, expected {expected}")]
    ForeignArchive {
        /// The archive being reconstructed.
        expected: ArchiveId,
        /// The archive the frame belongs to.
        found: ArchiveId,
    },

    /// A stripe has fewer than `k` usable blocks
    #[error("Insufficient frames: stripe {stripe} has {available} of {required} required blocks")]
    InsufficientFrames {
        /// First unrecoverable stripe.
        stripe: u64,
        /// Usable blocks found for it.
        available: usize,
        /// Blocks needed to recover it.
        required: usize,
    },

    /// Reconstructed bytes are not the archive that was encoded
    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),

    /// Storage failure (disk full, permission denied, ...)
    #[error("IO failure: {0}")]
    IoFailure(String),

    /// The caller cancelled the invocation
    #[error("Operation cancelled")]
    Cancelled,

    /// A frame could not be serialized
    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl Error {
    /// Status code reported by the entry points for this failure kind
    pub fn status_code(&self) -> i32 {
        match self {
            Error::UnreadableInput { .. } => 2,
            Error::PathTooLong { .. } => 3,
            Error::Inconsistent { .. } => 4,
            Error::InvalidCodecParameters(_) => 5,
            Error::ForeignArchive { .. } => 6,
            Error::InsufficientFrames { .. } => 7,
            Error::CorruptArchive(_) | Error::Frame(_) => 8,
            Error::IoFailure(_) => 9,
            Error::Cancelled => 10,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoFailure(err.to_string())
    }
}
