//! # Strata Core
//!
//! Erasure-coded archival frames: pack a file tree into a canonical tar
//! stream, cut it into self-describing frames protected by Reed-Solomon
//! parity, and rebuild the exact archive from any sufficiently large subset
//! of surviving frames.
//!
//! ## Modules
//!
//! - `constants`: Frame format constants and limits
//! - `types`: Core types (ArchiveId, CodecParams, Layout, Frame, FrameHeader)
//! - `error`: Error taxonomy and status codes
//! - `encoder`: Frame encoding
//! - `decoder`: Strict frame decoding
//! - `fec`: Reed-Solomon stripe coding
//! - `archive`: Archive stream model and canonical tar form
//! - `packer`: File tree to archive stream
//! - `codec`: Archive bytes to frames
//! - `reconstruct`: Frames to archive bytes
//! - `store`: One file per frame in a directory
//! - `pipeline`: Filesystem entry points
//! - `cancel`: Cooperative cancellation

#![warn(missing_docs)]

pub mod archive;
pub mod cancel;
pub mod codec;
pub mod constants;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod fec;
pub mod packer;
pub mod pipeline;
pub mod reconstruct;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use archive::{unpack, ArchiveStream, Entry, EntryKind};
pub use cancel::CancelToken;
pub use codec::{encode, StripeEncoder};
pub use error::{Error, FrameError};
pub use packer::pack;
pub use pipeline::{
    decode_frames_to_tar, decode_to_tar, pack_and_encode, pack_and_encode_to_frames,
    DecodeOptions, EncodeOptions,
};
pub use reconstruct::{decode, survey, Reconstructor};
pub use store::FrameStore;
pub use types::{ArchiveId, CodecParams, Frame, FrameHeader, Layout, Profile};

/// Result type alias for Strata operations
pub type Result<T> = core::result::Result<T, Error>;
