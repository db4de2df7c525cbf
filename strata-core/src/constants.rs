//! Constants and limits for the Strata frame format

/// Frame magic - 4 bytes at the start of every frame
pub const FRAME_MAGIC: &[u8; 4] = b"STRF";

/// Current frame format version
pub const FORMAT_VERSION: u8 = 1;

/// Length of an archive identifier in bytes
pub const ARCHIVE_ID_LEN: usize = 16;

/// Header size in bytes
///
/// 4 (magic) + 1 (version) + 16 (archive_id) + 8 (total_blocks) + 1 (k) + 1 (m)
/// + 4 (block_size) + 8 (stripe_index) + 1 (slot_index) + 4 (payload_len)
/// + 4 (checksum) = 52 bytes
pub const HEADER_SIZE: usize = 52;

/// Offset of the checksum field; the checksum covers every header byte before it
pub const CHECKSUM_OFFSET: usize = 48;

/// Maximum number of shards (data + parity) in one stripe
pub const MAX_SHARDS: usize = 255;

/// Smallest accepted block size
pub const MIN_BLOCK_SIZE: usize = 64;

/// Largest accepted block size (16 MB)
pub const MAX_BLOCK_SIZE: usize = 16 * 1024 * 1024;

/// Largest frame that can ever be valid
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_BLOCK_SIZE;

/// Default number of data blocks per stripe
pub const DEFAULT_DATA_SHARDS: usize = 10;

/// Default number of parity blocks per stripe
pub const DEFAULT_PARITY_SHARDS: usize = 3;

/// Default block size in bytes
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Size of the BLAKE3 digest stored in the stream trailer
pub const DIGEST_SIZE: usize = 32;

/// Stream trailer: archive length (8 bytes, big-endian) + BLAKE3 digest.
/// Occupies the last bytes of the final data block.
pub const TRAILER_SIZE: usize = 8 + DIGEST_SIZE;

/// BLAKE3 derive-key context used for archive identifiers
pub const ARCHIVE_ID_CONTEXT: &str = "strata 2024 archive id v1";

/// Longest relative path a ustar header can hold (155-byte prefix + '/' + 100-byte name)
pub const MAX_PATH_LEN: usize = 255;

/// Longest symlink target a ustar header can hold
pub const MAX_LINK_LEN: usize = 100;

/// Extension of frame files written by the store
pub const FRAME_FILE_EXTENSION: &str = "frame";

/// Suffix of the informational manifest written next to the frames
pub const MANIFEST_SUFFIX: &str = "manifest.json";
