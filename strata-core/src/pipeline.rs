//! End-to-end operations over the filesystem
//!
//! [`pack_and_encode_to_frames`] and [`decode_frames_to_tar`] are the entry
//! points front-ends call: they take paths and return a status code (0 on
//! success, [`Error::status_code`] otherwise). The `Result` variants take
//! options and report what they did.

use crate::archive::unpack;
use crate::cancel::CancelToken;
use crate::codec::{batch_width, StripeEncoder};
use crate::constants::{FORMAT_VERSION, MANIFEST_SUFFIX};
use crate::error::Error;
use crate::packer::pack;
use crate::reconstruct::{ReconstructStats, Reconstructor};
use crate::store::{write_atomic, FrameStore, SkippedFile};
use crate::types::{ArchiveId, CodecParams};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[cfg(feature = "logging")]
use tracing::{error, info};

/// Options for [`pack_and_encode`]
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    /// Stripe geometry
    pub params: CodecParams,
    /// Checked between stripe batches
    pub cancel: CancelToken,
    /// Write `<archive-id>.manifest.json` after the frames
    pub write_manifest: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            params: CodecParams::default(),
            cancel: CancelToken::new(),
            write_manifest: true,
        }
    }
}

/// Options for [`decode_to_tar`]
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    /// Reconstruct this archive instead of the one with the most frames
    pub archive_id: Option<ArchiveId>,
    /// Checked between stripes
    pub cancel: CancelToken,
}

/// Informational description of an encoded archive
///
/// Decoding never reads it; every field can be recomputed from the frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Frame format version
    pub format_version: u8,
    /// Archive id (hex)
    pub archive_id: ArchiveId,
    /// Name of the packed root
    pub root_name: String,
    /// Archive entries
    pub entries: usize,
    /// Archive length in bytes
    pub archive_len: u64,
    /// BLAKE3 digest of the archive (hex)
    pub archive_blake3: String,
    /// Stripe geometry
    pub params: CodecParams,
    /// Data blocks (`N`)
    pub total_blocks: u64,
    /// Stripes
    pub stripes: u64,
    /// Frames written for the archive
    pub frames: u64,
}

impl Manifest {
    /// Manifest file name for an archive
    pub fn file_name(archive_id: &ArchiveId) -> String {
        format!("{}.{}", archive_id, MANIFEST_SUFFIX)
    }
}

/// Result of [`pack_and_encode`]
#[derive(Debug, Clone)]
pub struct EncodeSummary {
    /// Description of the encoded archive
    pub manifest: Manifest,
    /// Frame files created
    pub written: usize,
    /// Identical frame files that were already present
    pub already_present: usize,
}

/// Result of [`decode_to_tar`]
#[derive(Debug, Clone)]
pub struct DecodeSummary {
    /// Archive that was rebuilt
    pub archive_id: ArchiveId,
    /// Bytes written to the output tar
    pub archive_len: u64,
    /// Archive entries
    pub entries: usize,
    /// Reconstruction counters
    pub stats: ReconstructStats,
    /// Files in the frame directory that were not frames
    pub skipped: Vec<SkippedFile>,
}

/// Pack `input` and write its frames into `out_dir`
///
/// Stripes are encoded in batches as wide as the worker pool and persisted
/// before the next batch starts, so cancellation leaves only complete frame
/// files behind.
pub fn pack_and_encode(
    input: &Path,
    out_dir: &Path,
    options: &EncodeOptions,
) -> Result<EncodeSummary, Error> {
    options.params.validate()?;
    options.cancel.check()?;

    let stream = pack(input)?;
    let root_name = stream.root_name().unwrap_or_default().to_string();
    let entries = stream.len();
    let encoder = StripeEncoder::new(stream.to_tar_bytes()?, options.params)?;
    let layout = *encoder.layout();

    let store = FrameStore::create(out_dir)?;
    let stripes = encoder.stripe_count();
    let width = batch_width();
    let (mut written, mut already_present) = (0, 0);

    let mut start = 0;
    while start < stripes {
        options.cancel.check()?;
        let end = start.saturating_add(width).min(stripes);
        let frames = encoder.encode_stripes(start..end)?;
        let summary = store.write_frames(&frames)?;
        written += summary.written;
        already_present += summary.already_present;
        start = end;
    }

    let trailer = encoder.trailer();
    let manifest = Manifest {
        format_version: FORMAT_VERSION,
        archive_id: layout.archive_id,
        root_name,
        entries,
        archive_len: trailer.archive_len,
        archive_blake3: hex::encode(trailer.digest),
        params: layout.params,
        total_blocks: layout.total_blocks,
        stripes,
        frames: stripes * layout.width() as u64,
    };
    if options.write_manifest {
        let json = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| Error::IoFailure(format!("manifest: {}", e)))?;
        write_atomic(&out_dir.join(Manifest::file_name(&layout.archive_id)), &json)?;
    }

    #[cfg(feature = "logging")]
    info!(
        "Encoded {:?} as archive {}: {} frames in {:?} ({} new)",
        input, layout.archive_id, manifest.frames, out_dir, written
    );

    Ok(EncodeSummary {
        manifest,
        written,
        already_present,
    })
}

/// Rebuild the archive held in `in_dir` and write it to `output_tar`
///
/// Nothing is written unless the archive was fully reconstructed and
/// verified.
pub fn decode_to_tar(
    in_dir: &Path,
    output_tar: &Path,
    options: &DecodeOptions,
) -> Result<DecodeSummary, Error> {
    options.cancel.check()?;
    let loaded = FrameStore::open(in_dir)?.read_frames()?;

    let mut reconstructor = Reconstructor::new().with_cancel(options.cancel.clone());
    if let Some(id) = options.archive_id {
        reconstructor = reconstructor.with_archive_id(id);
    }
    let rec = reconstructor.reconstruct(loaded.frames)?;
    let tar = unpack(&rec.stream)?;

    options.cancel.check()?;
    write_atomic(output_tar, &tar)?;

    #[cfg(feature = "logging")]
    info!(
        "Decoded archive {} ({} bytes) into {:?}",
        rec.layout.archive_id,
        tar.len(),
        output_tar
    );

    Ok(DecodeSummary {
        archive_id: rec.layout.archive_id,
        archive_len: tar.len() as u64,
        entries: rec.stream.len(),
        stats: rec.stats,
        skipped: loaded.skipped,
    })
}

/// Pack `input` into a canonical tar file, without frames
pub fn pack_to_tar(input: &Path, output_tar: &Path) -> Result<u64, Error> {
    let tar = unpack(&pack(input)?)?;
    write_atomic(output_tar, &tar)?;
    Ok(tar.len() as u64)
}

/// Pack and encode with default parameters; returns a status code
pub fn pack_and_encode_to_frames(input_path: impl AsRef<Path>, out_dir: impl AsRef<Path>) -> i32 {
    status(pack_and_encode(
        input_path.as_ref(),
        out_dir.as_ref(),
        &EncodeOptions::default(),
    ))
}

/// Decode the recoverable archive with the most frames; returns a status code
pub fn decode_frames_to_tar(in_dir: impl AsRef<Path>, output_tar: impl AsRef<Path>) -> i32 {
    status(decode_to_tar(
        in_dir.as_ref(),
        output_tar.as_ref(),
        &DecodeOptions::default(),
    ))
}

fn status<T>(result: Result<T, Error>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => {
            #[cfg(feature = "logging")]
            error!("{}", e);
            e.status_code()
        }
    }
}
