//! Frame store: one file per frame in a flat directory
//!
//! Frames are named `<archive-id>-<stripe:08>-<slot:03>.frame`, but names are
//! only a convenience. Reading loads every regular file in the directory and
//! keeps whatever parses as a valid frame.

use crate::constants::{FRAME_FILE_EXTENSION, HEADER_SIZE, MAX_FRAME_SIZE};
use crate::decoder::decode_frame_from_bytes_zero_copy;
use crate::encoder::encode_frame;
use crate::error::Error;
use crate::types::Frame;
use bytes::Bytes;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[cfg(feature = "logging")]
use tracing::{debug, warn};

/// What happened to a frame handed to [`FrameStore::write_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A new file was persisted
    Written,
    /// An identical file was already there
    AlreadyPresent,
}

/// Counts of a batch write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// New files
    pub written: usize,
    /// Identical files left in place
    pub already_present: usize,
}

/// A directory entry that did not yield a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    /// File path
    pub path: PathBuf,
    /// Why it was skipped
    pub reason: String,
}

/// Result of scanning a frame directory
#[derive(Debug, Clone, Default)]
pub struct LoadedFrames {
    /// Frames that parsed and verified, in file name order
    pub frames: Vec<Frame>,
    /// Everything else
    pub skipped: Vec<SkippedFile>,
}

/// Directory of frame files
#[derive(Debug, Clone)]
pub struct FrameStore {
    dir: PathBuf,
}

impl FrameStore {
    /// Open an existing directory for reading
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, Error> {
        let dir = dir.into();
        let meta = fs::metadata(&dir).map_err(|e| Error::UnreadableInput {
            path: dir.clone(),
            reason: e.to_string(),
        })?;
        if !meta.is_dir() {
            return Err(Error::UnreadableInput {
                path: dir,
                reason: "not a directory".to_string(),
            });
        }
        Ok(Self { dir })
    }

    /// Open a directory for writing, creating it if needed
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self, Error> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| Error::IoFailure(format!("create {:?}: {}", dir, e)))?;
        Ok(Self { dir })
    }

    /// Store directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name of a frame
    pub fn frame_file_name(frame: &Frame) -> String {
        let (stripe, slot) = frame.position();
        format!(
            "{}-{:08}-{:03}.{}",
            frame.archive_id(),
            stripe,
            slot,
            FRAME_FILE_EXTENSION
        )
    }

    /// Persist one frame; frames are never overwritten
    ///
    /// An existing file with the same bytes is left alone. An existing file
    /// with different bytes is an `IoFailure`.
    pub fn write_frame(&self, frame: &Frame) -> Result<WriteOutcome, Error> {
        let bytes = encode_frame(frame)?;
        let path = self.dir.join(Self::frame_file_name(frame));

        if path.exists() {
            return compare_existing(&path, &bytes);
        }

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        match tmp.persist_noclobber(&path) {
            Ok(_) => Ok(WriteOutcome::Written),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                compare_existing(&path, &bytes)
            }
            Err(e) => Err(Error::IoFailure(format!("persist {:?}: {}", path, e.error))),
        }
    }

    /// Persist frames in order
    pub fn write_frames(&self, frames: &[Frame]) -> Result<WriteSummary, Error> {
        let mut summary = WriteSummary::default();
        for frame in frames {
            match self.write_frame(frame)? {
                WriteOutcome::Written => summary.written += 1,
                WriteOutcome::AlreadyPresent => summary.already_present += 1,
            }
        }
        Ok(summary)
    }

    /// Load every valid frame in the directory
    ///
    /// Subdirectories, symlinks, files too small or too large to be a frame
    /// and files that fail to parse are skipped and reported.
    pub fn read_frames(&self) -> Result<LoadedFrames, Error> {
        let mut paths = Vec::new();
        let listing = fs::read_dir(&self.dir).map_err(|e| Error::UnreadableInput {
            path: self.dir.clone(),
            reason: e.to_string(),
        })?;
        for entry in listing {
            let entry = entry.map_err(|e| Error::UnreadableInput {
                path: self.dir.clone(),
                reason: e.to_string(),
            })?;
            paths.push(entry.path());
        }
        paths.sort();

        let mut loaded = LoadedFrames::default();
        for path in paths {
            match load_frame(&path) {
                Ok(frame) => loaded.frames.push(frame),
                Err(reason) => {
                    #[cfg(feature = "logging")]
                    if is_manifest(&path) {
                        debug!("Skipping manifest {:?}", path);
                    } else {
                        warn!("Skipping {:?}: {}", path, reason);
                    }
                    loaded.skipped.push(SkippedFile { path, reason });
                }
            }
        }

        #[cfg(feature = "logging")]
        debug!(
            "Loaded {} frames from {:?} ({} files skipped)",
            loaded.frames.len(),
            self.dir,
            loaded.skipped.len()
        );

        Ok(loaded)
    }
}

/// Write `bytes` to `path` through a temporary file in the same directory
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| Error::IoFailure(format!("persist {:?}: {}", path, e.error)))?;
    Ok(())
}

fn compare_existing(path: &Path, bytes: &[u8]) -> Result<WriteOutcome, Error> {
    let existing = fs::read(path)?;
    if existing == bytes {
        Ok(WriteOutcome::AlreadyPresent)
    } else {
        Err(Error::IoFailure(format!(
            "{:?} exists with different content",
            path
        )))
    }
}

fn load_frame(path: &Path) -> Result<Frame, String> {
    let meta = fs::symlink_metadata(path).map_err(|e| e.to_string())?;
    if !meta.is_file() {
        return Err("not a regular file".to_string());
    }
    let len = meta.len();
    if len < HEADER_SIZE as u64 || len > MAX_FRAME_SIZE as u64 {
        return Err(format!("size {} cannot be a frame", len));
    }

    let data = fs::read(path).map_err(|e| e.to_string())?;
    decode_frame_from_bytes_zero_copy(Bytes::from(data)).map_err(|e| e.to_string())
}

#[cfg(feature = "logging")]
fn is_manifest(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(crate::constants::MANIFEST_SUFFIX))
}
