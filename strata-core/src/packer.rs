//! Archive packer: file or directory tree to [`ArchiveStream`]

use crate::archive::{canonical_header, stored_link_target, ArchiveStream, Entry};
use crate::error::Error;
use std::fs::{self, Metadata};
use std::io;
use std::path::{Component, Path};
use walkdir::WalkDir;

#[cfg(feature = "logging")]
use tracing::{debug, info};

#[cfg(not(unix))]
const DEFAULT_FILE_MODE: u32 = 0o644;
#[cfg(not(unix))]
const DEFAULT_DIR_MODE: u32 = 0o755;
#[cfg(not(unix))]
const DEFAULT_LINK_MODE: u32 = 0o777;

/// Pack a file, symlink or directory into an archive stream
///
/// A directory yields an entry for itself followed by every descendant,
/// sorted by full archive path. Symlinks are recorded, never followed.
/// Packing an unchanged tree twice gives identical streams.
///
/// # Errors
/// * `UnreadableInput` - an entry cannot be listed or read, has a non-UTF-8
///   name or target, or is a socket, FIFO or device
/// * `PathTooLong` - an archive path or link target does not fit a ustar header
/// * `Inconsistent` - an entry vanished or changed size during the walk
pub fn pack(root: &Path) -> Result<ArchiveStream, Error> {
    let meta = fs::symlink_metadata(root).map_err(|e| Error::UnreadableInput {
        path: root.to_path_buf(),
        reason: e.to_string(),
    })?;
    let root_name = root_name(root)?;

    #[cfg(feature = "logging")]
    debug!("Packing {:?} as {}", root, root_name);

    let mut entries = vec![read_entry(root, root_name.clone(), &meta)?];

    if meta.is_dir() {
        for item in WalkDir::new(root).follow_links(false).min_depth(1) {
            let item = item.map_err(|e| walk_error(root, e))?;
            let path = item.path();
            let archive_path = archive_path(&root_name, root, path)?;
            let meta = item.metadata().map_err(|e| walk_error(path, e))?;
            entries.push(read_entry(path, archive_path, &meta)?);
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
    }

    let stream = ArchiveStream::new(entries);

    #[cfg(feature = "logging")]
    info!(
        "Packed {} entries ({} content bytes) from {:?}",
        stream.len(),
        stream.content_bytes(),
        root
    );

    Ok(stream)
}

fn read_entry(path: &Path, archive_path: String, meta: &Metadata) -> Result<Entry, Error> {
    let file_type = meta.file_type();
    let mode = permission_bits(meta);

    let entry = if file_type.is_dir() {
        Entry::directory(archive_path, mode)
    } else if file_type.is_symlink() {
        let target = fs::read_link(path).map_err(|e| io_error(path, e))?;
        let target = target.to_str().ok_or_else(|| Error::UnreadableInput {
            path: path.to_path_buf(),
            reason: "symlink target is not valid UTF-8".to_string(),
        })?;
        Entry::symlink(archive_path, stored_link_target(target)?, mode)
    } else if file_type.is_file() {
        let content = fs::read(path).map_err(|e| io_error(path, e))?;
        if content.len() as u64 != meta.len() {
            return Err(Error::Inconsistent {
                path: path.to_path_buf(),
                reason: format!(
                    "size changed from {} to {} bytes",
                    meta.len(),
                    content.len()
                ),
            });
        }
        Entry::file(archive_path, mode, content)
    } else {
        return Err(Error::UnreadableInput {
            path: path.to_path_buf(),
            reason: "not a regular file, directory or symlink".to_string(),
        });
    };

    canonical_header(&entry)?;

    #[cfg(feature = "logging")]
    debug!("  {} ({:o}, {} bytes)", entry.path, entry.mode, entry.size());

    Ok(entry)
}

/// Name of the root entry: the last component of the given path
fn root_name(root: &Path) -> Result<String, Error> {
    let name = match root.file_name() {
        Some(name) => Some(name.to_os_string()),
        None => fs::canonicalize(root)
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_os_string())),
    };

    match name {
        Some(name) => name.into_string().map_err(|_| Error::UnreadableInput {
            path: root.to_path_buf(),
            reason: "name is not valid UTF-8".to_string(),
        }),
        None => Ok("input".to_string()),
    }
}

fn archive_path(root_name: &str, root: &Path, path: &Path) -> Result<String, Error> {
    let relative = path.strip_prefix(root).map_err(|_| Error::UnreadableInput {
        path: path.to_path_buf(),
        reason: "entry is outside the packed root".to_string(),
    })?;

    let mut out = root_name.to_string();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            let part = part.to_str().ok_or_else(|| Error::UnreadableInput {
                path: path.to_path_buf(),
                reason: "name is not valid UTF-8".to_string(),
            })?;
            out.push('/');
            out.push_str(part);
        }
    }
    Ok(out)
}

#[cfg(unix)]
fn permission_bits(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permission_bits(meta: &Metadata) -> u32 {
    if meta.is_dir() {
        DEFAULT_DIR_MODE
    } else if meta.file_type().is_symlink() {
        DEFAULT_LINK_MODE
    } else if meta.permissions().readonly() {
        DEFAULT_FILE_MODE & !0o222
    } else {
        DEFAULT_FILE_MODE
    }
}

/// `NotFound` after the entry was listed means the tree changed under us
fn io_error(path: &Path, err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::NotFound {
        Error::Inconsistent {
            path: path.to_path_buf(),
            reason: "entry disappeared".to_string(),
        }
    } else {
        Error::UnreadableInput {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }
}

fn walk_error(fallback: &Path, err: walkdir::Error) -> Error {
    let path = err.path().unwrap_or(fallback).to_path_buf();
    match err.io_error().map(io::Error::kind) {
        Some(io::ErrorKind::NotFound) => Error::Inconsistent {
            path,
            reason: "entry disappeared".to_string(),
        },
        _ => Error::UnreadableInput {
            path,
            reason: err.to_string(),
        },
    }
}
