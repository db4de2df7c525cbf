//! Archive stream model and its canonical tar serialization
//!
//! An [`ArchiveStream`] is the ordered list of entries produced by the packer.
//! Its byte form is a ustar stream with normalized metadata: owner 0:0,
//! mtime 0, no user or group names, content padded to 512 bytes and two
//! zero blocks at the end. Parsing is strict: bytes that would not
//! re-serialize to themselves are rejected, so a decoded archive is always
//! exactly what the packer emitted.

use crate::constants::{MAX_LINK_LEN, MAX_PATH_LEN};
use crate::error::Error;
use bytes::Bytes;
use std::io::Read;
use tar::{EntryType, Header};

/// Kind of an archive entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// Symbolic link, recorded but never followed
    Symlink {
        /// Link target as stored in the archive
        target: String,
    },
}

/// One entry of an archive stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// `/`-separated path; the first component is the packed root's name
    pub path: String,

    /// Entry kind
    pub kind: EntryKind,

    /// Permission bits (`mode & 0o7777`)
    pub mode: u32,

    /// File content; empty for directories and symlinks
    pub content: Bytes,
}

impl Entry {
    /// Regular file entry
    pub fn file(path: impl Into<String>, mode: u32, content: impl Into<Bytes>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
            mode,
            content: content.into(),
        }
    }

    /// Directory entry
    pub fn directory(path: impl Into<String>, mode: u32) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Directory,
            mode,
            content: Bytes::new(),
        }
    }

    /// Symlink entry
    pub fn symlink(path: impl Into<String>, target: impl Into<String>, mode: u32) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Symlink {
                target: target.into(),
            },
            mode,
            content: Bytes::new(),
        }
    }

    /// Content size in bytes
    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

/// Ordered archive entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveStream {
    entries: Vec<Entry>,
}

impl ArchiveStream {
    /// Wrap entries in stored order
    pub fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    /// Entries in stored order
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the archive has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Name of the packed root (first component of the first entry)
    pub fn root_name(&self) -> Option<&str> {
        self.entries
            .first()
            .and_then(|e| e.path.split('/').next())
    }

    /// Total file content bytes
    pub fn content_bytes(&self) -> u64 {
        self.entries.iter().map(Entry::size).sum()
    }

    /// Canonical tar bytes
    pub fn to_tar_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut builder = tar::Builder::new(Vec::new());
        for entry in &self.entries {
            let header = canonical_header(entry)?;
            builder.append(&header, &entry.content[..])?;
        }
        Ok(builder.into_inner()?)
    }

    /// Parse canonical tar bytes
    pub fn from_tar_bytes(data: &[u8]) -> Result<Self, Error> {
        let mut archive = tar::Archive::new(data);
        let mut entries = Vec::new();

        for item in archive.entries().map_err(corrupt)? {
            let mut item = item.map_err(corrupt)?;

            let entry_type = item.header().entry_type();
            let mode = item.header().mode().map_err(corrupt)?;
            let path = utf8(item.path_bytes().into_owned(), "entry path")?;

            let entry = match entry_type {
                EntryType::Regular => {
                    let mut content = Vec::new();
                    item.read_to_end(&mut content).map_err(corrupt)?;
                    Entry::file(path, mode, content)
                }
                EntryType::Directory => Entry::directory(path, mode),
                EntryType::Symlink => {
                    let target = item.link_name_bytes().ok_or_else(|| {
                        Error::CorruptArchive(format!("symlink {} has no target", path))
                    })?;
                    let target = utf8(target.into_owned(), "symlink target")?;
                    Entry::symlink(path, target, mode)
                }
                other => {
                    return Err(Error::CorruptArchive(format!(
                        "unsupported entry type {:?} for {}",
                        other, path
                    )))
                }
            };
            entries.push(entry);
        }

        let stream = Self { entries };
        let canonical = stream
            .to_tar_bytes()
            .map_err(|e| Error::CorruptArchive(e.to_string()))?;
        if canonical != data {
            return Err(Error::CorruptArchive(
                "archive is not in canonical form".to_string(),
            ));
        }

        Ok(stream)
    }
}

/// Re-serialize an archive stream into the tar container, entry by entry in
/// stored order.
pub fn unpack(stream: &ArchiveStream) -> Result<Vec<u8>, Error> {
    stream.to_tar_bytes()
}

/// Build the normalized ustar header for an entry
pub fn canonical_header(entry: &Entry) -> Result<Header, Error> {
    let too_long = || Error::PathTooLong {
        path: entry.path.clone(),
        len: entry.path.len(),
        max: MAX_PATH_LEN,
    };
    if entry.path.len() > MAX_PATH_LEN {
        return Err(too_long());
    }

    let mut header = Header::new_ustar();
    header.set_path(&entry.path).map_err(|_| too_long())?;
    header.set_mode(entry.mode);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(0);

    match &entry.kind {
        EntryKind::File => {
            header.set_entry_type(EntryType::Regular);
            header.set_size(entry.size());
        }
        EntryKind::Directory => {
            header.set_entry_type(EntryType::Directory);
            header.set_size(0);
        }
        EntryKind::Symlink { target } => {
            header.set_entry_type(EntryType::Symlink);
            header.set_size(0);
            set_link_target(&mut header, target)?;
        }
    }

    header.set_cksum();
    Ok(header)
}

/// The form a symlink target takes once stored in a header
pub fn stored_link_target(target: &str) -> Result<String, Error> {
    let mut header = Header::new_ustar();
    set_link_target(&mut header, target)?;
    let stored = header.link_name_bytes().unwrap_or_default().into_owned();
    utf8(stored, "symlink target")
}

fn set_link_target(header: &mut Header, target: &str) -> Result<(), Error> {
    let too_long = || Error::PathTooLong {
        path: target.to_string(),
        len: target.len(),
        max: MAX_LINK_LEN,
    };
    if target.len() > MAX_LINK_LEN {
        return Err(too_long());
    }
    header.set_link_name(target).map_err(|_| too_long())
}

fn utf8(bytes: Vec<u8>, what: &str) -> Result<String, Error> {
    String::from_utf8(bytes).map_err(|_| Error::CorruptArchive(format!("{} is not UTF-8", what)))
}

fn corrupt(err: std::io::Error) -> Error {
    Error::CorruptArchive(err.to_string())
}
