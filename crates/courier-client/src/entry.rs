//! File entries and the candidates they are created from.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use courier_core::PolicyViolation;
use uuid::Uuid;

use crate::error::TransferError;
use crate::preview::Preview;

/// Stable identity of one queued file. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(Uuid);

impl EntryId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One transfer run for one entry; a resubmission gets a new attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Ready,
    Uploading,
    Done,
    Error,
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntryStatus::Ready => "ready",
            EntryStatus::Uploading => "uploading",
            EntryStatus::Done => "done",
            EntryStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Where a file's bytes come from.
#[derive(Debug, Clone)]
pub enum FileSource {
    Path(PathBuf),
    Memory(Bytes),
}

impl FileSource {
    pub async fn load(&self) -> io::Result<Bytes> {
        match self {
            FileSource::Path(path) => tokio::fs::read(path).await.map(Bytes::from),
            FileSource::Memory(bytes) => Ok(bytes.clone()),
        }
    }
}

/// A file the user selected, not yet checked against the upload policy.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub name: String,
    pub declared_type: String,
    pub size_bytes: u64,
    pub source: FileSource,
}

impl CandidateFile {
    /// Describe a file on disk. The declared type is guessed from the extension.
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let declared_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self {
            name,
            declared_type,
            size_bytes: metadata.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    pub fn from_bytes(
        name: impl Into<String>,
        declared_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            size_bytes: bytes.len() as u64,
            source: FileSource::Memory(bytes),
        }
    }
}

/// A candidate refused at selection time. It never enters the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub name: String,
    pub violation: PolicyViolation,
}

/// Client-side record of one accepted file.
#[derive(Debug)]
pub struct FileEntry {
    id: EntryId,
    name: String,
    declared_type: String,
    size_bytes: u64,
    pub(crate) source: FileSource,
    pub(crate) status: EntryStatus,
    pub(crate) progress_percent: u8,
    pub(crate) retrieval_handle: Option<String>,
    pub(crate) last_error: Option<TransferError>,
    pub(crate) preview: Option<Preview>,
}

impl FileEntry {
    pub(crate) fn new(candidate: CandidateFile, preview: Option<Preview>) -> Self {
        Self {
            id: EntryId::new(),
            name: candidate.name,
            declared_type: candidate.declared_type,
            size_bytes: candidate.size_bytes,
            source: candidate.source,
            status: EntryStatus::Ready,
            progress_percent: 0,
            retrieval_handle: None,
            last_error: None,
            preview,
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_type(&self) -> &str {
        &self.declared_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn status(&self) -> EntryStatus {
        self.status
    }

    /// Meaningful only while uploading or done.
    pub fn progress_percent(&self) -> u8 {
        self.progress_percent
    }

    /// Set only once the entry is done.
    pub fn retrieval_handle(&self) -> Option<&str> {
        self.retrieval_handle.as_deref()
    }

    pub fn last_error(&self) -> Option<&TransferError> {
        self.last_error.as_ref()
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }
}
