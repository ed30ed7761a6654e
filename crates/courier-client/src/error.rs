use crate::entry::{EntryId, EntryStatus};

/// Why one transfer attempt ended without a retrieval handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Server responded with status {code}: {message}")]
    Status { code: u16, message: String },

    #[error("Upload aborted")]
    Aborted,

    #[error("Invalid server response: {0}")]
    InvalidResponse(String),

    /// The local file could not be read or described.
    #[error("Could not read file: {0}")]
    Source(String),

    /// The transport itself failed, e.g. panicked mid-transfer.
    #[error("Upload failed unexpectedly: {0}")]
    Internal(String),
}

impl TransferError {
    /// Server-side faults (5xx) and network errors may succeed on resubmission.
    pub fn is_recoverable(&self) -> bool {
        match self {
            TransferError::Network(_) | TransferError::Aborted => true,
            TransferError::Status { code, .. } => *code >= 500,
            TransferError::InvalidResponse(_)
            | TransferError::Source(_)
            | TransferError::Internal(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("Unknown entry {0}")]
    UnknownEntry(EntryId),

    #[error("Entry {id} is {status} and cannot be resubmitted")]
    NotResubmittable { id: EntryId, status: EntryStatus },
}
