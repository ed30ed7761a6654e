//! Transfer worker: runs one attempt for one entry.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use courier_core::UploadResponse;
use futures::FutureExt;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::entry::{AttemptId, EntryId};
use crate::error::TransferError;
use crate::progress::ProgressSink;
use crate::transport::{Transport, UploadFile};

/// Message from a worker to its queue, tagged with the attempt that sent it.
#[derive(Debug)]
pub(crate) struct WorkerEvent {
    pub entry: EntryId,
    pub attempt: AttemptId,
    pub kind: WorkerEventKind,
}

#[derive(Debug)]
pub(crate) enum WorkerEventKind {
    Progress(u8),
    Completed(UploadResponse),
    Failed(TransferError),
    /// `started` is false when the attempt never got a transfer slot.
    Cancelled { started: bool },
}

pub(crate) struct Worker<T: Transport> {
    pub transport: Arc<T>,
    pub permits: Arc<Semaphore>,
    pub cancel: CancellationToken,
    pub events: mpsc::UnboundedSender<WorkerEvent>,
}

impl<T: Transport> Worker<T> {
    /// Wait for a slot, transfer, and send exactly one terminal event.
    pub async fn run(self, entry: EntryId, attempt: AttemptId, file: UploadFile) {
        let kind = self.transfer(entry, attempt, &file).await;

        match &kind {
            WorkerEventKind::Completed(_) => {
                tracing::info!(entry = %entry, name = %file.name, "Upload completed")
            }
            WorkerEventKind::Failed(e) => {
                tracing::warn!(entry = %entry, name = %file.name, error = %e, "Upload failed")
            }
            WorkerEventKind::Cancelled { started } => {
                tracing::debug!(entry = %entry, name = %file.name, started, "Upload cancelled")
            }
            WorkerEventKind::Progress(_) => {}
        }

        let _ = self.events.send(WorkerEvent {
            entry,
            attempt,
            kind,
        });
    }

    async fn transfer(&self, entry: EntryId, attempt: AttemptId, file: &UploadFile) -> WorkerEventKind {
        let _permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return WorkerEventKind::Cancelled { started: false },
            permit = self.permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return WorkerEventKind::Cancelled { started: false },
            },
        };

        tracing::debug!(entry = %entry, name = %file.name, size_bytes = file.size_bytes, "Upload started");

        let sink = ProgressSink::new(entry, attempt, self.events.clone());

        // Dropping the send future on cancellation aborts the request.
        let send = AssertUnwindSafe(self.transport.send(file, sink)).catch_unwind();
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => WorkerEventKind::Cancelled { started: true },
            result = send => match result {
                Ok(Ok(response)) => WorkerEventKind::Completed(response),
                Ok(Err(e)) => WorkerEventKind::Failed(e),
                Err(panic) => WorkerEventKind::Failed(TransferError::Internal(panic_message(&*panic))),
            },
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("transport panicked: {}", msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("transport panicked: {}", msg)
    } else {
        "transport panicked".to_string()
    }
}
