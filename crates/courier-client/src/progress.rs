//! Progress reporting from a transfer back to its queue.

use tokio::sync::mpsc;

use crate::entry::{AttemptId, EntryId};
use crate::worker::{WorkerEvent, WorkerEventKind};

/// Highest percentage a transfer may report before the server has answered.
pub const MAX_IN_FLIGHT_PERCENT: u8 = 99;

/// Reports byte progress for one attempt.
///
/// Percentages only ever increase and stay below 100; the queue sets 100
/// when the attempt succeeds.
#[derive(Debug)]
pub struct ProgressSink {
    entry: EntryId,
    attempt: AttemptId,
    tx: mpsc::UnboundedSender<WorkerEvent>,
    last: u8,
}

impl ProgressSink {
    pub(crate) fn new(
        entry: EntryId,
        attempt: AttemptId,
        tx: mpsc::UnboundedSender<WorkerEvent>,
    ) -> Self {
        Self {
            entry,
            attempt,
            tx,
            last: 0,
        }
    }

    /// Record that `sent` of `total` bytes have been handed to the connection.
    pub fn report(&mut self, sent: u64, total: u64) {
        if total == 0 {
            return;
        }
        let percent = (sent.min(total).saturating_mul(100) / total) as u8;
        let percent = percent.min(MAX_IN_FLIGHT_PERCENT);
        if percent <= self.last {
            return;
        }
        self.last = percent;
        // The queue may already be gone; progress is best effort.
        let _ = self.tx.send(WorkerEvent {
            entry: self.entry,
            attempt: self.attempt,
            kind: WorkerEventKind::Progress(percent),
        });
    }

    pub fn last_percent(&self) -> u8 {
        self.last
    }
}
