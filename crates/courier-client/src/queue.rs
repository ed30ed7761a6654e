//! Upload queue: owns the file entries and drives their transfers.
//!
//! Entry lifecycle: `ready → uploading → done | error`. Transfers run as
//! spawned workers, at most `max_concurrent` at a time, and report back over
//! a channel. The queue applies those reports one at a time in
//! [`UploadQueue::next_event`]; a report whose `(entry, attempt)` pair is no
//! longer in flight (entry removed, cleared, or already finished) is dropped.

use std::collections::HashMap;
use std::sync::Arc;

use courier_core::UploadPolicy;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::entry::{AttemptId, CandidateFile, EntryId, EntryStatus, FileEntry, Rejection};
use crate::error::{QueueError, TransferError};
use crate::preview::Preview;
use crate::transport::{Transport, UploadFile};
use crate::worker::{Worker, WorkerEvent, WorkerEventKind};

/// Visible change produced by applying one worker report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    Progress { id: EntryId, percent: u8 },
    Completed { id: EntryId, handle: String },
    Failed { id: EntryId, error: TransferError },
    /// An aborted transfer that never started; the entry is `ready` again.
    Requeued { id: EntryId },
}

/// Result of [`UploadQueue::add`].
#[derive(Debug, Default)]
pub struct AddOutcome {
    pub accepted: Vec<EntryId>,
    pub rejected: Vec<Rejection>,
}

struct InFlight {
    attempt: AttemptId,
    cancel: CancellationToken,
}

pub struct UploadQueue<T: Transport> {
    transport: Arc<T>,
    policy: UploadPolicy,
    entries: Vec<FileEntry>,
    in_flight: HashMap<EntryId, InFlight>,
    events_tx: mpsc::UnboundedSender<WorkerEvent>,
    events_rx: mpsc::UnboundedReceiver<WorkerEvent>,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
    next_attempt: u64,
}

impl<T: Transport> UploadQueue<T> {
    /// Queue with the default upload policy. `max_concurrent` is clamped to at least 1.
    pub fn new(transport: T, max_concurrent: usize) -> Self {
        Self::with_policy(transport, max_concurrent, UploadPolicy::default())
    }

    pub fn with_policy(transport: T, max_concurrent: usize, policy: UploadPolicy) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            transport: Arc::new(transport),
            policy,
            entries: Vec::new(),
            in_flight: HashMap::new(),
            events_tx,
            events_rx,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            cancel: CancellationToken::new(),
            next_attempt: 0,
        }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Check each candidate against the policy. Accepted ones become `ready`
    /// entries in the given order; rejected ones are returned with their reason.
    pub fn add(&mut self, candidates: impl IntoIterator<Item = CandidateFile>) -> AddOutcome {
        let mut outcome = AddOutcome::default();

        for candidate in candidates {
            if let Err(violation) = self
                .policy
                .validate(&candidate.declared_type, candidate.size_bytes)
            {
                tracing::info!(
                    name = %candidate.name,
                    reason = violation.reason_code(),
                    "File rejected"
                );
                outcome.rejected.push(Rejection {
                    name: candidate.name,
                    violation,
                });
                continue;
            }

            let preview = match Preview::for_candidate(&candidate) {
                Ok(preview) => preview,
                Err(e) => {
                    tracing::warn!(name = %candidate.name, error = %e, "Failed to create preview");
                    None
                }
            };

            let entry = FileEntry::new(candidate, preview);
            tracing::debug!(entry = %entry.id(), name = %entry.name(), "File queued");
            outcome.accepted.push(entry.id());
            self.entries.push(entry);
        }

        outcome
    }

    /// Remove an entry in any state, aborting its transfer. Unknown ids are ignored.
    pub fn remove(&mut self, id: EntryId) -> bool {
        if let Some(flight) = self.in_flight.remove(&id) {
            flight.cancel.cancel();
        }
        match self.entries.iter().position(|e| e.id() == id) {
            Some(index) => {
                let entry = self.entries.remove(index);
                tracing::debug!(entry = %id, name = %entry.name(), "File removed");
                true
            }
            None => false,
        }
    }

    /// Remove every entry, aborting all transfers.
    pub fn clear(&mut self) {
        for (_, flight) in self.in_flight.drain() {
            flight.cancel.cancel();
        }
        self.entries.clear();
    }

    /// Start a transfer for every `ready` entry. Entries already uploading
    /// are left alone, so calling this again never double-submits.
    /// Must be called within a tokio runtime.
    pub fn upload_all(&mut self) -> Vec<EntryId> {
        let mut started = Vec::new();

        for index in 0..self.entries.len() {
            if self.entries[index].status != EntryStatus::Ready {
                continue;
            }

            self.next_attempt += 1;
            let attempt = AttemptId(self.next_attempt);
            let cancel = self.cancel.child_token();

            let entry = &mut self.entries[index];
            entry.status = EntryStatus::Uploading;
            entry.progress_percent = 0;
            entry.last_error = None;

            let id = entry.id();
            let file = UploadFile {
                name: entry.name().to_string(),
                declared_type: entry.declared_type().to_string(),
                size_bytes: entry.size_bytes(),
                source: entry.source.clone(),
            };

            self.in_flight.insert(
                id,
                InFlight {
                    attempt,
                    cancel: cancel.clone(),
                },
            );

            let worker = Worker {
                transport: self.transport.clone(),
                permits: self.permits.clone(),
                cancel,
                events: self.events_tx.clone(),
            };
            tokio::spawn(worker.run(id, attempt, file));
            started.push(id);
        }

        if !started.is_empty() {
            tracing::info!(count = started.len(), "Uploads started");
        }
        started
    }

    /// Move an `error` entry back to `ready` so the next `upload_all` retries it.
    pub fn resubmit(&mut self, id: EntryId) -> Result<(), QueueError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id() == id)
            .ok_or(QueueError::UnknownEntry(id))?;

        if entry.status != EntryStatus::Error {
            return Err(QueueError::NotResubmittable {
                id,
                status: entry.status,
            });
        }

        entry.status = EntryStatus::Ready;
        entry.progress_percent = 0;
        entry.last_error = None;
        Ok(())
    }

    /// Cancel every in-flight transfer. Transfers still waiting for a slot
    /// return to `ready`; started ones end in `error` with [`TransferError::Aborted`].
    /// The outcomes arrive through [`next_event`](Self::next_event).
    pub fn abort(&mut self) -> usize {
        let count = self.in_flight.len();
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        if count > 0 {
            tracing::info!(count, "Uploads aborted");
        }
        count
    }

    /// Wait for and apply the next worker report that changes an entry.
    /// Returns `None` once nothing is in flight.
    pub async fn next_event(&mut self) -> Option<QueueEvent> {
        while !self.in_flight.is_empty() {
            let event = self.events_rx.recv().await?;
            if let Some(visible) = self.apply(event) {
                return Some(visible);
            }
        }
        None
    }

    /// Drive the queue until every transfer has finished.
    pub async fn run_until_idle(&mut self) -> Vec<QueueEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await {
            events.push(event);
        }
        events
    }

    fn apply(&mut self, event: WorkerEvent) -> Option<QueueEvent> {
        let current = self.in_flight.get(&event.entry).map(|f| f.attempt);
        if current != Some(event.attempt) {
            tracing::debug!(entry = %event.entry, "Discarding stale worker event");
            return None;
        }

        let id = event.entry;
        let terminal = !matches!(event.kind, WorkerEventKind::Progress(_));
        if terminal {
            self.in_flight.remove(&id);
        }
        let entry = self.entries.iter_mut().find(|e| e.id() == id)?;

        match event.kind {
            WorkerEventKind::Progress(percent) => {
                if percent <= entry.progress_percent {
                    return None;
                }
                entry.progress_percent = percent;
                Some(QueueEvent::Progress { id, percent })
            }
            WorkerEventKind::Completed(response) => {
                entry.status = EntryStatus::Done;
                entry.progress_percent = 100;
                entry.retrieval_handle = Some(response.file_url.clone());
                Some(QueueEvent::Completed {
                    id,
                    handle: response.file_url,
                })
            }
            WorkerEventKind::Failed(error) => {
                entry.status = EntryStatus::Error;
                entry.last_error = Some(error.clone());
                Some(QueueEvent::Failed { id, error })
            }
            WorkerEventKind::Cancelled { started: false } => {
                entry.status = EntryStatus::Ready;
                entry.progress_percent = 0;
                Some(QueueEvent::Requeued { id })
            }
            WorkerEventKind::Cancelled { started: true } => {
                entry.status = EntryStatus::Error;
                entry.last_error = Some(TransferError::Aborted);
                Some(QueueEvent::Failed {
                    id,
                    error: TransferError::Aborted,
                })
            }
        }
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn get(&self, id: EntryId) -> Option<&FileEntry> {
        self.entries.iter().find(|e| e.id() == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of transfers that have not yet reported a terminal outcome.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressSink;
    use async_trait::async_trait;
    use courier_core::{PolicyViolation, UploadResponse};
    use std::sync::Mutex;
    use std::time::Duration;

    const MIB: usize = 1024 * 1024;

    /// Behaviour is chosen by file name prefix:
    /// `fail` answers 500 after 40%, `flaky` fails on its first attempt only,
    /// `hang` never answers, `boom` panics, anything else succeeds after 50%.
    #[derive(Default)]
    struct MockTransport {
        calls: Mutex<Vec<String>>,
    }

    impl MockTransport {
        fn calls_for(&self, name: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|n| *n == name).count()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(
            &self,
            file: &UploadFile,
            mut progress: ProgressSink,
        ) -> Result<UploadResponse, TransferError> {
            let attempt = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(file.name.clone());
                calls.iter().filter(|n| **n == file.name).count()
            };

            if file.name.starts_with("boom") {
                progress.report(30, 100);
                panic!("transport bug");
            }
            if file.name.starts_with("hang") {
                progress.report(10, 100);
                std::future::pending::<()>().await;
            }
            if file.name.starts_with("fail") || (file.name.starts_with("flaky") && attempt == 1) {
                progress.report(40, 100);
                tokio::task::yield_now().await;
                return Err(TransferError::Status {
                    code: 500,
                    message: "Failed to store file, try again later".to_string(),
                });
            }

            progress.report(50, 100);
            tokio::task::yield_now().await;
            progress.report(100, 100);
            Ok(UploadResponse {
                message: "File uploaded successfully".to_string(),
                file_url: format!("https://store.example/{}?sig=abc", file.name),
                key: None,
                expires_at: None,
            })
        }
    }

    fn queue(max_concurrent: usize) -> UploadQueue<MockTransport> {
        UploadQueue::new(MockTransport::default(), max_concurrent)
    }

    fn png(name: &str, len: usize) -> CandidateFile {
        CandidateFile::from_bytes(name, "image/png", vec![0u8; len])
    }

    fn txt(name: &str) -> CandidateFile {
        CandidateFile::from_bytes(name, "text/plain", b"hello".to_vec())
    }

    #[tokio::test]
    async fn oversized_jpeg_is_rejected_at_selection() {
        let mut q = queue(3);
        let outcome = q.add(vec![CandidateFile::from_bytes(
            "big.jpg",
            "image/jpeg",
            vec![0u8; 6 * 1000 * 1000],
        )]);

        assert!(outcome.accepted.is_empty());
        assert_eq!(outcome.rejected.len(), 1);
        assert!(matches!(
            outcome.rejected[0].violation,
            PolicyViolation::TooLarge { .. }
        ));
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn unsupported_type_is_rejected_with_reason() {
        let mut q = queue(3);
        let outcome = q.add(vec![
            CandidateFile::from_bytes("a.gif", "image/gif", vec![0u8; 4]),
            txt("ok.txt"),
        ]);

        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.rejected[0].name, "a.gif");
        assert_eq!(outcome.rejected[0].violation.reason_code(), "UNSUPPORTED_TYPE");
        assert_eq!(q.len(), 1);
    }

    #[tokio::test]
    async fn png_goes_ready_uploading_done() {
        let mut q = queue(3);
        let id = q.add(vec![png("photo.png", 2 * MIB)]).accepted[0];
        assert_eq!(q.get(id).unwrap().status(), EntryStatus::Ready);

        let started = q.upload_all();
        assert_eq!(started, vec![id]);
        assert_eq!(q.get(id).unwrap().status(), EntryStatus::Uploading);

        let events = q.run_until_idle().await;

        let entry = q.get(id).unwrap();
        assert_eq!(entry.status(), EntryStatus::Done);
        assert_eq!(entry.progress_percent(), 100);
        assert!(!entry.retrieval_handle().unwrap().is_empty());

        let percents: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                QueueEvent::Progress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![50, 99]);
        assert!(matches!(events.last(), Some(QueueEvent::Completed { .. })));
    }

    #[tokio::test]
    async fn upload_all_twice_submits_each_entry_once() {
        let mut q = queue(3);
        q.add(vec![txt("a.txt"), txt("b.txt")]);

        let first = q.upload_all();
        let second = q.upload_all();
        assert_eq!(first.len(), 2);
        assert!(second.is_empty());

        q.run_until_idle().await;
        assert_eq!(q.transport.calls_for("a.txt"), 1);
        assert_eq!(q.transport.calls_for("b.txt"), 1);
        assert!(q.entries().iter().all(|e| e.status() == EntryStatus::Done));
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let mut q = queue(3);
        let ids = q.add(vec![txt("a.txt"), txt("b.txt")]).accepted;

        assert!(q.remove(ids[0]));
        assert_eq!(q.len(), 1);
        assert!(!q.remove(ids[0]));
        assert_eq!(q.len(), 1);
    }

    #[tokio::test]
    async fn removed_entry_is_not_resurrected() {
        let mut q = queue(3);
        let ids = q.add(vec![png("hang.png", 1024), txt("ok.txt")]).accepted;

        q.upload_all();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(q.remove(ids[0]));
        assert_eq!(q.in_flight(), 1);

        let events = tokio::time::timeout(Duration::from_secs(5), q.run_until_idle())
            .await
            .expect("queue should go idle");

        assert!(events.iter().all(|e| !matches!(
            e,
            QueueEvent::Progress { id, .. } | QueueEvent::Failed { id, .. } if *id == ids[0]
        )));
        assert!(q.get(ids[0]).is_none());
        assert_eq!(q.get(ids[1]).unwrap().status(), EntryStatus::Done);
        assert_eq!(q.len(), 1);
    }

    #[tokio::test]
    async fn failure_does_not_affect_siblings() {
        let mut q = queue(3);
        let ids = q
            .add(vec![txt("fail.txt"), txt("good.txt"), png("also-good.png", 10)])
            .accepted;

        q.upload_all();
        q.run_until_idle().await;

        let failed = q.get(ids[0]).unwrap();
        assert_eq!(failed.status(), EntryStatus::Error);
        assert_eq!(failed.progress_percent(), 40);
        assert!(failed.retrieval_handle().is_none());
        assert!(matches!(
            failed.last_error(),
            Some(TransferError::Status { code: 500, .. })
        ));

        assert_eq!(q.get(ids[1]).unwrap().status(), EntryStatus::Done);
        assert_eq!(q.get(ids[2]).unwrap().status(), EntryStatus::Done);
    }

    #[tokio::test]
    async fn error_entry_can_be_resubmitted() {
        let mut q = queue(3);
        let id = q.add(vec![txt("flaky.txt")]).accepted[0];

        q.upload_all();
        q.run_until_idle().await;
        assert_eq!(q.get(id).unwrap().status(), EntryStatus::Error);

        // Failed entries are not retried automatically.
        assert!(q.upload_all().is_empty());

        q.resubmit(id).unwrap();
        assert_eq!(q.get(id).unwrap().status(), EntryStatus::Ready);
        assert_eq!(q.upload_all(), vec![id]);
        q.run_until_idle().await;

        let entry = q.get(id).unwrap();
        assert_eq!(entry.status(), EntryStatus::Done);
        assert!(entry.last_error().is_none());
        assert_eq!(q.transport.calls_for("flaky.txt"), 2);
    }

    #[tokio::test]
    async fn resubmit_rejects_other_states() {
        let mut q = queue(3);
        let id = q.add(vec![txt("a.txt")]).accepted[0];

        assert_eq!(
            q.resubmit(id),
            Err(QueueError::NotResubmittable {
                id,
                status: EntryStatus::Ready
            })
        );

        q.remove(id);
        assert_eq!(q.resubmit(id), Err(QueueError::UnknownEntry(id)));
    }

    #[tokio::test]
    async fn abort_requeues_waiting_and_fails_started() {
        let mut q = queue(1);
        let ids = q.add(vec![txt("hang-1.txt"), txt("hang-2.txt")]).accepted;

        q.upload_all();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(q.abort(), 2);

        let events = tokio::time::timeout(Duration::from_secs(5), q.run_until_idle())
            .await
            .expect("queue should go idle");
        assert_eq!(q.in_flight(), 0);

        let statuses: Vec<EntryStatus> = ids.iter().map(|id| q.get(*id).unwrap().status()).collect();
        assert_eq!(
            statuses.iter().filter(|s| **s == EntryStatus::Error).count(),
            1
        );
        assert_eq!(
            statuses.iter().filter(|s| **s == EntryStatus::Ready).count(),
            1
        );
        assert!(events.iter().any(|e| matches!(
            e,
            QueueEvent::Failed {
                error: TransferError::Aborted,
                ..
            }
        )));
        assert!(events
            .iter()
            .any(|e| matches!(e, QueueEvent::Requeued { .. })));
    }

    #[tokio::test]
    async fn queue_accepts_new_uploads_after_abort() {
        let mut q = queue(2);
        let hang = q.add(vec![txt("hang.txt")]).accepted[0];
        q.upload_all();
        q.abort();
        q.run_until_idle().await;

        // Never got a slot, so it is ready again rather than failed.
        assert_eq!(q.get(hang).unwrap().status(), EntryStatus::Ready);
        q.remove(hang);

        let id = q.add(vec![txt("after.txt")]).accepted[0];
        q.upload_all();
        q.run_until_idle().await;
        assert_eq!(q.get(id).unwrap().status(), EntryStatus::Done);
    }

    #[tokio::test]
    async fn sequential_queue_completes_in_submission_order() {
        let mut q = queue(1);
        let ids = q.add(vec![txt("1.txt"), txt("2.txt"), txt("3.txt")]).accepted;

        q.upload_all();
        let completed: Vec<EntryId> = q
            .run_until_idle()
            .await
            .into_iter()
            .filter_map(|e| match e {
                QueueEvent::Completed { id, .. } => Some(id),
                _ => None,
            })
            .collect();
        assert_eq!(completed, ids);
    }

    #[tokio::test]
    async fn stale_events_are_discarded() {
        let mut q = queue(1);
        let id = q.add(vec![txt("hang.txt")]).accepted[0];
        q.upload_all();

        let stale = WorkerEvent {
            entry: id,
            attempt: AttemptId(999),
            kind: WorkerEventKind::Failed(TransferError::Network("late".to_string())),
        };
        assert!(q.apply(stale).is_none());
        assert_eq!(q.get(id).unwrap().status(), EntryStatus::Uploading);

        q.clear();
        let after_clear = WorkerEvent {
            entry: id,
            attempt: AttemptId(1),
            kind: WorkerEventKind::Progress(80),
        };
        assert!(q.apply(after_clear).is_none());
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn previews_are_released_on_remove_and_clear() {
        let mut q = queue(3);
        let ids = q
            .add(vec![png("a.png", 16), png("b.png", 16), txt("c.txt")])
            .accepted;

        let a = q.get(ids[0]).unwrap().preview().unwrap().path().to_path_buf();
        let b = q.get(ids[1]).unwrap().preview().unwrap().path().to_path_buf();
        assert!(q.get(ids[2]).unwrap().preview().is_none());
        assert_ne!(a, b);
        assert!(a.exists() && b.exists());

        q.remove(ids[0]);
        assert!(!a.exists());
        assert!(b.exists());

        q.clear();
        assert!(!b.exists());
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn panicking_transport_fails_only_its_entry() {
        let mut q = queue(2);
        let ids = q.add(vec![txt("boom.txt"), txt("fine.txt")]).accepted;

        q.upload_all();
        tokio::time::timeout(Duration::from_secs(5), q.run_until_idle())
            .await
            .expect("queue should go idle");

        let boom = q.get(ids[0]).unwrap();
        assert_eq!(boom.status(), EntryStatus::Error);
        assert_eq!(boom.progress_percent(), 30);
        assert!(boom.retrieval_handle().is_none());
        match boom.last_error() {
            Some(TransferError::Internal(msg)) => assert!(msg.contains("transport bug")),
            other => panic!("Expected internal error, got {:?}", other),
        }

        assert_eq!(q.get(ids[1]).unwrap().status(), EntryStatus::Done);
        assert_eq!(q.in_flight(), 0);

        q.resubmit(ids[0]).unwrap();
        assert_eq!(q.get(ids[0]).unwrap().status(), EntryStatus::Ready);
    }
}
