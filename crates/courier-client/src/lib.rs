//! Courier upload client
//!
//! Holds the files a user selected, pre-checks them against the shared upload
//! policy, and uploads them to the ingestion service with per-file progress.
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use courier_client::{CandidateFile, ClientConfig, HttpTransport, UploadQueue};
//!
//! let config = ClientConfig::from_env()?;
//! let mut queue = UploadQueue::new(HttpTransport::from_config(&config)?, config.max_concurrent_uploads);
//! let outcome = queue.add(vec![CandidateFile::from_path("photo.png")?]);
//! for rejected in &outcome.rejected {
//!     eprintln!("{}: {}", rejected.name, rejected.violation);
//! }
//! queue.upload_all();
//! while let Some(event) = queue.next_event().await {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod preview;
pub mod progress;
pub mod queue;
pub mod transport;
mod worker;

pub use config::ClientConfig;
pub use entry::{AttemptId, CandidateFile, EntryId, EntryStatus, FileEntry, FileSource, Rejection};
pub use error::{QueueError, TransferError};
pub use preview::Preview;
pub use progress::ProgressSink;
pub use queue::{AddOutcome, QueueEvent, UploadQueue};
pub use transport::{HttpTransport, Transport, UploadFile};
