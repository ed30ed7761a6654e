pub mod handle;
pub mod ingest;

pub use handle::{RetrievalHandle, RetrievalHandleIssuer};
pub use ingest::{IncomingFile, IngestedFile, IngestionService};
