//! Shared helpers for the `courier` command-line client.

use std::path::{Path, PathBuf};

use courier_client::CandidateFile;

/// A path that could not be turned into a candidate file.
#[derive(Debug)]
pub struct Unreadable {
    pub path: PathBuf,
    pub reason: String,
}

/// Stat every path; anything that is not a readable regular file is reported separately.
pub fn load_candidates<P: AsRef<Path>>(paths: &[P]) -> (Vec<CandidateFile>, Vec<Unreadable>) {
    let mut candidates = Vec::new();
    let mut unreadable = Vec::new();

    for path in paths {
        let path = path.as_ref();
        match CandidateFile::from_path(path) {
            Ok(candidate) => candidates.push(candidate),
            Err(e) => unreadable.push(Unreadable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }),
        }
    }

    (candidates, unreadable)
}

/// Human-readable byte count (binary units, one decimal).
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Tally of one CLI run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub uploaded: usize,
    pub failed: usize,
    pub rejected: usize,
}

impl Summary {
    /// Exit status: zero only when every requested file made it.
    pub fn exit_code(&self) -> i32 {
        if self.failed == 0 && self.rejected == 0 {
            0
        } else {
            1
        }
    }
}

/// What a Ctrl-C during an upload run should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnInterrupt {
    /// Cancel the transfers and wait for them to settle.
    Abort,
    /// Quit without waiting.
    Exit,
}

/// Counts Ctrl-C presses: the first aborts, any later one exits.
#[derive(Debug, Default)]
pub struct Interrupts {
    seen: usize,
}

impl Interrupts {
    pub fn record(&mut self) -> OnInterrupt {
        self.seen += 1;
        if self.seen == 1 {
            OnInterrupt::Abort
        } else {
            OnInterrupt::Exit
        }
    }
}

/// Initialize tracing for the CLI binary.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
