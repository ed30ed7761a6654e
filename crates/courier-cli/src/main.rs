//! Courier CLI: upload files to the ingestion service and print their links.
//!
//! Reads COURIER_API_URL, COURIER_MAX_CONCURRENT_UPLOADS and
//! COURIER_REQUEST_TIMEOUT_SECS; flags override them.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use anyhow::Context;
use clap::{Parser, Subcommand};
use courier_cli::{format_size, init_tracing, load_candidates, Interrupts, OnInterrupt, Summary};
use courier_client::{ClientConfig, EntryId, HttpTransport, QueueEvent, UploadQueue};
use courier_core::UploadPolicy;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Conventional status for a process stopped by SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

type Signal = Pin<Box<dyn Future<Output = std::io::Result<()>> + Send>>;

#[derive(Parser)]
#[command(name = "courier", about = "Courier upload client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload files and print a retrieval link for each
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Ingestion service base URL
        #[arg(long, value_name = "URL")]
        server: Option<String>,
        /// Transfers in flight at once (1 uploads sequentially)
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,
    },
    /// Check files against the upload policy without sending anything
    Check {
        /// Files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let summary = match cli.command {
        Commands::Upload {
            files,
            server,
            concurrency,
        } => {
            let mut config = ClientConfig::from_env()?;
            if let Some(server) = server {
                config.api_url = server;
            }
            if let Some(concurrency) = concurrency {
                anyhow::ensure!(concurrency > 0, "--concurrency must be greater than 0");
                config.max_concurrent_uploads = concurrency;
            }
            upload(&config, &files).await?
        }
        Commands::Check { files } => check(&files),
    };

    tracing::debug!(?summary, "Finished");
    std::process::exit(summary.exit_code());
}

fn check(files: &[PathBuf]) -> Summary {
    let policy = UploadPolicy::default();
    let (candidates, unreadable) = load_candidates(files);
    let mut summary = Summary {
        failed: unreadable.len(),
        ..Default::default()
    };

    for item in &unreadable {
        eprintln!("✗ {}: {}", item.path.display(), item.reason);
    }
    for candidate in &candidates {
        match policy.validate(&candidate.declared_type, candidate.size_bytes) {
            Ok(()) => println!(
                "✓ {} ({}, {})",
                candidate.name,
                candidate.declared_type,
                format_size(candidate.size_bytes)
            ),
            Err(violation) => {
                summary.rejected += 1;
                println!("✗ {}: {}", candidate.name, violation);
            }
        }
    }

    summary
}

async fn upload(config: &ClientConfig, files: &[PathBuf]) -> anyhow::Result<Summary> {
    let transport = HttpTransport::from_config(config).context("Failed to create upload client")?;
    let mut queue = UploadQueue::new(transport, config.max_concurrent_uploads);
    tracing::info!(
        server = %config.api_url,
        concurrency = config.max_concurrent_uploads,
        "Uploading {} file(s)",
        files.len()
    );

    let (candidates, unreadable) = load_candidates(files);
    let outcome = queue.add(candidates);

    let mut summary = Summary {
        failed: unreadable.len(),
        rejected: outcome.rejected.len(),
        ..Default::default()
    };
    for item in &unreadable {
        eprintln!("✗ {}: {}", item.path.display(), item.reason);
    }
    for rejection in &outcome.rejected {
        eprintln!("✗ {}: {}", rejection.name, rejection.violation);
    }

    let progress = MultiProgress::new();
    let style = ProgressStyle::with_template("{prefix:.bold} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
        .context("Invalid progress template")?
        .progress_chars("=>-");

    let mut bars: HashMap<EntryId, ProgressBar> = HashMap::new();
    for entry in queue.entries() {
        let bar = progress.add(ProgressBar::new(100));
        bar.set_style(style.clone());
        bar.set_prefix(entry.name().to_string());
        bars.insert(entry.id(), bar);
    }

    queue.upload_all();

    let mut interrupts = Interrupts::default();
    let mut interrupt: Signal = Box::pin(tokio::signal::ctrl_c());
    loop {
        let event = tokio::select! {
            event = queue.next_event() => event,
            result = &mut interrupt => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "Ctrl-C handler unavailable");
                    interrupt = Box::pin(std::future::pending());
                    continue;
                }
                interrupt = Box::pin(tokio::signal::ctrl_c());
                match interrupts.record() {
                    OnInterrupt::Abort => {
                        let cancelled = queue.abort();
                        tracing::warn!(cancelled, "Interrupted, aborting transfers (Ctrl-C again to quit)");
                    }
                    OnInterrupt::Exit => {
                        progress.println("Interrupted again, exiting")?;
                        std::process::exit(INTERRUPTED_EXIT_CODE);
                    }
                }
                continue;
            }
        };
        let Some(event) = event else { break };

        match event {
            QueueEvent::Progress { id, percent } => {
                if let Some(bar) = bars.get(&id) {
                    bar.set_position(percent as u64);
                }
            }
            QueueEvent::Completed { id, handle } => {
                summary.uploaded += 1;
                if let Some(bar) = bars.get(&id) {
                    bar.set_position(100);
                    bar.finish_with_message("done");
                }
                if let Some(entry) = queue.get(id) {
                    progress.println(format!("{} {}", entry.name(), handle))?;
                }
            }
            QueueEvent::Failed { id, error } => {
                summary.failed += 1;
                if let Some(bar) = bars.get(&id) {
                    bar.abandon_with_message(error.to_string());
                }
            }
            QueueEvent::Requeued { id } => {
                summary.failed += 1;
                if let Some(bar) = bars.get(&id) {
                    bar.abandon_with_message("not started");
                }
            }
        }
    }

    Ok(summary)
}
