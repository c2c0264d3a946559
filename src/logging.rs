//! Tracing setup: stderr plus a per-run log file in the data directory

use std::fs::{self, File};
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

fn default_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("nuget_package_scanner=debug,info")
    } else {
        EnvFilter::new("info")
    }
}

/// Open `path` for this run's log, replacing the previous run's file
fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    File::create(path)
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the default filter. When the log file cannot be
/// opened only stderr is used. The returned guard flushes the file writer on
/// drop and must be held until the process exits.
pub fn init_logging(verbose: bool, log_path: &Path) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbose));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard) = match open_log_file(log_path) {
        Ok(file) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!("Cannot open log file {}: {}", log_path.display(), e);
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    if guard.is_some() {
        tracing::debug!(path = ?log_path, "Logging to file");
    }
    guard
}
