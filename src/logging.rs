//! Tracing subscriber setup.
//!
//! The library only emits events. Hosts pick a sink: [`init_tracing`] for a
//! log file named by `MVLI_LOG`, [`init_stderr`] for the inspection binary.
//! The level filter comes from `RUST_LOG` when set.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable naming the log file.
pub const LOG_ENV: &str = "MVLI_LOG";

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Log to the file named by `MVLI_LOG`, if set. Defaults to `info`.
pub fn init_tracing() {
    let Some(path) = std::env::var_os(LOG_ENV) else {
        return;
    };
    if let Err(e) = init_file(Path::new(&path)) {
        eprintln!("Warning: cannot open log file {}: {}", Path::new(&path).display(), e);
    }
}

/// Append events to `path`. A subscriber installed earlier stays in place.
pub fn init_file(path: &Path) -> io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let _ = tracing_subscriber::registry()
        .with(filter("info"))
        .with(fmt::layer().with_writer(file).with_ansi(false))
        .try_init();
    Ok(())
}

/// Stderr subscriber for the inspection binary.
pub fn init_stderr(verbose: bool) {
    let _ = tracing_subscriber::registry()
        .with(filter(if verbose { "debug" } else { "warn" }))
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_sink_creates_the_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mvli.log");

        init_file(&path).unwrap();
        assert!(path.exists());

        let missing = dir.path().join("no/such/dir/mvli.log");
        assert!(init_file(&missing).is_err());
    }
}
