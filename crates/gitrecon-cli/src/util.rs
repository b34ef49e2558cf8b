use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::future::Future;
use std::io::{stdout, BufRead, BufReader, Write};
use std::path::Path;
use tracing::warn;

/// The exit status used when interrupted, as shells report for SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Get a writer that appends to the file at the specified path, or stdout if not specified.
///
/// Records are flushed as they are written, so the writer is not buffered.
pub fn get_writer_for_file_or_stdout<P: AsRef<Path>>(
    path: Option<P>,
) -> std::io::Result<Box<dyn Write + Send>> {
    match path.as_ref() {
        None => Ok(Box::new(stdout())),
        Some(p) => {
            let f = OpenOptions::new().create(true).append(true).open(p)?;
            Ok(Box::new(f))
        }
    }
}

/// Read newline-delimited values from the file at `path`, skipping blank lines.
pub fn read_lines<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut values = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        let line = line.trim();
        if !line.is_empty() {
            values.push(line.to_owned());
        }
    }
    Ok(values)
}

/// The values given inline on the command line, or else those listed in `file`.
pub fn inline_or_file(inline: &[String], file: Option<&Path>) -> Result<Vec<String>> {
    match file {
        Some(path) => read_lines(path),
        None => Ok(inline
            .iter()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
            .collect()),
    }
}

/// Build the async runtime that drives platform I/O.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to initialize async runtime")
}

/// Run `task` to completion, exiting the process promptly on Ctrl-C.
pub async fn until_interrupted<F: Future<Output = Result<()>>>(task: F) -> Result<()> {
    tokio::select! {
        result = task => result,
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!("Failed to listen for interrupts: {e}");
            }
            eprintln!("Interrupted");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    }
}
