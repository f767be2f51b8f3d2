//! Main entry point for the gzpack CLI application.
//!
//! Packs files into an archive, lists it, prints entries or extracts them.
//! Read-only commands also accept HTTP URLs.

use anyhow::{Context, Result};
use clap::Parser;
use flate2::Compression;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gzpack::cli::{Command, is_http_url};
use gzpack::{Archive, ArchiveOptions, ArchiveReader, Cli, HttpRangeReader, ReadAt, commands};

/// Application entry point.
///
/// Parses command-line arguments, installs logging and dispatches to the
/// pack path or to the read path for a local file or HTTP URL.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_filter())),
        )
        .init();

    match &cli.command {
        Command::Pack {
            archive,
            files,
            no_reclaim,
            level,
        } => {
            let options = ArchiveOptions::new()
                .reclaim_catalog_space(!no_reclaim)
                .compression(Compression::new(*level));
            pack(archive, files, options).await
        }
        Command::List { archive, verbose } => read(archive, ReadOp::List(*verbose), &cli).await,
        Command::Show { archive, entries } => read(archive, ReadOp::Show(entries), &cli).await,
        Command::Extract { archive, dir } => read(archive, ReadOp::Extract(dir), &cli).await,
    }
}

/// Read-only operations, run against a local or remote archive
enum ReadOp<'a> {
    List(bool),
    Show(&'a [String]),
    Extract(&'a Path),
}

/// Open `source` as a local path or HTTP URL and run `op` on it.
async fn read(source: &str, op: ReadOp<'_>, cli: &Cli) -> Result<()> {
    if is_http_url(source) {
        // Remote archive via HTTP Range requests
        let reader = Arc::new(HttpRangeReader::new(source.to_string()).await?);
        let transferred_before = reader.transferred_bytes();
        let archive = ArchiveReader::from_reader(reader.clone(), &url_stem(source))
            .await
            .with_context(|| format!("failed to open {source}"))?;

        run_read(&archive, op).await?;

        // Display network transfer statistics for HTTP sources
        if !cli.is_quiet() {
            let transferred = reader.transferred_bytes() - transferred_before;
            eprintln!("\nTotal bytes transferred: {}", format_size(transferred));
        }
        Ok(())
    } else {
        let archive = ArchiveReader::open(Path::new(source))
            .await
            .with_context(|| format!("failed to open {source}"))?;
        run_read(&archive, op).await
    }
}

/// Add `files` to the archive at `path`.
///
/// The archive is closed even if packing fails part way, so the entries
/// added before the failure are kept.
async fn pack(path: &Path, files: &[PathBuf], options: ArchiveOptions) -> Result<()> {
    let mut archive = Archive::open_with(path, options)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;

    let packed = commands::pack(&mut archive, files).await;
    let closed = archive.close().await;

    let added = settle_pack(path, packed, closed)?;
    tracing::info!("Packed {} entries into {}", added.len(), path.display());
    Ok(())
}

/// Combine the outcome of packing with the outcome of closing.
///
/// A pack failure wins, but a close failure alongside it is still logged.
fn settle_pack(
    path: &Path,
    packed: gzpack::Result<Vec<String>>,
    closed: gzpack::Result<()>,
) -> Result<Vec<String>> {
    match (packed, closed) {
        (Ok(added), Ok(())) => Ok(added),
        (Ok(_), Err(e)) => Err(anyhow::Error::new(e)
            .context(format!("failed to write catalog of {}", path.display()))),
        (Err(e), closed) => {
            if let Err(close_err) = closed {
                tracing::error!("Failed to write catalog of {}: {}", path.display(), close_err);
            }
            Err(anyhow::Error::new(e).context("packing failed"))
        }
    }
}

/// Run a read-only operation against an opened archive.
async fn run_read<R: ReadAt + 'static>(reader: &ArchiveReader<R>, op: ReadOp<'_>) -> Result<()> {
    match op {
        ReadOp::List(verbose) => list_entries(reader, verbose),
        ReadOp::Show(entries) => {
            let mut stdout = tokio::io::stdout();
            commands::show(reader, entries, &mut stdout).await?;
            Ok(())
        }
        ReadOp::Extract(dir) => {
            let written = commands::extract(reader, dir).await?;
            tracing::info!("Extracted {} entries into {}", written.len(), dir.display());
            Ok(())
        }
    }
}

/// List entries in the archive.
///
/// Supports two output formats:
/// - Simple format: just entry names, one per line
/// - Verbose format (`-v`): offset and compressed size for each entry
fn list_entries<R: ReadAt>(reader: &ArchiveReader<R>, verbose: bool) -> Result<()> {
    let entries = commands::list(reader);

    if !verbose {
        for entry in &entries {
            println!("{}", entry.name);
        }
        return Ok(());
    }

    println!("{:>12}  {:>10}  Name", "Offset", "Size");
    println!("{}", "-".repeat(50));

    let mut total_compressed = 0u64;
    for entry in &entries {
        println!(
            "{:>12}  {:>10}  {}",
            entry.start, entry.compressed_size, entry.name
        );
        total_compressed += entry.compressed_size;
    }

    println!("{}", "-".repeat(50));
    println!(
        "{:>12}  {:>10}  {} entries ({})",
        "",
        total_compressed,
        entries.len(),
        format_size(total_compressed)
    );

    Ok(())
}

/// Archive name from the last path segment of a URL, without extension
fn url_stem(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last = path.rsplit('/').next().unwrap_or(path);
    gzpack::archive::default_archive_name(Path::new(last))
}

/// Format a byte size into a human-readable string.
///
/// Automatically selects the appropriate unit (bytes, KB, MB, GB)
/// based on the size magnitude.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// assert_eq!(format_size(1048576), "1.00 MB");
/// ```
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
