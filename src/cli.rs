use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gzpack")]
#[command(version)]
#[command(about = "Pack files into a single archive of gzipped entries", long_about = None)]
#[command(after_help = "Examples:\n  \
  gzpack pack site.pkg public/ robots.txt    add a directory tree and a file\n  \
  gzpack list -v site.pkg                    list entries with offsets and sizes\n  \
  gzpack show site.pkg public/index.html     print one entry to stdout\n  \
  gzpack extract https://example.com/site.pkg out/   extract a remote archive")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', global = true, action = ArgAction::Count)]
    pub quiet: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List entries
    List {
        /// Archive path or HTTP URL
        #[arg(value_name = "ARCHIVE")]
        archive: String,

        /// Show offsets and compressed sizes
        #[arg(short = 'v')]
        verbose: bool,
    },

    /// Write entry contents to stdout
    Show {
        /// Archive path or HTTP URL
        #[arg(value_name = "ARCHIVE")]
        archive: String,

        /// Entries to print, in order
        #[arg(value_name = "ENTRIES", required = true)]
        entries: Vec<String>,
    },

    /// Add files and directories, creating the archive if needed
    Pack {
        /// Archive path
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// Files and directories to add
        #[arg(value_name = "FILES")]
        files: Vec<PathBuf>,

        /// Append after the existing catalog instead of reusing its space
        #[arg(long, env = "GZPACK_NO_RECLAIM")]
        no_reclaim: bool,

        /// gzip compression level
        #[arg(
            short = 'l',
            long,
            env = "GZPACK_LEVEL",
            default_value_t = 6,
            value_parser = clap::value_parser!(u32).range(0..=9)
        )]
        level: u32,
    },

    /// Extract every entry into a directory
    #[command(alias = "spill")]
    Extract {
        /// Archive path or HTTP URL
        #[arg(value_name = "ARCHIVE")]
        archive: String,

        /// Output directory
        #[arg(value_name = "DIR", default_value = ".")]
        dir: PathBuf,
    },
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || matches!(self.command, Command::Show { .. })
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Default log filter when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &'static str {
        if self.is_very_quiet() {
            "error"
        } else if self.is_quiet() {
            "warn"
        } else {
            "info"
        }
    }
}

pub fn is_http_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}
