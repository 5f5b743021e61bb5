//! Ramdump CLI
//!
//! Command-line tools for ramdump capture.
//!
//! # Commands
//!
//! - `inspect` - List the segments described by a captured core stream
//! - `simulate` - Run a capture session over a raw memory image

mod commands;

use clap::{Parser, Subcommand};
use commands::simulate::{SegmentSpec, SimulateOptions};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Ramdump capture tools.
#[derive(Parser)]
#[command(name = "ramdump")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the segments described by a captured core stream
    Inspect {
        /// Captured stream file
        file: PathBuf,

        /// Check that the file holds every byte the header declares
        #[arg(long)]
        verify: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run a capture session over a raw memory image
    Simulate {
        /// Raw memory image
        #[arg(short, long)]
        image: PathBuf,

        /// Physical address of the first image byte (hex with 0x, or decimal)
        #[arg(short, long, default_value = "0", value_parser = commands::parse_u64)]
        base: u64,

        /// Segment as ADDRESS:SIZE[:NAME]; repeat for more segments
        #[arg(short, long = "segment", required = true)]
        segments: Vec<SegmentSpec>,

        /// Entry point (raw, elf, minidump, minidump-elf32)
        #[arg(short, long, default_value = "elf")]
        mode: String,

        /// Compact segment sizes to cover the whole address range
        #[arg(long)]
        complete: bool,

        /// Number of concurrent consumers
        #[arg(short, long, default_value = "1")]
        consumers: usize,

        /// Bytes requested per read
        #[arg(long, default_value = "65536")]
        read_size: usize,

        /// Milliseconds to wait for consumers
        #[arg(long, default_value = "120000")]
        timeout_ms: u64,

        /// Write the first consumer's stream to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect {
            file,
            verify,
            format,
        } => {
            commands::inspect::run(&file, verify, &format)?;
        }
        Commands::Simulate {
            image,
            base,
            segments,
            mode,
            complete,
            consumers,
            read_size,
            timeout_ms,
            output,
            format,
        } => {
            let options = SimulateOptions {
                image,
                base,
                segments,
                mode: mode.parse()?,
                complete,
                consumers,
                read_size,
                timeout: std::time::Duration::from_millis(timeout_ms),
                output,
            };
            let report = commands::simulate::run(&options)?;
            commands::simulate::print_report(&report, &format)?;
        }
        Commands::Version => {
            println!("Ramdump CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Ramdump Core v{}", ramdump_core::VERSION);
        }
    }

    Ok(())
}
