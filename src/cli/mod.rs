//! Command-line interface for float-demux.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **demux**: Scan paired FASTQ files for barcode patterns and route matches
//! - **scan**: Scan a single FASTQ file with the same output options
//! - **compile**: Compile a pattern table into its cache file
//!
//! ## Usage
//!
//! ```text
//! # Split paired reads into one gzipped FASTQ per barcode
//! float-demux demux --r1 s1_R1.fastq.gz --r2 s1_R2.fastq.gz \
//!     --patterns barcodes.txt --mode structured --output-dir out/
//!
//! # Trim the barcode and everything upstream of it
//! float-demux demux --r1 s1_R1.fastq.gz --r2 s1_R2.fastq.gz \
//!     --patterns barcodes.txt -L -M --mode structured
//!
//! # Eyeball matches in a terminal
//! zcat s1_R1.fastq.gz | head -400 | float-demux scan --input - --patterns barcodes.txt
//!
//! # Rebuild the pattern cache
//! float-demux compile --patterns barcodes.txt --recompile
//! ```

use std::io::{BufWriter, IsTerminal, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::core::record::ContentError;
use crate::core::types::{OutputMode, TrimFlags};
use crate::database::cache::{DatabaseError, DatabaseOrigin, LoadedDatabase, PatternCache};
use crate::database::engine::CompileError;
use crate::demux::config::DemuxConfig;
use crate::demux::pairing::PairingError;
use crate::demux::pipeline::{RunStats, RunSummary};
use crate::demux::routes::RoutePool;
use crate::demux::DemuxError;
use crate::parsing::patterns::PatternTableError;
use crate::utils::interrupt::{install_ctrl_c_handler, InterruptFlag, INTERRUPTED_EXIT_CODE};

pub mod compile;
pub mod demux;
pub mod scan;

#[derive(Parser)]
#[command(name = "float-demux")]
#[command(author = "Fulcrum Genomics")]
#[command(version)]
#[command(about = "Demultiplex paired FASTQ files by floating barcode patterns")]
#[command(
    long_about = "float-demux scans every read of a pair of FASTQ files against a table of barcode patterns.\n\nA barcode may sit anywhere in the read. Each match produces one output record, which can:\n- Go to a gzipped FASTQ per input side and pattern id\n- Be listed as an annotated read id\n- Be shown with the match highlighted"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(short = 'C', long, global = true)]
    pub no_color: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "debug")]
    pub silent: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Demultiplex a pair of FASTQ files
    Demux(demux::DemuxArgs),

    /// Scan a single FASTQ file
    Scan(scan::ScanArgs),

    /// Compile a pattern table into its cache file
    Compile(compile::CompileArgs),
}

/// Pattern database options shared by every command
#[derive(clap::Args)]
pub struct PatternArgs {
    /// Pattern table with one `<id>:<expression>` rule per line
    #[arg(short, long)]
    pub patterns: PathBuf,

    /// Ignore any cached pattern DB and compile the table again
    #[arg(short = 'c', long)]
    pub recompile: bool,
}

impl PatternArgs {
    /// # Errors
    ///
    /// Returns a `DatabaseError` if the table cannot be compiled or the cache
    /// cannot be used.
    pub fn load(&self) -> Result<LoadedDatabase, DatabaseError> {
        let loaded = PatternCache::for_pattern_file(&self.patterns)?.compile_or_load(self.recompile)?;
        match loaded.origin {
            DatabaseOrigin::Compiled => info!("Loaded {} freshly compiled patterns", loaded.database.len()),
            DatabaseOrigin::Cached => info!("Loaded {} cached patterns", loaded.database.len()),
        }
        Ok(loaded)
    }
}

/// Options controlling how matches are cut and delivered
#[derive(clap::Args)]
pub struct OutputArgs {
    /// Trim sequence to the left of the match
    #[arg(short = 'L', long)]
    pub trim_left: bool,

    /// Trim the matched sequence
    #[arg(short = 'M', long)]
    pub trim_match: bool,

    /// Trim sequence to the right of the match
    #[arg(short = 'R', long)]
    pub trim_right: bool,

    /// Reverse complement output sequences
    #[arg(short, long)]
    pub revcomp: bool,

    /// Output mode
    #[arg(long, value_enum, default_value_t = OutputMode::Inspect)]
    pub mode: OutputMode,

    /// Leave the matched sequence out of output annotations
    #[arg(long)]
    pub no_match_seq: bool,

    /// Directory for structured output files
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Write a JSON run summary to this file
    #[arg(long)]
    pub summary: Option<PathBuf>,
}

impl OutputArgs {
    /// Build the run configuration
    #[must_use]
    pub fn to_config(&self, color: bool) -> DemuxConfig {
        DemuxConfig {
            trim: TrimFlags {
                left: self.trim_left,
                matched: self.trim_match,
                right: self.trim_right,
            },
            reverse_complement: self.revcomp,
            mode: self.mode,
            include_match_sequence: !self.no_match_seq,
            color,
            output_dir: self.output_dir.clone(),
        }
    }
}

/// Invalid combinations of otherwise well-formed arguments
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Only one input may be read from standard input")]
    SharedStdin,

    #[error("Output directory '{0}' does not exist")]
    MissingOutputDir(PathBuf),
}

/// Run the parsed command line.
///
/// # Errors
///
/// Returns the error that ended the command; see [`exit_code`] for how it
/// maps to an exit status.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    let color = !cli.no_color && std::io::stdout().is_terminal();
    colored::control::set_override(color);

    match cli.command {
        Commands::Demux(args) => demux::run(args, color, cli.silent, &interrupt_flag()),
        Commands::Scan(args) => scan::run(args, color, cli.silent, &interrupt_flag()),
        Commands::Compile(args) => compile::run(&args),
    }
}

fn interrupt_flag() -> InterruptFlag {
    let flag = InterruptFlag::new();
    if let Err(e) = install_ctrl_c_handler(flag.clone()) {
        warn!("Ctrl-C will not finish outputs cleanly: {e}");
    }
    flag
}

/// Primary output channel for identifier and inspect modes
pub(crate) fn primary_output() -> BufWriter<std::io::Stdout> {
    BufWriter::new(std::io::stdout())
}

/// Check the output directory before any input is consumed
pub(crate) fn check_output_dir(config: &DemuxConfig) -> Result<(), ConfigError> {
    if config.mode == OutputMode::Structured && !config.output_dir.is_dir() {
        return Err(ConfigError::MissingOutputDir(config.output_dir.clone()));
    }
    Ok(())
}

/// Close every output, then report the run outcome.
///
/// Outputs are finished even when the run failed, in which case the run
/// error wins over any error met while closing.
pub(crate) fn finish_run<W: Write>(
    pool: &RoutePool<W>,
    outcome: Result<RunStats, DemuxError>,
    config: &DemuxConfig,
    patterns: usize,
    summary_path: Option<&Path>,
) -> anyhow::Result<()> {
    let finished = pool.finish();

    let stats = match outcome {
        Ok(stats) => stats,
        Err(e) => {
            if let Err(close_error) = finished {
                warn!("{close_error}");
            }
            error!("Run did not complete, outputs are incomplete");
            return Err(e.into());
        }
    };
    let report = finished.map_err(DemuxError::from)?;

    info!(
        "Processed {} records in {} pairs with {} matches across {} outputs",
        stats.records,
        stats.pairs,
        stats.matches,
        report.routes.len()
    );

    if let Some(path) = summary_path {
        let summary = RunSummary {
            created_at: chrono::Utc::now(),
            mode: config.mode,
            patterns,
            stats,
            routes: report.routes,
        };
        let file = std::fs::File::create(path)
            .with_context(|| format!("Couldn't create summary file '{}'", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &summary)
            .with_context(|| format!("Failed to write summary file '{}'", path.display()))?;
        info!("Wrote run summary to {}", path.display());
    }

    Ok(())
}

/// Exit status for an error returned by [`run`]
#[must_use]
pub fn exit_code(error: &anyhow::Error) -> u8 {
    for cause in error.chain() {
        if cause.is::<ConfigError>() {
            return 2;
        }
        if let Some(e) = cause.downcast_ref::<DatabaseError>() {
            return if e.is_cache_error() { 4 } else { 3 };
        }
        if cause.is::<PatternTableError>() || cause.is::<CompileError>() {
            return 3;
        }
        if let Some(e) = cause.downcast_ref::<DemuxError>() {
            return match e {
                DemuxError::Interrupted => INTERRUPTED_EXIT_CODE,
                DemuxError::Pairing(_) => 5,
                e if e.is_content_error() => 6,
                _ => 1,
            };
        }
        if cause.is::<PairingError>() {
            return 5;
        }
        if cause.is::<ContentError>() {
            return 6;
        }
    }
    1
}
