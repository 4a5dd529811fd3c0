use std::path::PathBuf;

use clap::Args;
use tracing::info;

use crate::cli::{check_output_dir, finish_run, primary_output, ConfigError, OutputArgs, PatternArgs};
use crate::demux::pairing::PairedRecords;
use crate::demux::pipeline::{Demultiplexer, DEFAULT_BATCH_SIZE};
use crate::demux::routes::RoutePool;
use crate::parsing::fastq::{open_fastq, open_fastq_with_progress};
use crate::utils::interrupt::InterruptFlag;
use crate::utils::progress::input_progress;
use crate::utils::validation::is_stdin;

#[derive(Args)]
pub struct DemuxArgs {
    /// First FASTQ of the pair (plain or gzipped, '-' for stdin)
    #[arg(long)]
    pub r1: PathBuf,

    /// Second FASTQ of the pair (plain or gzipped, '-' for stdin)
    #[arg(long)]
    pub r2: PathBuf,

    #[command(flatten)]
    pub patterns: PatternArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    /// Scan the two sides of each batch of pairs on separate threads
    #[arg(long)]
    pub parallel: bool,
}

/// Execute demux subcommand
///
/// # Errors
///
/// Returns an error if the arguments conflict, the pattern database cannot be
/// loaded, or reading, pairing, segmenting or writing fails.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(
    args: DemuxArgs,
    color: bool,
    silent: bool,
    interrupt: &InterruptFlag,
) -> anyhow::Result<()> {
    if is_stdin(&args.r1) && is_stdin(&args.r2) {
        return Err(ConfigError::SharedStdin.into());
    }
    let config = args.output.to_config(color);
    check_output_dir(&config)?;

    let loaded = args.patterns.load()?;

    let progress = input_progress("Demuxing", silent);
    let r1 = open_fastq_with_progress(&args.r1, &progress)?;
    let r2 = open_fastq(&args.r2)?;
    info!(
        "Demultiplexing {} and {} in {} mode",
        args.r1.display(),
        args.r2.display(),
        config.mode
    );

    let pool = RoutePool::new(config.route_options(), primary_output());
    let demux = Demultiplexer::new(&loaded.database, config.segmenter(), &pool);
    let mut pairs = PairedRecords::new(r1, r2);

    let batch_size = args.parallel.then_some(DEFAULT_BATCH_SIZE);
    let outcome = demux.run_paired(&mut pairs, interrupt, batch_size);
    progress.finish_and_clear();

    finish_run(
        &pool,
        outcome,
        &config,
        loaded.database.len(),
        args.output.summary.as_deref(),
    )
}
