use std::path::PathBuf;

use clap::Args;
use tracing::info;

use crate::cli::{check_output_dir, finish_run, primary_output, OutputArgs, PatternArgs};
use crate::demux::pipeline::Demultiplexer;
use crate::demux::routes::RoutePool;
use crate::parsing::fastq::open_fastq_with_progress;
use crate::utils::interrupt::InterruptFlag;
use crate::utils::progress::input_progress;

#[derive(Args)]
pub struct ScanArgs {
    /// FASTQ file to scan (plain or gzipped, '-' for stdin)
    #[arg(short, long)]
    pub input: PathBuf,

    #[command(flatten)]
    pub patterns: PatternArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Execute scan subcommand
///
/// # Errors
///
/// Returns an error if the pattern database cannot be loaded, or reading,
/// segmenting or writing fails.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(
    args: ScanArgs,
    color: bool,
    silent: bool,
    interrupt: &InterruptFlag,
) -> anyhow::Result<()> {
    let config = args.output.to_config(color);
    check_output_dir(&config)?;

    let loaded = args.patterns.load()?;
    let progress = input_progress("Scanning", silent);
    let mut source = open_fastq_with_progress(&args.input, &progress)?;
    info!("Scanning {} in {} mode", args.input.display(), config.mode);

    let pool = RoutePool::new(config.route_options(), primary_output());
    let demux = Demultiplexer::new(&loaded.database, config.segmenter(), &pool);
    let outcome = demux.run_single(&mut source, interrupt);
    progress.finish_and_clear();

    finish_run(
        &pool,
        outcome,
        &config,
        loaded.database.len(),
        args.output.summary.as_deref(),
    )
}
