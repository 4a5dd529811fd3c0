use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use float_demux::cli;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();

    // Initialize logging based on verbosity flags
    let filter = if cli.silent {
        EnvFilter::new("error")
    } else if cli.debug {
        EnvFilter::new("float_demux=debug,info")
    } else {
        EnvFilter::new("float_demux=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!cli.no_color)
        .with_target(false)
        .without_time()
        .init();

    match cli::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(cli::exit_code(&e))
        }
    }
}
