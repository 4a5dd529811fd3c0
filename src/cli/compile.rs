use clap::Args;

use crate::cli::PatternArgs;
use crate::database::cache::DatabaseOrigin;

#[derive(Args)]
pub struct CompileArgs {
    #[command(flatten)]
    pub patterns: PatternArgs,
}

/// Execute compile subcommand
///
/// Prints the cache file path on stdout so scripts can pick it up.
///
/// # Errors
///
/// Returns an error if the pattern table does not compile or the cache cannot
/// be read or written.
pub fn run(args: &CompileArgs) -> anyhow::Result<()> {
    let loaded = args.patterns.load()?;

    match loaded.origin {
        DatabaseOrigin::Compiled => eprintln!(
            "Compiled {} patterns from {}",
            loaded.database.len(),
            args.patterns.patterns.display()
        ),
        DatabaseOrigin::Cached => eprintln!(
            "Pattern DB is up to date ({} patterns), use --recompile to rebuild it",
            loaded.database.len()
        ),
    }
    println!("{}", loaded.cache_path.display());

    Ok(())
}
