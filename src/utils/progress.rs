//! Terminal progress display for input files.

use std::io::IsTerminal;

use indicatif::{ProgressBar, ProgressStyle};

const TEMPLATE: &str =
    "{spinner:.blue} {prefix:<12} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {elapsed_precise}";

/// Progress bar for reading an input, drawn to stderr.
///
/// The bar is hidden when `silent` is set or stderr is not a terminal, so
/// piped and logged runs stay free of control sequences.
#[must_use]
pub fn input_progress(prefix: &str, silent: bool) -> ProgressBar {
    if silent || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template(TEMPLATE)
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar.set_prefix(prefix.to_string());
    bar
}
