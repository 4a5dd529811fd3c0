//! Path and file helpers shared by the parsers and the cache.

use std::io::Read;
use std::path::Path;

/// Names that select standard input instead of a file
pub const STDIN_SENTINELS: [&str; 3] = ["-", "stdin", "/dev/stdin"];

/// FASTQ suffixes stripped when deriving an output basename, longest first
const FASTQ_SUFFIXES: [&str; 6] = [".fastq.gz", ".fq.gz", ".fastq", ".fq", ".gz", ".txt"];

/// Compute the lowercase hex MD5 digest of a file's content.
///
/// The file is streamed, so large pattern tables are never held in memory twice.
///
/// # Errors
///
/// Returns the underlying I/O error if the file cannot be opened or read.
pub fn compute_file_md5(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut context = md5::Context::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        context.consume(&buffer[..n]);
    }

    Ok(format!("{:x}", context.compute()))
}

/// Check whether the path names standard input
#[must_use]
pub fn is_stdin(path: &Path) -> bool {
    let path_str = path.to_string_lossy();
    STDIN_SENTINELS
        .iter()
        .any(|sentinel| path_str.eq_ignore_ascii_case(sentinel))
}

/// Check if the path is a gzipped file
#[allow(clippy::case_sensitive_file_extension_comparisons)] // Already lowercased
#[must_use]
pub fn is_gzipped(path: &Path) -> bool {
    let path_str = path.to_string_lossy().to_lowercase();
    path_str.ends_with(".gz") || path_str.ends_with(".bgz")
}

/// Derive the label used to name outputs for an input file.
///
/// The directory and a recognized FASTQ suffix are removed, so
/// `runs/s1_R1.fastq.gz` becomes `s1_R1`. Standard input is labelled `stdin`.
#[must_use]
pub fn input_basename(path: &Path) -> String {
    if is_stdin(path) {
        return "stdin".to_string();
    }

    let file_name = path
        .file_name()
        .map_or_else(|| path.to_string_lossy(), |name| name.to_string_lossy())
        .to_string();

    for suffix in FASTQ_SUFFIXES {
        let Some(cut) = file_name.len().checked_sub(suffix.len()) else {
            continue;
        };
        if cut > 0
            && file_name.is_char_boundary(cut)
            && file_name[cut..].eq_ignore_ascii_case(suffix)
        {
            return file_name[..cut].to_string();
        }
    }

    file_name
}
