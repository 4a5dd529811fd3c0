use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::types::PatternId;
use crate::database::rule::{PatternExpression, PatternRule};

#[derive(Error, Debug)]
pub enum PatternTableError {
    #[error("Can't read pattern file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not parse id at line {line}: '{text}'")]
    InvalidId { line: usize, text: String },

    #[error("Could not parse pattern at line {line}: '{text}': {reason}")]
    InvalidExpression {
        line: usize,
        text: String,
        reason: String,
    },

    #[error("Duplicate pattern id {id} at line {line}")]
    DuplicateId { line: usize, id: PatternId },
}

/// Parse a pattern table file into rules, in file order.
///
/// # Errors
///
/// Returns `PatternTableError::Io` if the file cannot be read, or a
/// line-numbered error for the first malformed line.
pub fn parse_pattern_file(path: &Path) -> Result<Vec<PatternRule>, PatternTableError> {
    let content = std::fs::read_to_string(path).map_err(|source| PatternTableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_pattern_text(&content)
}

/// Parse pattern table text with one `<id>:<expression>` rule per line.
///
/// Blank lines and lines starting with `#` are skipped. Each line is split at
/// the first `:` only, so expressions may contain colons.
///
/// # Errors
///
/// Returns `PatternTableError::InvalidId`, `InvalidExpression` or
/// `DuplicateId` naming the 1-based line number of the first bad line.
pub fn parse_pattern_text(text: &str) -> Result<Vec<PatternRule>, PatternTableError> {
    let mut rules = Vec::new();
    let mut seen = HashSet::new();

    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Line numbers in errors are 1-based for user friendliness
        let line_num = i + 1;

        let Some((id_text, expr_text)) = line.split_once(':') else {
            return Err(PatternTableError::InvalidId {
                line: line_num,
                text: line.to_string(),
            });
        };

        let id: u64 = id_text
            .trim()
            .parse()
            .map_err(|_| PatternTableError::InvalidId {
                line: line_num,
                text: line.to_string(),
            })?;
        let id = PatternId::new(id);

        let expression: PatternExpression =
            expr_text
                .parse()
                .map_err(|e| PatternTableError::InvalidExpression {
                    line: line_num,
                    text: line.to_string(),
                    reason: format!("{e}"),
                })?;

        if !seen.insert(id) {
            return Err(PatternTableError::DuplicateId { line: line_num, id });
        }

        rules.push(PatternRule::new(id, expression, line_num));
    }

    Ok(rules)
}
