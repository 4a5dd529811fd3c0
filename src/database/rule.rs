use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::core::types::PatternId;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("Empty pattern expression")]
    Empty,

    #[error("Missing closing '/' in expression '{0}'")]
    Unterminated(String),

    #[error("Unsupported flag '{flag}' in expression '{expression}'")]
    UnsupportedFlag { flag: char, expression: String },
}

/// Compile and reporting flags of one expression, written after the closing `/`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternFlags {
    /// `i`: case-insensitive matching
    pub caseless: bool,
    /// `s`: `.` also matches `\n`
    pub dot_all: bool,
    /// `m`: `^` and `$` match at line boundaries
    pub multi_line: bool,
    /// `H`: report at most one match per scan
    pub single_match: bool,
    /// `V`: the expression may match the empty string
    pub allow_empty: bool,
    /// `8` or `W`: Unicode-aware classes instead of raw bytes
    pub unicode: bool,
    /// `Q`: compile the expression but never report it
    pub quiet: bool,
}

impl PatternFlags {
    fn parse(flags: &str, expression: &str) -> Result<Self, ExpressionError> {
        let mut parsed = Self::default();
        for flag in flags.chars() {
            match flag {
                'i' => parsed.caseless = true,
                's' => parsed.dot_all = true,
                'm' => parsed.multi_line = true,
                'H' => parsed.single_match = true,
                'V' => parsed.allow_empty = true,
                '8' | 'W' => parsed.unicode = true,
                'Q' => parsed.quiet = true,
                // start of match is always reported leftmost; prefiltering is a no-op
                'L' | 'P' => {}
                other => {
                    return Err(ExpressionError::UnsupportedFlag {
                        flag: other,
                        expression: expression.to_string(),
                    })
                }
            }
        }
        Ok(parsed)
    }
}

/// A pattern expression as written in the pattern table, e.g. `/ACGT[AG]/i`.
///
/// An expression without surrounding slashes is taken verbatim with no flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternExpression {
    pub pattern: String,
    pub flags: PatternFlags,
}

impl FromStr for PatternExpression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ExpressionError::Empty);
        }

        let Some(body) = s.strip_prefix('/') else {
            return Ok(Self {
                pattern: s.to_string(),
                flags: PatternFlags::default(),
            });
        };

        let close = body
            .rfind('/')
            .ok_or_else(|| ExpressionError::Unterminated(s.to_string()))?;
        let pattern = &body[..close];
        if pattern.is_empty() {
            return Err(ExpressionError::Empty);
        }
        let flags = PatternFlags::parse(&body[close + 1..], s)?;

        Ok(Self {
            pattern: pattern.to_string(),
            flags,
        })
    }
}

impl std::fmt::Display for PatternExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let flags = &self.flags;
        let mut suffix = String::new();
        for (set, c) in [
            (flags.caseless, 'i'),
            (flags.dot_all, 's'),
            (flags.multi_line, 'm'),
            (flags.single_match, 'H'),
            (flags.allow_empty, 'V'),
            (flags.unicode, '8'),
            (flags.quiet, 'Q'),
        ] {
            if set {
                suffix.push(c);
            }
        }
        write!(f, "/{}/{suffix}", self.pattern)
    }
}

/// One `id:expression` line of the pattern table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRule {
    pub id: PatternId,
    pub expression: PatternExpression,
    /// 1-based line of the rule in its pattern table
    pub line: usize,
}

impl PatternRule {
    #[must_use]
    pub fn new(id: PatternId, expression: PatternExpression, line: usize) -> Self {
        Self {
            id,
            expression,
            line,
        }
    }
}
