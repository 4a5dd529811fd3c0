use regex::bytes::{Regex, RegexBuilder};
use thiserror::Error;

use crate::core::types::{MatchEvent, PatternId};
use crate::database::rule::PatternRule;

/// Upper bound on the compiled size of a single expression
const REGEX_SIZE_LIMIT: usize = 64 * (1 << 20);

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("No patterns to compile")]
    NoPatterns,

    #[error("Could not compile pattern {id} at line {line} '{expression}': {message}")]
    Invalid {
        id: PatternId,
        line: usize,
        expression: String,
        message: String,
    },

    #[error(
        "Pattern {id} at line {line} '{expression}' matches the empty string; add the 'V' flag to allow it"
    )]
    MatchesEmpty {
        id: PatternId,
        line: usize,
        expression: String,
    },
}

/// Matches reported for one scan buffer, ordered by end offset then pattern id
pub type MatchEvents = std::vec::IntoIter<MatchEvent>;

/// A compiled set of patterns that can report match spans in a buffer.
///
/// `scan` runs to completion and returns every match before the caller sees
/// any of them.
pub trait PatternScanner {
    fn scan(&self, buffer: &[u8]) -> MatchEvents;
}

#[derive(Debug)]
struct CompiledRule {
    id: PatternId,
    regex: Regex,
    single_match: bool,
    allow_empty: bool,
    quiet: bool,
}

/// Immutable database compiled from an ordered set of pattern rules
#[derive(Debug)]
pub struct PatternDatabase {
    rules: Vec<PatternRule>,
    compiled: Vec<CompiledRule>,
}

impl PatternDatabase {
    /// Compile rules into a database.
    ///
    /// # Errors
    ///
    /// Returns `CompileError::NoPatterns` for an empty rule set,
    /// `CompileError::Invalid` with the engine diagnostic when an expression
    /// is rejected, or `CompileError::MatchesEmpty` for an expression that can
    /// match nothing without the `V` flag.
    pub fn compile(rules: Vec<PatternRule>) -> Result<Self, CompileError> {
        if rules.is_empty() {
            return Err(CompileError::NoPatterns);
        }

        let compiled = rules
            .iter()
            .map(compile_rule)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { rules, compiled })
    }

    /// The source rules, in pattern table order
    #[must_use]
    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    /// Number of rules in the database
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn compile_rule(rule: &PatternRule) -> Result<CompiledRule, CompileError> {
    let expr = &rule.expression;
    let regex = RegexBuilder::new(&expr.pattern)
        .case_insensitive(expr.flags.caseless)
        .dot_matches_new_line(expr.flags.dot_all)
        .multi_line(expr.flags.multi_line)
        .unicode(expr.flags.unicode)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|e| CompileError::Invalid {
            id: rule.id,
            line: rule.line,
            expression: expr.to_string(),
            message: e.to_string(),
        })?;

    if !expr.flags.allow_empty && regex.is_match(b"") {
        return Err(CompileError::MatchesEmpty {
            id: rule.id,
            line: rule.line,
            expression: expr.to_string(),
        });
    }

    Ok(CompiledRule {
        id: rule.id,
        regex,
        single_match: expr.flags.single_match,
        allow_empty: expr.flags.allow_empty,
        quiet: expr.flags.quiet,
    })
}

impl PatternScanner for PatternDatabase {
    fn scan(&self, buffer: &[u8]) -> MatchEvents {
        let mut events = Vec::new();

        for rule in self.compiled.iter().filter(|rule| !rule.quiet) {
            let matches = rule
                .regex
                .find_iter(buffer)
                .filter(|m| rule.allow_empty || !m.is_empty())
                .map(|m| MatchEvent::new(rule.id, m.start(), m.end()));

            if rule.single_match {
                events.extend(matches.take(1));
            } else {
                events.extend(matches);
            }
        }

        events.sort_by_key(|e| (e.end, e.pattern_id, e.start));
        events.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::patterns::parse_pattern_text;

    fn database(text: &str) -> PatternDatabase {
        PatternDatabase::compile(parse_pattern_text(text).unwrap()).unwrap()
    }

    #[test]
    fn test_scan_caseless_pattern() {
        let db = database("1:/ACGT/i\n");
        let events: Vec<_> = db.scan(b"ggACGTcc\n").collect();
        assert_eq!(events, vec![MatchEvent::new(PatternId::new(1), 2, 6)]);

        let events: Vec<_> = db.scan(b"ggacgtcc\n").collect();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_scan_case_sensitive_by_default() {
        let db = database("1:/ACGT/\n");
        assert_eq!(db.scan(b"acgt\n").count(), 0);
    }

    #[test]
    fn test_scan_orders_by_end_offset() {
        let db = database("1:/CCCC/\n2:/AA/\n");
        let events: Vec<_> = db.scan(b"AACCCCAA\n").collect();
        assert_eq!(
            events,
            vec![
                MatchEvent::new(PatternId::new(2), 0, 2),
                MatchEvent::new(PatternId::new(1), 2, 6),
                MatchEvent::new(PatternId::new(2), 6, 8),
            ]
        );
    }

    #[test]
    fn test_single_match_flag() {
        let db = database("1:/AA/H\n");
        assert_eq!(db.scan(b"AACCAA\n").count(), 1);
    }

    #[test]
    fn test_quiet_pattern_never_reports() {
        let db = database("1:/AA/Q\n2:/CC/\n");
        let events: Vec<_> = db.scan(b"AACC\n").collect();
        assert_eq!(events, vec![MatchEvent::new(PatternId::new(2), 2, 4)]);
        assert_eq!(db.len(), 2);
    }

    #[test]
    fn test_compile_rejects_bad_expression() {
        let rules = parse_pattern_text("# table\n5:/AC(GT/\n").unwrap();
        match PatternDatabase::compile(rules) {
            Err(CompileError::Invalid { id, line, .. }) => {
                assert_eq!(id, PatternId::new(5));
                assert_eq!(line, 2);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_compile_rejects_empty_matching_expression() {
        let rules = parse_pattern_text("3:/A*/\n").unwrap();
        assert!(matches!(
            PatternDatabase::compile(rules),
            Err(CompileError::MatchesEmpty { line: 1, .. })
        ));

        let rules = parse_pattern_text("3:/A*/V\n").unwrap();
        assert!(PatternDatabase::compile(rules).is_ok());
    }

    #[test]
    fn test_compile_rejects_no_patterns() {
        assert!(matches!(
            PatternDatabase::compile(Vec::new()),
            Err(CompileError::NoPatterns)
        ));
    }
}
