use serde::{Deserialize, Serialize};

/// Identifier of a pattern rule, and downstream of the output route it feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PatternId(pub u64);

impl PatternId {
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for PatternId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single match reported by the pattern engine for one scan buffer.
///
/// Offsets are byte offsets into the scan buffer, with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MatchEvent {
    pub pattern_id: PatternId,
    pub start: usize,
    pub end: usize,
}

impl MatchEvent {
    #[must_use]
    pub fn new(pattern_id: PatternId, start: usize, end: usize) -> Self {
        Self {
            pattern_id,
            start,
            end,
        }
    }

    /// Length of the matched span
    #[must_use]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Which parts of a segmented read are dropped from the output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimFlags {
    /// Drop sequence upstream of the match
    pub left: bool,
    /// Drop the matched sequence itself
    pub matched: bool,
    /// Drop sequence downstream of the match
    pub right: bool,
}

/// Where finished records go
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// One gzipped FASTQ per input side and pattern id
    Structured,
    /// One annotated read id per match on stdout
    Identifier,
    /// Segmented sequence with the match highlighted on stdout
    #[default]
    Inspect,
}

impl std::fmt::Display for OutputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Structured => write!(f, "structured"),
            Self::Identifier => write!(f, "identifier"),
            Self::Inspect => write!(f, "inspect"),
        }
    }
}
