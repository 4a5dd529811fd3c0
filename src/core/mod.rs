//! Core data types for floating barcode demultiplexing.
//!
//! - [`SequenceRecord`](record::SequenceRecord): one FASTQ entry tagged with its input
//! - [`MatchEvent`](types::MatchEvent): a pattern match span reported for one scan buffer
//! - [`PatternId`](types::PatternId), [`TrimFlags`](types::TrimFlags),
//!   [`OutputMode`](types::OutputMode): identifiers and run options
//! - [`sequence`]: reverse complement helpers

pub mod record;
pub mod sequence;
pub mod types;
