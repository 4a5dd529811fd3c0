//! Parsers for the tool's two input formats.
//!
//! - **Pattern tables**: `<id>:<expression>` barcode rules, see [`patterns`]
//! - **FASTQ files**: plain or gzipped reads, see [`fastq`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use float_demux::parsing::fastq::{open_fastq, RecordSource};
//! use float_demux::parsing::patterns::parse_pattern_file;
//! use std::path::Path;
//!
//! let rules = parse_pattern_file(Path::new("barcodes.txt")).unwrap();
//! println!("{} rules", rules.len());
//!
//! let mut reads = open_fastq(Path::new("sample_R1.fastq.gz")).unwrap();
//! while let Some(record) = reads.next_record().unwrap() {
//!     println!("{}", record.identifier);
//! }
//! ```

pub mod fastq;
pub mod patterns;
