//! # float-demux
//!
//! A library for demultiplexing paired FASTQ files by floating barcodes.
//!
//! Barcodes in some library designs do not sit at a fixed read offset: an
//! inline index can drift by a few bases, or appear on either mate. Rather
//! than clipping a fixed window, `float-demux` scans each whole read against a
//! table of id-tagged regular expressions and emits one output per match.
//!
//! ## Features
//!
//! - **Pattern tables**: `<id>:/<regex>/<flags>` rules, compiled once
//! - **Content-addressed cache**: compiled tables are reused until the table changes
//! - **Lockstep pairing**: mates are read together and misaligned inputs are fatal
//! - **Trimming**: drop the sequence left of, right of, or inside the match
//! - **Reverse complement**: emit the reverse strand of each output record
//! - **Three output modes**: gzipped FASTQ per route, read id list, or highlighted view
//!
//! ## Example
//!
//! ```rust,no_run
//! use float_demux::database::cache::compile_or_load;
//! use float_demux::database::engine::PatternScanner;
//! use float_demux::parsing::fastq::{open_fastq, RecordSource};
//! use std::path::Path;
//!
//! let database = compile_or_load(Path::new("barcodes.txt"), false).unwrap();
//!
//! let mut reads = open_fastq(Path::new("sample_R1.fastq.gz")).unwrap();
//! while let Some(record) = reads.next_record().unwrap() {
//!     for event in database.scan(&record.sequence) {
//!         println!("{} {}:{}-{}", record.identifier, event.pattern_id, event.start, event.end);
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Core data types for records, match events and sequences
//! - [`database`]: Pattern rules, the compiled database and its cache
//! - [`demux`]: Pairing, segmentation, output routing and the run pipeline
//! - [`parsing`]: Parsers for pattern tables and FASTQ files
//! - [`cli`]: Command-line interface implementation
//! - [`utils`]: Path helpers, digests and interrupt handling

pub mod cli;
pub mod core;
pub mod database;
pub mod demux;
pub mod parsing;
pub mod utils;

// Re-export commonly used types for convenience
pub use core::record::SequenceRecord;
pub use core::types::*;
pub use database::engine::{PatternDatabase, PatternScanner};
pub use demux::config::DemuxConfig;
pub use demux::pipeline::Demultiplexer;
