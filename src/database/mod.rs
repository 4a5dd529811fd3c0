//! Pattern database compilation and content-addressed caching.
//!
//! A pattern table lists one barcode rule per line as `<id>:<expression>`:
//!
//! ```text
//! # inline barcodes, case-insensitive
//! 1:/ACGTACGT/i
//! 2:/TTGCA[AG]GT/i
//! ```
//!
//! The table is compiled into a [`PatternDatabase`](engine::PatternDatabase)
//! once per process. The compiled form is cached next to the table as
//! `<table>.<md5>.fdb`, so a changed table always gets a fresh entry and an
//! unchanged table is never reparsed.
//!
//! ## Example
//!
//! ```rust,no_run
//! use float_demux::database::cache::compile_or_load;
//! use float_demux::database::engine::PatternScanner;
//! use std::path::Path;
//!
//! let database = compile_or_load(Path::new("barcodes.txt"), false).unwrap();
//! for event in database.scan(b"ggACGTACGTcc\n") {
//!     println!("{} {}-{}", event.pattern_id, event.start, event.end);
//! }
//! ```

pub mod cache;
pub mod engine;
pub mod rule;
