use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use colored::Colorize;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::types::{OutputMode, PatternId};
use crate::demux::segment::SegmentedRecord;

/// Suffix of every structured output file
pub const OUTPUT_SUFFIX: &str = "demux.fastq.gz";

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Couldn't open file '{path}' for writing: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write output: {0}")]
    Primary(#[source] std::io::Error),
}

/// Output path for a route: `<dir>/<source_label>.<pattern_id>.demux.fastq.gz`
///
/// `source_label` is the label of the input whose record opened the route.
#[must_use]
pub fn route_path(output_dir: &Path, source_label: &str, pattern_id: PatternId) -> PathBuf {
    output_dir.join(format!("{source_label}.{pattern_id}.{OUTPUT_SUFFIX}"))
}

struct Route {
    source_label: Arc<str>,
    path: PathBuf,
    encoder: GzEncoder<BufWriter<File>>,
    records: u64,
}

impl Route {
    fn create(source_label: Arc<str>, path: PathBuf) -> Result<Self, OutputError> {
        let file = File::create(&path).map_err(|source| OutputError::Create {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            source_label,
            path,
            encoder: GzEncoder::new(BufWriter::new(file), Compression::best()),
            records: 0,
        })
    }

    fn write_record(&mut self, record: &SegmentedRecord, annotation: &str) -> std::io::Result<()> {
        let w = &mut self.encoder;
        w.write_all(record.identifier.as_bytes())?;
        w.write_all(b"\n")?;
        w.write_all(&record.sequence)?;
        w.write_all(b"\n+")?;
        w.write_all(annotation.as_bytes())?;
        w.write_all(b"\n")?;
        w.write_all(&record.quality)?;
        w.write_all(b"\n")?;
        self.records += 1;
        Ok(())
    }

    /// Write the gzip trailer and flush the file
    fn close(self) -> Result<RouteSummary, OutputError> {
        let write_error = |source| OutputError::Write {
            path: self.path.clone(),
            source,
        };
        let mut file = self
            .encoder
            .finish()
            .map_err(write_error)?
            .into_inner()
            .map_err(|e| write_error(e.into_error()))?;
        file.flush().map_err(write_error)?;

        Ok(RouteSummary {
            path: self.path,
            records: self.records,
        })
    }
}

/// Records written to one structured output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteSummary {
    pub path: PathBuf,
    pub records: u64,
}

/// What was written to each route over a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteReport {
    pub routes: Vec<RouteEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    /// Label of the input that opened the route
    pub source_label: String,
    pub pattern_id: PatternId,
    #[serde(flatten)]
    pub summary: RouteSummary,
}

/// Options for the route pool, taken from the run configuration
#[derive(Debug, Clone)]
pub struct RouteOptions {
    pub mode: OutputMode,
    pub include_match_sequence: bool,
    pub color: bool,
    pub output_dir: PathBuf,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            mode: OutputMode::default(),
            include_match_sequence: true,
            color: false,
            output_dir: PathBuf::from("."),
        }
    }
}

/// Owns every output sink of a run and the primary output channel.
///
/// There is one sink per pattern id, shared by both inputs of a pair. A sink
/// is created on first use, named after the input whose record opened it, and
/// lives until [`RoutePool::finish`].
/// All access goes through one lock, so a sink is never created twice and
/// records never interleave. Sinks still open when the pool is dropped are
/// closed then.
pub struct RoutePool<W: Write> {
    options: RouteOptions,
    sinks: Mutex<BTreeMap<PatternId, Route>>,
    primary: Mutex<W>,
}

impl<W: Write> RoutePool<W> {
    pub fn new(options: RouteOptions, primary: W) -> Self {
        Self {
            options,
            sinks: Mutex::new(BTreeMap::new()),
            primary: Mutex::new(primary),
        }
    }

    #[must_use]
    pub fn options(&self) -> &RouteOptions {
        &self.options
    }

    /// Number of sinks opened so far
    pub fn open_routes(&self) -> usize {
        self.sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Deliver one finished record according to the output mode.
    ///
    /// # Errors
    ///
    /// Returns an `OutputError` if a sink cannot be created or written, or the
    /// primary output fails.
    pub fn route(&self, record: &SegmentedRecord) -> Result<(), OutputError> {
        match self.options.mode {
            OutputMode::Structured => {
                let annotation = self.annotation(record);

                let mut sinks = self.sinks.lock().unwrap_or_else(PoisonError::into_inner);
                let route = self.get_or_create(&mut sinks, record)?;
                route
                    .write_record(record, &annotation)
                    .map_err(|source| OutputError::Write {
                        path: route.path.clone(),
                        source,
                    })
            }
            OutputMode::Identifier => {
                let line = format!("{} {}", record.source_label, self.annotation(record));
                self.print(&line)
            }
            OutputMode::Inspect => {
                let matched = String::from_utf8_lossy(&record.matched);
                let matched = if self.options.color {
                    matched.magenta().to_string()
                } else {
                    matched.into_owned()
                };
                let line = format!(
                    "{}{matched}{}",
                    String::from_utf8_lossy(&record.left),
                    String::from_utf8_lossy(&record.right)
                );
                self.print(&line)
            }
        }
    }

    /// `<read_id> <pattern_id>:<start>-<end>`, plus the matched sequence if enabled
    fn annotation(&self, record: &SegmentedRecord) -> String {
        let mut annotation = format!(
            "{} {}:{}-{}",
            record.read_id, record.pattern_id, record.start, record.end
        );
        if self.options.include_match_sequence {
            annotation.push(' ');
            annotation.push_str(&String::from_utf8_lossy(&record.match_sequence));
        }
        annotation
    }

    fn get_or_create<'m>(
        &self,
        sinks: &'m mut BTreeMap<PatternId, Route>,
        record: &SegmentedRecord,
    ) -> Result<&'m mut Route, OutputError> {
        match sinks.entry(record.pattern_id) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let path = route_path(
                    &self.options.output_dir,
                    &record.source_label,
                    record.pattern_id,
                );
                debug!("Opening output {}", path.display());
                let route = Route::create(Arc::clone(&record.source_label), path)?;
                Ok(entry.insert(route))
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn with_primary<T>(&self, f: impl FnOnce(&W) -> T) -> T {
        f(&self.primary.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn print(&self, line: &str) -> Result<(), OutputError> {
        let mut primary = self.primary.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(primary, "{line}").map_err(OutputError::Primary)
    }

    /// Close every sink exactly once and flush the primary output.
    ///
    /// All sinks are closed even if one fails; the first failure is returned.
    ///
    /// # Errors
    ///
    /// Returns the first `OutputError` met while closing.
    pub fn finish(&self) -> Result<RouteReport, OutputError> {
        let sinks = std::mem::take(&mut *self.sinks.lock().unwrap_or_else(PoisonError::into_inner));

        let mut report = RouteReport::default();
        let mut first_error = None;
        for (pattern_id, route) in sinks {
            let source_label = route.source_label.to_string();
            match route.close() {
                Ok(summary) => report.routes.push(RouteEntry {
                    source_label,
                    pattern_id,
                    summary,
                }),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        let flushed = self
            .primary
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()
            .map_err(OutputError::Primary);

        match first_error {
            Some(e) => Err(e),
            None => flushed.map(|()| report),
        }
    }
}

impl<W: Write> Drop for RoutePool<W> {
    fn drop(&mut self) {
        let sinks = std::mem::take(self.sinks.get_mut().unwrap_or_else(PoisonError::into_inner));
        for (_, route) in sinks {
            let path = route.path.clone();
            match route.close() {
                Ok(summary) => warn!(
                    "Closed unfinished output {} after {} records",
                    path.display(),
                    summary.records
                ),
                Err(e) => warn!("{e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::MultiGzDecoder;
    use std::io::Read;
    use tempfile::TempDir;

    fn segmented(label: &str, pattern: u64, seq: &str) -> SegmentedRecord {
        SegmentedRecord {
            pattern_id: PatternId::new(pattern),
            start: 2,
            end: 6,
            source_label: Arc::from(label),
            identifier: "@read1 1:N:0".to_string(),
            read_id: "read1".to_string(),
            left: b"gg".to_vec(),
            matched: b"ACGT".to_vec(),
            right: b"cc".to_vec(),
            match_sequence: b"ACGT".to_vec(),
            sequence: seq.as_bytes().to_vec(),
            quality: vec![b'I'; seq.len()],
        }
    }

    fn options(mode: OutputMode, dir: &Path) -> RouteOptions {
        RouteOptions {
            mode,
            output_dir: dir.to_path_buf(),
            ..RouteOptions::default()
        }
    }

    fn read_gz(path: &Path) -> String {
        let mut text = String::new();
        MultiGzDecoder::new(File::open(path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        text
    }

    #[test]
    fn test_route_path() {
        assert_eq!(
            route_path(Path::new("out"), "s1_R1", PatternId::new(42)),
            PathBuf::from("out/s1_R1.42.demux.fastq.gz")
        );
    }

    #[test]
    fn test_structured_output_creates_one_sink_per_pattern() {
        let dir = TempDir::new().unwrap();
        let pool = RoutePool::new(options(OutputMode::Structured, dir.path()), Vec::new());

        pool.route(&segmented("s1_R1", 1, "ggACGTcc")).unwrap();
        pool.route(&segmented("s1_R1", 1, "ggACGTcc")).unwrap();
        pool.route(&segmented("s1_R1", 2, "ggACGTcc")).unwrap();
        assert_eq!(pool.open_routes(), 2);

        let report = pool.finish().unwrap();
        assert_eq!(report.routes.len(), 2);
        assert_eq!(report.routes[0].summary.records, 2);
        assert_eq!(pool.open_routes(), 0);

        let text = read_gz(&dir.path().join("s1_R1.1.demux.fastq.gz"));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[0], "@read1 1:N:0");
        assert_eq!(lines[1], "ggACGTcc");
        assert_eq!(lines[2], "+read1 1:2-6 ACGT");
        assert_eq!(lines[3], "IIIIIIII");
    }

    #[test]
    fn test_both_mates_share_the_sink_opened_first() {
        let dir = TempDir::new().unwrap();
        let pool = RoutePool::new(options(OutputMode::Structured, dir.path()), Vec::new());

        pool.route(&segmented("s1_R2", 4, "ttACGTaa")).unwrap();
        pool.route(&segmented("s1_R1", 4, "ggACGTcc")).unwrap();
        assert_eq!(pool.open_routes(), 1);

        let report = pool.finish().unwrap();
        assert_eq!(report.routes.len(), 1);
        assert_eq!(report.routes[0].source_label, "s1_R2");
        assert_eq!(report.routes[0].pattern_id, PatternId::new(4));
        assert_eq!(report.routes[0].summary.records, 2);

        assert!(!dir.path().join("s1_R1.4.demux.fastq.gz").exists());
        let text = read_gz(&dir.path().join("s1_R2.4.demux.fastq.gz"));
        let sequences: Vec<&str> = text.lines().skip(1).step_by(4).collect();
        assert_eq!(sequences, ["ttACGTaa", "ggACGTcc"]);
    }

    #[test]
    fn test_structured_output_without_match_sequence() {
        let dir = TempDir::new().unwrap();
        let opts = RouteOptions {
            include_match_sequence: false,
            ..options(OutputMode::Structured, dir.path())
        };
        let pool = RoutePool::new(opts, Vec::new());
        pool.route(&segmented("s1_R1", 7, "ggcc")).unwrap();
        pool.finish().unwrap();

        let text = read_gz(&dir.path().join("s1_R1.7.demux.fastq.gz"));
        assert_eq!(text.lines().nth(2), Some("+read1 7:2-6"));
    }

    #[test]
    fn test_identifier_output() {
        let dir = TempDir::new().unwrap();
        let pool = RoutePool::new(options(OutputMode::Identifier, dir.path()), Vec::new());
        pool.route(&segmented("s1_R2", 3, "ggACGTcc")).unwrap();
        pool.finish().unwrap();

        let primary = pool.primary.lock().unwrap();
        assert_eq!(
            String::from_utf8_lossy(&primary),
            "s1_R2 read1 3:2-6 ACGT\n"
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_inspect_output_plain_and_colored() {
        let dir = TempDir::new().unwrap();
        let pool = RoutePool::new(options(OutputMode::Inspect, dir.path()), Vec::new());
        pool.route(&segmented("s1_R1", 1, "ggACGTcc")).unwrap();
        assert_eq!(
            String::from_utf8_lossy(&pool.primary.lock().unwrap()),
            "ggACGTcc\n"
        );

        colored::control::set_override(true);
        let opts = RouteOptions {
            color: true,
            ..options(OutputMode::Inspect, dir.path())
        };
        let pool = RoutePool::new(opts, Vec::new());
        pool.route(&segmented("s1_R1", 1, "ggACGTcc")).unwrap();
        let out = String::from_utf8_lossy(&pool.primary.lock().unwrap()).into_owned();
        assert!(out.starts_with("gg\u{1b}["));
        assert!(out.contains("ACGT"));
        assert!(out.ends_with("cc\n"));
    }

    #[test]
    fn test_drop_closes_open_sinks() {
        let dir = TempDir::new().unwrap();
        {
            let pool = RoutePool::new(options(OutputMode::Structured, dir.path()), Vec::new());
            pool.route(&segmented("s1_R1", 9, "ggACGTcc")).unwrap();
        }
        let text = read_gz(&dir.path().join("s1_R1.9.demux.fastq.gz"));
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn test_unwritable_output_dir() {
        let pool = RoutePool::new(
            options(OutputMode::Structured, Path::new("/nonexistent/out")),
            Vec::new(),
        );
        assert!(matches!(
            pool.route(&segmented("s1_R1", 1, "ggACGTcc")),
            Err(OutputError::Create { .. })
        ));
    }
}
