//! FASTQ record sources using noodles.
//!
//! Supports both uncompressed and gzip/bgzip compressed files, and standard
//! input via `-`, `stdin` or `/dev/stdin`. Compression is detected from the
//! file name suffix.

use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::read::MultiGzDecoder;
use indicatif::ProgressBar;
use noodles::fastq;
use thiserror::Error;

use crate::core::record::{ContentError, SequenceRecord};
use crate::utils::validation::{input_basename, is_gzipped, is_stdin};

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Couldn't open input '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read record {record} from '{label}': {source}")]
    Record {
        label: String,
        record: u64,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Content(#[from] ContentError),
}

/// A stream of records from one input, each tagged with the input's label
pub trait RecordSource {
    /// Label attached to every record from this source
    fn label(&self) -> &str;

    /// Next record, or `None` once the source is exhausted
    ///
    /// # Errors
    ///
    /// Returns a `ReadError` for unreadable or malformed input.
    fn next_record(&mut self) -> Result<Option<SequenceRecord>, ReadError>;
}

/// Reads FASTQ records from any buffered reader
pub struct FastqSource<R> {
    label: Arc<str>,
    reader: fastq::io::Reader<R>,
    record: fastq::Record,
    count: u64,
}

impl<R: BufRead> FastqSource<R> {
    pub fn new(label: impl Into<Arc<str>>, inner: R) -> Self {
        Self {
            label: label.into(),
            reader: fastq::io::Reader::new(inner),
            record: fastq::Record::default(),
            count: 0,
        }
    }

    /// Number of records read so far
    #[must_use]
    pub fn records_read(&self) -> u64 {
        self.count
    }
}

impl<R: BufRead> RecordSource for FastqSource<R> {
    fn label(&self) -> &str {
        &self.label
    }

    fn next_record(&mut self) -> Result<Option<SequenceRecord>, ReadError> {
        let n = self
            .reader
            .read_record(&mut self.record)
            .map_err(|source| ReadError::Record {
                label: self.label.to_string(),
                record: self.count + 1,
                source,
            })?;
        if n == 0 {
            return Ok(None);
        }
        self.count += 1;

        let name = String::from_utf8_lossy(self.record.name());
        let description = self.record.description();
        let identifier = if description.is_empty() {
            format!("@{name}")
        } else {
            format!("@{name} {}", String::from_utf8_lossy(description))
        };

        let record = SequenceRecord::new(
            Arc::clone(&self.label),
            identifier,
            self.record.sequence().to_vec(),
            self.record.quality_scores().to_vec(),
        )?;
        Ok(Some(record))
    }
}

/// Open a FASTQ input, labelled with its basename.
///
/// # Errors
///
/// Returns `ReadError::Open` if the file cannot be opened.
pub fn open_fastq(path: &Path) -> Result<FastqSource<Box<dyn BufRead>>, ReadError> {
    open_fastq_with_progress(path, &ProgressBar::hidden())
}

/// Open a FASTQ input and advance `progress` by the bytes read from it.
///
/// Progress counts raw bytes, before any decompression, so a file's length
/// is the bar's total.
///
/// # Errors
///
/// Returns `ReadError::Open` if the file cannot be opened.
pub fn open_fastq_with_progress(
    path: &Path,
    progress: &ProgressBar,
) -> Result<FastqSource<Box<dyn BufRead>>, ReadError> {
    let label = input_basename(path);

    let inner: Box<dyn BufRead> = if is_stdin(path) {
        Box::new(BufReader::new(progress.wrap_read(io::stdin())))
    } else {
        let open_error = |source| ReadError::Open {
            path: path.to_path_buf(),
            source,
        };
        let file = std::fs::File::open(path).map_err(open_error)?;
        progress.set_length(file.metadata().map_err(open_error)?.len());

        let raw = BufReader::new(progress.wrap_read(file));
        if is_gzipped(path) {
            Box::new(BufReader::new(MultiGzDecoder::new(raw)))
        } else {
            Box::new(raw)
        }
    };

    Ok(FastqSource::new(label, inner))
}
