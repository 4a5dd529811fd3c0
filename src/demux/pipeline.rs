use std::io::Write;
use std::thread;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, trace};

use crate::core::record::SequenceRecord;
use crate::core::types::OutputMode;
use crate::database::engine::PatternScanner;
use crate::demux::pairing::PairedRecords;
use crate::demux::routes::{RouteEntry, RoutePool};
use crate::demux::segment::{ScanBuffer, SegmentedRecord, Segmenter};
use crate::demux::DemuxError;
use crate::parsing::fastq::RecordSource;
use crate::utils::interrupt::InterruptFlag;

/// Pairs handed to the scanning threads at a time in parallel mode
pub const DEFAULT_BATCH_SIZE: usize = 4096;

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Record pairs read
    pub pairs: u64,
    /// Individual records scanned
    pub records: u64,
    /// Match events delivered to the outputs
    pub matches: u64,
}

impl RunStats {
    fn add(&mut self, other: Self) {
        self.pairs += other.pairs;
        self.records += other.records;
        self.matches += other.matches;
    }
}

/// Machine-readable description of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub created_at: DateTime<Utc>,
    pub mode: OutputMode,
    pub patterns: usize,
    pub stats: RunStats,
    pub routes: Vec<RouteEntry>,
}

/// Scans records against a pattern database and routes every match.
///
/// Holds only shared references and immutable flags, so a single instance is
/// used from several threads at once in parallel mode.
pub struct Demultiplexer<'a, S, W: Write> {
    scanner: &'a S,
    segmenter: Segmenter,
    routes: &'a RoutePool<W>,
}

impl<'a, S, W> Demultiplexer<'a, S, W>
where
    S: PatternScanner + Sync,
    W: Write + Send,
{
    pub fn new(scanner: &'a S, segmenter: Segmenter, routes: &'a RoutePool<W>) -> Self {
        Self {
            scanner,
            segmenter,
            routes,
        }
    }

    /// Scan one record and build one output record per match event.
    ///
    /// The scan completes before any event is segmented, and outputs follow
    /// the order the scanner reports events in.
    ///
    /// # Errors
    ///
    /// Returns `DemuxError::Content` for malformed record content.
    pub fn segment_record(
        &self,
        record: &SequenceRecord,
    ) -> Result<Vec<SegmentedRecord>, DemuxError> {
        let buffer = ScanBuffer::new(record)?;
        let events = self.scanner.scan(buffer.scan_region());

        let outputs = events
            .map(|event| self.segmenter.segment(record, &buffer, event))
            .collect::<Result<Vec<_>, _>>()?;
        trace!("{}: {} matches", record.identifier, outputs.len());
        Ok(outputs)
    }

    /// Scan one record and deliver one output per match event.
    ///
    /// Returns the number of events delivered.
    ///
    /// # Errors
    ///
    /// Returns `DemuxError::Content` for malformed record content and
    /// `DemuxError::Output` if an output cannot be written.
    pub fn process_record(&self, record: &SequenceRecord) -> Result<u64, DemuxError> {
        let outputs = self.segment_record(record)?;
        self.deliver(&outputs)
    }

    fn deliver(&self, outputs: &[SegmentedRecord]) -> Result<u64, DemuxError> {
        for output in outputs {
            self.routes.route(output)?;
        }
        Ok(outputs.len() as u64)
    }

    /// Segment records in order, stopping after the first failure
    fn segment_batch(
        &self,
        records: &[SequenceRecord],
    ) -> Vec<Result<Vec<SegmentedRecord>, DemuxError>> {
        let mut segmented = Vec::with_capacity(records.len());
        for record in records {
            let result = self.segment_record(record);
            let failed = result.is_err();
            segmented.push(result);
            if failed {
                break;
            }
        }
        segmented
    }

    /// Process two inputs pair by pair until both end together.
    ///
    /// With `batch_size` set, pairs are read in batches and the two sides of
    /// each batch are scanned and segmented on separate threads. Delivery
    /// stays on the calling thread in input order, so every output is the
    /// same as in a sequential run.
    ///
    /// # Errors
    ///
    /// Returns the first read, pairing, content or output error, or
    /// `DemuxError::Interrupted` once `interrupt` is raised.
    pub fn run_paired<A, B>(
        &self,
        pairs: &mut PairedRecords<A, B>,
        interrupt: &InterruptFlag,
        batch_size: Option<usize>,
    ) -> Result<RunStats, DemuxError>
    where
        A: RecordSource,
        B: RecordSource,
    {
        match batch_size {
            Some(size) => self.run_batched(pairs, interrupt, size.max(1)),
            None => self.run_sequential(pairs, interrupt),
        }
    }

    fn run_sequential<A, B>(
        &self,
        pairs: &mut PairedRecords<A, B>,
        interrupt: &InterruptFlag,
    ) -> Result<RunStats, DemuxError>
    where
        A: RecordSource,
        B: RecordSource,
    {
        let mut stats = RunStats::default();
        for pair in pairs {
            if interrupt.is_set() {
                return Err(DemuxError::Interrupted);
            }
            let (a, b) = pair?;
            stats.matches += self.process_record(&a)?;
            stats.matches += self.process_record(&b)?;
            stats.pairs += 1;
            stats.records += 2;
        }
        Ok(stats)
    }

    fn run_batched<A, B>(
        &self,
        pairs: &mut PairedRecords<A, B>,
        interrupt: &InterruptFlag,
        batch_size: usize,
    ) -> Result<RunStats, DemuxError>
    where
        A: RecordSource,
        B: RecordSource,
    {
        let mut stats = RunStats::default();
        loop {
            if interrupt.is_set() {
                return Err(DemuxError::Interrupted);
            }

            let mut side_a = Vec::with_capacity(batch_size);
            let mut side_b = Vec::with_capacity(batch_size);
            let mut read_error = None;
            for pair in pairs.by_ref().take(batch_size) {
                match pair {
                    Ok((a, b)) => {
                        side_a.push(a);
                        side_b.push(b);
                    }
                    Err(e) => {
                        read_error = Some(e);
                        break;
                    }
                }
            }
            if side_a.is_empty() {
                return read_error.map_or(Ok(stats), Err);
            }
            debug!("Scanning batch of {} pairs", side_a.len());

            let (segmented_a, segmented_b) = thread::scope(|scope| {
                let handle = scope.spawn(|| self.segment_batch(&side_a));
                let segmented_b = self.segment_batch(&side_b);
                let segmented_a = handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
                (segmented_a, segmented_b)
            });

            // Each side stops at its first failure, which surfaces at the
            // same pair a sequential run would fail on.
            let mut segmented_a = segmented_a.into_iter();
            let mut segmented_b = segmented_b.into_iter();
            let mut matches = 0;
            for _ in 0..side_a.len() {
                for side in [&mut segmented_a, &mut segmented_b] {
                    if let Some(outputs) = side.next() {
                        matches += self.deliver(&outputs?)?;
                    }
                }
            }

            stats.add(RunStats {
                pairs: side_a.len() as u64,
                records: (side_a.len() + side_b.len()) as u64,
                matches,
            });
            if let Some(e) = read_error {
                return Err(e);
            }
        }
    }

    /// Process a single input, for scanning one file without a mate.
    ///
    /// # Errors
    ///
    /// Returns the first read, content or output error, or
    /// `DemuxError::Interrupted` once `interrupt` is raised.
    pub fn run_single<R: RecordSource>(
        &self,
        source: &mut R,
        interrupt: &InterruptFlag,
    ) -> Result<RunStats, DemuxError> {
        let mut stats = RunStats::default();
        while let Some(record) = source.next_record()? {
            if interrupt.is_set() {
                return Err(DemuxError::Interrupted);
            }
            stats.matches += self.process_record(&record)?;
            stats.records += 1;
        }
        Ok(stats)
    }
}
