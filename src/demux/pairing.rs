use thiserror::Error;

use crate::core::record::SequenceRecord;
use crate::demux::DemuxError;
use crate::parsing::fastq::RecordSource;

/// The two inputs ran out of records on different steps
#[derive(Error, Debug, PartialEq, Eq)]
#[error(
    "Encountered input file record mismatch: '{label_a}' has {count_a} records but '{label_b}' has {count_b}"
)]
pub struct PairingError {
    pub label_a: String,
    pub count_a: u64,
    pub label_b: String,
    pub count_b: u64,
}

/// Where a paired iteration stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairState {
    /// Still yielding pairs
    Reading,
    /// Both inputs ended on the same step
    Complete,
    /// The inputs are not record-aligned, or a read failed
    Broken,
}

/// Advances two record sources in lockstep.
///
/// Every step reads one record from each side before looking at either
/// result, so an exhausted side is always detected on the step it ends. The
/// iterator is fused after the first error or after clean completion.
pub struct PairedRecords<A, B> {
    a: A,
    b: B,
    count_a: u64,
    count_b: u64,
    state: PairState,
}

impl<A: RecordSource, B: RecordSource> PairedRecords<A, B> {
    pub fn new(a: A, b: B) -> Self {
        Self {
            a,
            b,
            count_a: 0,
            count_b: 0,
            state: PairState::Reading,
        }
    }

    #[must_use]
    pub fn state(&self) -> PairState {
        self.state
    }

    /// Records read from each side so far
    #[must_use]
    pub fn counts(&self) -> (u64, u64) {
        (self.count_a, self.count_b)
    }

    fn mismatch(&self) -> PairingError {
        PairingError {
            label_a: self.a.label().to_string(),
            count_a: self.count_a,
            label_b: self.b.label().to_string(),
            count_b: self.count_b,
        }
    }
}

impl<A: RecordSource, B: RecordSource> Iterator for PairedRecords<A, B> {
    type Item = Result<(SequenceRecord, SequenceRecord), DemuxError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != PairState::Reading {
            return None;
        }

        let next_a = self.a.next_record();
        let next_b = self.b.next_record();

        let (next_a, next_b) = match (next_a, next_b) {
            (Ok(a), Ok(b)) => (a, b),
            (Err(e), _) | (_, Err(e)) => {
                self.state = PairState::Broken;
                return Some(Err(e.into()));
            }
        };

        self.count_a += u64::from(next_a.is_some());
        self.count_b += u64::from(next_b.is_some());

        match (next_a, next_b) {
            (Some(a), Some(b)) => Some(Ok((a, b))),
            (None, None) => {
                self.state = PairState::Complete;
                None
            }
            _ => {
                self.state = PairState::Broken;
                Some(Err(self.mismatch().into()))
            }
        }
    }
}
