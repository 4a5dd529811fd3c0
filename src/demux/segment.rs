use std::ops::Range;
use std::sync::Arc;

use crate::core::record::{parse_read_id, ContentError, SequenceRecord};
use crate::core::sequence::{reverse, reverse_complement};
use crate::core::types::{MatchEvent, PatternId, TrimFlags};

/// Line terminator appended to every scan buffer
const TERMINATOR: u8 = b'\n';

/// Sequence and quality of a record, prepared for scanning.
///
/// Both are trimmed of surrounding whitespace and terminated with `\n`, so
/// match offsets index both identically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanBuffer {
    sequence: Vec<u8>,
    quality: Vec<u8>,
}

impl ScanBuffer {
    /// # Errors
    ///
    /// Returns `ContentError::LengthMismatch` if the trimmed sequence and
    /// quality differ in length.
    pub fn new(record: &SequenceRecord) -> Result<Self, ContentError> {
        let sequence = terminated(&record.sequence);
        let quality = terminated(&record.quality);

        if sequence.len() != quality.len() {
            return Err(ContentError::LengthMismatch {
                record: record.identifier.clone(),
                sequence: sequence.len() - 1,
                quality: quality.len() - 1,
            });
        }

        Ok(Self { sequence, quality })
    }

    /// The terminated sequence that match offsets index
    #[must_use]
    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    /// The bytes handed to the pattern engine: the sequence without its
    /// terminator, so `$` anchors at the last base.
    #[must_use]
    pub fn scan_region(&self) -> &[u8] {
        &self.sequence[..self.content_len()]
    }

    /// Length of the sequence without its terminator
    #[must_use]
    pub fn content_len(&self) -> usize {
        self.sequence.len().saturating_sub(1)
    }

    #[must_use]
    pub fn quality(&self) -> &[u8] {
        &self.quality
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

fn terminated(bytes: &[u8]) -> Vec<u8> {
    let trimmed = trim_ascii_whitespace(bytes);
    let mut buffer = Vec::with_capacity(trimmed.len() + 1);
    buffer.extend_from_slice(trimmed);
    buffer.push(TERMINATOR);
    buffer
}

fn trim_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}

/// Left, match and right ranges of one match within its line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation {
    pub left: Range<usize>,
    pub matched: Range<usize>,
    pub right: Range<usize>,
}

impl Segmentation {
    /// Split the line containing `[start, end)` around the match.
    ///
    /// The line runs from just past the last `\n` before `start` to the first
    /// `\n` at or after `end`, or the buffer edges when there is none.
    #[must_use]
    pub fn locate(buffer: &[u8], start: usize, end: usize) -> Self {
        let left_bound = buffer[..start]
            .iter()
            .rposition(|&b| b == TERMINATOR)
            .map_or(0, |i| i + 1);
        let right_bound = buffer[end..]
            .iter()
            .position(|&b| b == TERMINATOR)
            .map_or(buffer.len(), |i| end + i);

        Self {
            left: left_bound..start,
            matched: start..end,
            right: end..right_bound,
        }
    }

    /// The whole line, `left_bound..right_bound`
    #[must_use]
    pub fn line(&self) -> Range<usize> {
        self.left.start..self.right.end
    }

    /// Clip every range to end at or before `limit`
    #[must_use]
    pub fn clamped(self, limit: usize) -> Self {
        let clamp = |range: Range<usize>| range.start.min(limit)..range.end.min(limit);
        Self {
            left: clamp(self.left),
            matched: clamp(self.matched),
            right: clamp(self.right),
        }
    }
}

/// A finished output record for one match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentedRecord {
    pub pattern_id: PatternId,
    pub start: usize,
    pub end: usize,

    /// Label of the input the record came from
    pub source_label: Arc<str>,

    /// Header line of the source record, including `@`
    pub identifier: String,

    /// Read id parsed from the header
    pub read_id: String,

    /// Sequence segments after trimming, before any reorientation
    pub left: Vec<u8>,
    pub matched: Vec<u8>,
    pub right: Vec<u8>,

    /// The matched sequence, whether or not it was trimmed
    pub match_sequence: Vec<u8>,

    /// Output sequence and quality
    pub sequence: Vec<u8>,
    pub quality: Vec<u8>,
}

/// Turns match events into trimmed, optionally reverse-complemented records.
///
/// Holds only the immutable run flags, so one instance serves every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct Segmenter {
    trim: TrimFlags,
    reverse_complement: bool,
}

impl Segmenter {
    #[must_use]
    pub fn new(trim: TrimFlags, reverse_complement: bool) -> Self {
        Self {
            trim,
            reverse_complement,
        }
    }

    /// Build the output record for one match against `record`.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::SpanOutOfBounds` for an impossible span,
    /// `ContentError::UnexpectedBase` if reverse complementing meets a
    /// character outside `ACGTN.`, or `ContentError::MalformedIdentifier` if
    /// the header has no `@<id>` prefix.
    pub fn segment(
        &self,
        record: &SequenceRecord,
        buffer: &ScanBuffer,
        event: MatchEvent,
    ) -> Result<SegmentedRecord, ContentError> {
        let MatchEvent {
            pattern_id,
            start,
            end,
        } = event;
        if start > end || end > buffer.len() {
            return Err(ContentError::SpanOutOfBounds {
                record: record.identifier.clone(),
                start,
                end,
                len: buffer.len(),
            });
        }

        // A span reaching into the terminator keeps only the bases before it
        let segmentation =
            Segmentation::locate(buffer.sequence(), start, end).clamped(buffer.content_len());
        let seq = buffer.sequence();
        let qual = buffer.quality();

        let keep = |range: &Range<usize>, trimmed: bool| -> Range<usize> {
            if trimmed {
                range.start..range.start
            } else {
                range.clone()
            }
        };
        let left = keep(&segmentation.left, self.trim.left);
        let matched = keep(&segmentation.matched, self.trim.matched);
        let right = keep(&segmentation.right, self.trim.right);

        let mut out_seq = Vec::with_capacity(left.len() + matched.len() + right.len());
        let mut out_qual = Vec::with_capacity(out_seq.capacity());
        for range in [&left, &matched, &right] {
            out_seq.extend_from_slice(&seq[range.clone()]);
            out_qual.extend_from_slice(&qual[range.clone()]);
        }

        if self.reverse_complement {
            out_seq = reverse_complement(&out_seq).map_err(|(offset, base)| {
                ContentError::UnexpectedBase {
                    record: record.identifier.clone(),
                    character: char::from(base),
                    offset,
                    sequence: String::from_utf8_lossy(&out_seq).into_owned(),
                }
            })?;
            out_qual = reverse(&out_qual);
        }

        let read_id = parse_read_id(&record.identifier)?.to_string();

        Ok(SegmentedRecord {
            pattern_id,
            start: segmentation.matched.start,
            end: segmentation.matched.end,
            source_label: Arc::clone(&record.source_label),
            identifier: record.identifier.clone(),
            read_id,
            left: seq[left].to_vec(),
            matched: seq[matched].to_vec(),
            right: seq[right].to_vec(),
            match_sequence: seq[segmentation.matched].to_vec(),
            sequence: out_seq,
            quality: out_qual,
        })
    }
}
