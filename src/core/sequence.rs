//! Nucleotide helpers used when reorienting reads.

/// Complement of a single base, preserving case.
///
/// Only `A`, `C`, `G`, `T`, `N` and the `.` no-call are recognized.
#[must_use]
pub fn complement(base: u8) -> Option<u8> {
    match base {
        b'A' => Some(b'T'),
        b'T' => Some(b'A'),
        b'C' => Some(b'G'),
        b'G' => Some(b'C'),
        b'N' => Some(b'N'),
        b'a' => Some(b't'),
        b't' => Some(b'a'),
        b'c' => Some(b'g'),
        b'g' => Some(b'c'),
        b'n' => Some(b'n'),
        b'.' => Some(b'.'),
        _ => None,
    }
}

/// Reverse complement a sequence.
///
/// Returns an unrecognized byte and its offset as the error.
pub fn reverse_complement(seq: &[u8]) -> Result<Vec<u8>, (usize, u8)> {
    seq.iter()
        .enumerate()
        .rev()
        .map(|(i, &base)| complement(base).ok_or((i, base)))
        .collect()
}

/// Reverse a quality string. Scores are not complemented.
#[must_use]
pub fn reverse(qual: &[u8]) -> Vec<u8> {
    qual.iter().rev().copied().collect()
}
