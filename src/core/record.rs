use std::sync::Arc;

use thiserror::Error;

/// Problems with the content of an individual read
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ContentError {
    #[error("Sequence and quality lengths differ in record '{record}' ({sequence} vs {quality})")]
    LengthMismatch {
        record: String,
        sequence: usize,
        quality: usize,
    },

    #[error("Unexpected character '{character}' at offset {offset} in record '{record}':\n{sequence}")]
    UnexpectedBase {
        record: String,
        character: char,
        offset: usize,
        sequence: String,
    },

    #[error("Malformed record identifier, expected '@<id>': '{0}'")]
    MalformedIdentifier(String),

    #[error("Match span {start}-{end} is outside the {len} byte buffer of record '{record}'")]
    SpanOutOfBounds {
        record: String,
        start: usize,
        end: usize,
        len: usize,
    },
}

/// One FASTQ entry read from one input stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    /// Label of the input the record came from (the input file basename)
    pub source_label: Arc<str>,

    /// Full header line, including the leading `@`
    pub identifier: String,

    pub sequence: Vec<u8>,

    pub quality: Vec<u8>,
}

impl SequenceRecord {
    /// Build a record, enforcing that sequence and quality have equal length.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::LengthMismatch` when the lengths differ.
    pub fn new(
        source_label: Arc<str>,
        identifier: impl Into<String>,
        sequence: Vec<u8>,
        quality: Vec<u8>,
    ) -> Result<Self, ContentError> {
        let identifier = identifier.into();
        if sequence.len() != quality.len() {
            return Err(ContentError::LengthMismatch {
                record: identifier,
                sequence: sequence.len(),
                quality: quality.len(),
            });
        }

        Ok(Self {
            source_label,
            identifier,
            sequence,
            quality,
        })
    }

    /// The read id: the first whitespace-delimited token after the leading `@`.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::MalformedIdentifier` if the header does not start
    /// with `@` immediately followed by a non-whitespace token.
    pub fn read_id(&self) -> Result<&str, ContentError> {
        parse_read_id(&self.identifier)
    }
}

/// Extract the read id from a FASTQ header line such as `@read1 1:N:0:ACGT`.
///
/// # Errors
///
/// Returns `ContentError::MalformedIdentifier` when there is no `@<token>` prefix.
pub fn parse_read_id(header: &str) -> Result<&str, ContentError> {
    let malformed = || ContentError::MalformedIdentifier(header.to_string());

    let rest = header.strip_prefix('@').ok_or_else(malformed)?;
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    if end == 0 {
        return Err(malformed());
    }
    Ok(&rest[..end])
}
