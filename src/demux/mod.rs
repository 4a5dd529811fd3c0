//! Paired-read demultiplexing.
//!
//! Records from two inputs are read in lockstep ([`pairing`]), each record is
//! scanned against the compiled pattern database, every match event is cut
//! into a [`segment::SegmentedRecord`], and the result is delivered by a
//! [`routes::RoutePool`]. [`pipeline`] ties these steps together, driven by
//! one [`config::DemuxConfig`].

pub mod config;
pub mod pairing;
pub mod pipeline;
pub mod routes;
pub mod segment;

use thiserror::Error;

use crate::core::record::ContentError;
use crate::parsing::fastq::ReadError;
use pairing::PairingError;
use routes::OutputError;

#[derive(Error, Debug)]
pub enum DemuxError {
    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Pairing(#[from] PairingError),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("Interrupted")]
    Interrupted,
}

impl DemuxError {
    /// Content errors may surface while reading or while segmenting
    #[must_use]
    pub fn is_content_error(&self) -> bool {
        matches!(
            self,
            Self::Content(_) | Self::Read(ReadError::Content(_))
        )
    }
}
