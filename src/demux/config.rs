use std::path::PathBuf;

use crate::core::types::{OutputMode, TrimFlags};
use crate::demux::routes::RouteOptions;
use crate::demux::segment::Segmenter;

/// Immutable settings for one demultiplexing run, built once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemuxConfig {
    pub trim: TrimFlags,
    pub reverse_complement: bool,
    pub mode: OutputMode,
    pub include_match_sequence: bool,
    pub color: bool,
    pub output_dir: PathBuf,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            trim: TrimFlags::default(),
            reverse_complement: false,
            mode: OutputMode::Inspect,
            include_match_sequence: true,
            color: false,
            output_dir: PathBuf::from("."),
        }
    }
}

impl DemuxConfig {
    #[must_use]
    pub fn segmenter(&self) -> Segmenter {
        Segmenter::new(self.trim, self.reverse_complement)
    }

    #[must_use]
    pub fn route_options(&self) -> RouteOptions {
        RouteOptions {
            mode: self.mode,
            include_match_sequence: self.include_match_sequence,
            color: self.color,
            output_dir: self.output_dir.clone(),
        }
    }
}
