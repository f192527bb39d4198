//! Error types for the tile pipeline.
//!
//! Per-tile failures ([`TileError`]) never abort the pipeline: the worker
//! converts them into a failed outcome and the manager leaves a gap for that
//! frame. Cancellation is not an error and has no variant here.

use thiserror::Error;

use crate::config::ConfigError;
use crate::tile::TileId;

/// Errors raised by styles while evaluating draw rules.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StyleError {
    /// A coordinate was NaN or infinite.
    #[error("non-finite coordinate in layer '{layer}'")]
    NonFiniteCoordinate { layer: String },

    /// A polygon ring had fewer than three distinct points.
    #[error("degenerate polygon ring with {points} points in layer '{layer}'")]
    DegenerateRing { layer: String, points: usize },

    /// A line had fewer than two points.
    #[error("line with {points} points in layer '{layer}'")]
    DegenerateLine { layer: String, points: usize },

    /// A draw rule parameter was out of range.
    #[error("invalid draw parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },
}

/// Why a single tile could not be produced.
#[derive(Debug, Error)]
pub enum TileError {
    /// The source could not supply raw data.
    #[error("fetch failed for {tile}: {reason}")]
    Fetch { tile: TileId, reason: String },

    /// The raw payload was malformed.
    #[error("parse failed for {tile}: {reason}")]
    Parse { tile: TileId, reason: String },

    /// A style failed while building geometry.
    #[error("build failed for {tile} in style '{style}': {source}")]
    Build {
        tile: TileId,
        style: String,
        #[source]
        source: StyleError,
    },

    /// No scene was set when the task was dequeued.
    #[error("no scene loaded while building {tile}")]
    NoScene { tile: TileId },

    /// A worker stage panicked; caught at the task boundary.
    #[error("worker panicked while processing {tile}: {message}")]
    Panicked { tile: TileId, message: String },
}

impl TileError {
    /// Creates a parse failure.
    pub fn parse(tile: TileId, reason: impl Into<String>) -> Self {
        Self::Parse {
            tile,
            reason: reason.into(),
        }
    }

    /// Creates a fetch failure.
    pub fn fetch(tile: TileId, reason: impl Into<String>) -> Self {
        Self::Fetch {
            tile,
            reason: reason.into(),
        }
    }

    /// The tile this error belongs to.
    pub fn tile(&self) -> TileId {
        match self {
            Self::Fetch { tile, .. }
            | Self::Parse { tile, .. }
            | Self::Build { tile, .. }
            | Self::NoScene { tile }
            | Self::Panicked { tile, .. } => *tile,
        }
    }

    /// True for malformed payloads.
    pub fn is_parse_failure(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }

    /// True for style evaluation failures.
    pub fn is_build_failure(&self) -> bool {
        matches!(self, Self::Build { .. })
    }
}

/// Errors constructing or operating the pipeline itself.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration was rejected.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A worker thread could not be spawned.
    #[error("failed to spawn tile worker thread: {0}")]
    SpawnWorker(#[source] std::io::Error),
}
