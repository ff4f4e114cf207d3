//! DSP Error Types

use thiserror::Error;

/// Errors that can occur while configuring or driving the equalizer core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DspError {
    #[error("Invalid block size: {0} (must be positive)")]
    InvalidBlockSize(usize),

    #[error("Invalid band count: {bands} bands for a {block_size}-bin spectrum")]
    InvalidBandCount { bands: usize, block_size: usize },

    #[error("Invalid band partition: {0}")]
    InvalidPartition(String),

    #[error("Invalid band index: {index} (must be 0-{})", .bands.saturating_sub(1))]
    InvalidBandIndex { index: usize, bands: usize },

    #[error("Gain vector length mismatch: expected {expected}, got {got}")]
    GainCountMismatch { expected: usize, got: usize },

    #[error("Gain for band {0} is not a number")]
    NonFiniteGain(usize),
}
