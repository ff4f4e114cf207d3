//! Message Types for Thread Communication
//!
//! Commands flow from the control surface -> audio control thread
//! Events flow from the audio control thread -> control surface
//!
//! Gain changes do not travel as commands; they go through the gain store so
//! that bad band indices are reported to the caller immediately.

use serde::{Deserialize, Serialize};
use spektral_dsp::Band;

/// Commands sent to the audio control thread
#[derive(Debug, Clone)]
pub enum Command {
    /// Open devices and start processing
    Start,

    /// Stop processing and close devices
    Stop,

    /// Bypass the equalizer (audio passes through untouched)
    SetBypass(bool),

    /// Request current state (triggers StateUpdate event)
    RequestState,

    /// Shutdown the engine
    Shutdown,
}

/// Events sent back to the control surface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    /// Engine started successfully
    Started,

    /// Engine stopped
    Stopped,

    /// Error occurred
    Error { message: String },

    /// Output peak level for meters, 0.0 - 1.0 (may exceed 1.0 when boosted)
    LevelUpdate { peak: f32 },

    /// Current state snapshot
    StateUpdate {
        is_running: bool,
        is_bypassed: bool,
        gains: Vec<f32>,
    },

    /// Output ran out of samples and played silence (audio glitch)
    BufferUnderrun,

    /// Capture found the ring full and dropped samples (output too slow)
    BufferOverrun,
}

impl Event {
    /// Create an error event from any error type
    pub fn error<E: std::fmt::Display>(err: E) -> Self {
        Event::Error {
            message: err.to_string(),
        }
    }
}

/// Band description for rendering one control per band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandInfo {
    pub index: usize,
    pub label: String,
    /// First bin (inclusive)
    pub lo: usize,
    /// Last bin (exclusive)
    pub hi: usize,
    pub low_hz: f32,
    pub high_hz: f32,
}

impl BandInfo {
    pub fn new(index: usize, band: &Band, sample_rate: f32, block_size: usize) -> Self {
        let (low_hz, high_hz) = band.frequency_range(sample_rate, block_size);
        Self {
            index,
            label: band.label.clone(),
            lo: band.lo,
            hi: band.hi,
            low_hz,
            high_hz,
        }
    }
}
