//! Spektral Core - Equalizer Engine
//!
//! This crate wires the DSP pipeline to real audio devices:
//! - Configuration loading and validation
//! - Device resolution and stream management (via CPAL)
//! - The engine context that owns the band layout and the gain store
//! - Lock-free communication between the control surface and audio threads
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Control Surface                         │
//! │   set_band_gain ──▶ GainWriter     commands ──▶ Engine      │
//! └─────────────────────────────────────────────────────────────┘
//!        │ triple buffer                   │ crossbeam-channel
//!        ▼                                 ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Audio Thread                           │
//! │   Capture ──rtrb──▶ BlockProcessor ──▶ Output               │
//! │              (Zero allocation in this path)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod device;
mod engine;
mod error;
mod message;
mod stream;

pub use config::{EngineConfig, EqConfig, StreamConfig};
pub use device::{resolve_input, resolve_output, DeviceType};
pub use engine::EqualizerEngine;
pub use error::{EngineError, EngineResult};
pub use message::{BandInfo, Command, Event};
pub use stream::{AudioStream, SharedState};

// Re-export DSP types for convenience
pub use spektral_dsp::{Band, BandLayout, DspError, MAX_GAIN, MIN_GAIN, UNITY_GAIN};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_exports() {
        // Verify public API is accessible
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.eq.layout(1024).unwrap().len(), 10);
    }
}
