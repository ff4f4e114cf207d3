//! Spektral DSP - Block FFT Equalizer Core
//!
//! This crate provides the processing pipeline for Spektral:
//! - Forward/inverse FFT of fixed-size blocks with reusable plans
//! - Partition of the spectrum into user-adjustable bands
//! - Wait-free gain sharing between the control surface and the audio thread
//! - Block processor that ties them together inside the audio callback
//!
//! # Architecture
//!
//! The DSP chain follows a strict "no allocation in audio callback" rule.
//! Plans, frames and scratch buffers are created up front; gain vectors are
//! published whole by the control side and picked up between blocks.

mod bands;
mod error;
mod gains;
mod processor;
mod transform;

pub use bands::{Band, BandLayout};
pub use error::DspError;
pub use gains::{clamp_gain, gain_store, GainReader, GainWriter, MAX_GAIN, MIN_GAIN, UNITY_GAIN};
pub use processor::{AudioProcessor, BlockProcessor, ProcessContext};
pub use transform::{SpectralTransform, TransformPlan};

pub use rustfft::num_complex::Complex32;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_crate_exports() {
        // Verify all public types are accessible
        let layout = Arc::new(BandLayout::linear(1024, 10).unwrap());
        let (_writer, reader) = gain_store(layout.len(), None).unwrap();
        let transform = SpectralTransform::prepare(1024).unwrap();
        let _processor = BlockProcessor::new(transform, layout, reader).unwrap();
    }
}
