//! Gain Parameter Store
//!
//! Shares the per-band gain vector between one writer (the control surface)
//! and one reader (the audio thread).
//!
//! # Architecture
//!
//! The vector lives in a triple buffer. The writer edits its own copy and
//! publishes the whole vector; the reader swaps in the most recently published
//! vector with a single atomic exchange. The reader never waits on the writer
//! and can only ever see a vector that was published in one piece, so there is
//! no tearing within a gain value or across bands.

use triple_buffer::{Input, Output, TripleBuffer};

use crate::error::DspError;

/// Lowest gain a band can be set to (silence)
pub const MIN_GAIN: f32 = 0.0;

/// Highest gain a band can be set to
pub const MAX_GAIN: f32 = 10.0;

/// Gain that leaves a band unchanged
pub const UNITY_GAIN: f32 = 1.0;

/// Clamp a gain into `[MIN_GAIN, MAX_GAIN]`
#[inline]
pub fn clamp_gain(value: f32) -> f32 {
    value.clamp(MIN_GAIN, MAX_GAIN)
}

/// Create a gain store for `bands` bands
///
/// Without `initial` every band starts at unity (flat response). An initial
/// vector must have exactly `bands` entries; its values are clamped.
pub fn gain_store(
    bands: usize,
    initial: Option<&[f32]>,
) -> Result<(GainWriter, GainReader), DspError> {
    let gains = match initial {
        Some(values) => {
            if values.len() != bands {
                return Err(DspError::GainCountMismatch {
                    expected: bands,
                    got: values.len(),
                });
            }
            validated(values)?
        }
        None => vec![UNITY_GAIN; bands],
    };

    let (input, output) = TripleBuffer::new(&gains).split();
    Ok((GainWriter { input, gains }, GainReader { output }))
}

fn validated(values: &[f32]) -> Result<Vec<f32>, DspError> {
    values
        .iter()
        .enumerate()
        .map(|(band, &value)| {
            if value.is_nan() {
                Err(DspError::NonFiniteGain(band))
            } else {
                Ok(clamp_gain(value))
            }
        })
        .collect()
}

/// Control-surface side of the store
///
/// Not real-time: publishing clones the vector.
pub struct GainWriter {
    input: Input<Vec<f32>>,
    /// Writer's own copy, always equal to the last published vector
    gains: Vec<f32>,
}

impl GainWriter {
    /// Set one band's gain, returning the clamped value that was stored
    pub fn set(&mut self, index: usize, value: f32) -> Result<f32, DspError> {
        if index >= self.gains.len() {
            return Err(DspError::InvalidBandIndex {
                index,
                bands: self.gains.len(),
            });
        }
        if value.is_nan() {
            return Err(DspError::NonFiniteGain(index));
        }

        let gain = clamp_gain(value);
        self.gains[index] = gain;
        self.publish();
        Ok(gain)
    }

    /// Replace every band's gain at once
    ///
    /// The length must match the band count; the vector is never resized.
    pub fn set_all(&mut self, values: &[f32]) -> Result<(), DspError> {
        if values.len() != self.gains.len() {
            return Err(DspError::GainCountMismatch {
                expected: self.gains.len(),
                got: values.len(),
            });
        }

        self.gains = validated(values)?;
        self.publish();
        Ok(())
    }

    /// Back to a flat response
    pub fn reset(&mut self) {
        self.gains.fill(UNITY_GAIN);
        self.publish();
    }

    /// Gains as last written
    pub fn gains(&self) -> &[f32] {
        &self.gains
    }

    pub fn len(&self) -> usize {
        self.gains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gains.is_empty()
    }

    /// Start a new reader seeded with the current gains
    ///
    /// The previously handed-out reader stops receiving updates. Used when the
    /// audio stream is rebuilt, since the old reader went away with the old
    /// stream.
    pub fn attach_reader(&mut self) -> GainReader {
        let (input, output) = TripleBuffer::new(&self.gains).split();
        self.input = input;
        GainReader { output }
    }

    fn publish(&mut self) {
        self.input.write(self.gains.clone());
    }
}

/// Audio-thread side of the store
pub struct GainReader {
    output: Output<Vec<f32>>,
}

impl GainReader {
    /// Latest complete gain vector
    ///
    /// # Real-time Safety
    /// Wait-free: one atomic swap when an update is pending, no allocation.
    #[inline]
    pub fn snapshot(&mut self) -> &[f32] {
        self.output.read().as_slice()
    }
}
