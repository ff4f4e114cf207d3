//! Real-Time Block Processor
//!
//! Defines the interface for audio processors driven from the audio callback,
//! and the block processor that runs the equalizer: copy the block in, forward
//! transform, scale bins by band gain, inverse transform, copy the block out.

use std::sync::Arc;

use crate::bands::BandLayout;
use crate::error::DspError;
use crate::gains::GainReader;
use crate::transform::SpectralTransform;

/// Context passed to processors containing stream metadata
#[derive(Debug, Clone, Copy)]
pub struct ProcessContext {
    pub sample_rate: f32,
    pub channels: usize,
    pub block_size: usize,
}

impl ProcessContext {
    pub fn new(sample_rate: f32, channels: usize, block_size: usize) -> Self {
        Self {
            sample_rate,
            channels,
            block_size,
        }
    }
}

/// Trait for processors invoked from the audio callback
///
/// # Real-time Safety Contract
///
/// Implementors MUST follow these rules in `process()`:
/// - NO heap allocations (no Vec::push, no Box::new, no String)
/// - NO syscalls (no file I/O, no network, no mutex locks)
/// - NO unbounded loops
/// - Constant or O(n) time complexity where n = buffer size
///
/// Violating these rules causes audio dropouts ("glitches").
pub trait AudioProcessor: Send {
    /// Process audio buffer in-place
    ///
    /// Buffer format is interleaved with `context.channels` channels.
    fn process(&mut self, buffer: &mut [f32], context: &ProcessContext);

    /// Reset internal state
    fn reset(&mut self);

    /// Human-readable name for debugging/UI
    fn name(&self) -> &'static str;

    /// Whether this processor is currently enabled
    fn is_enabled(&self) -> bool {
        true
    }
}

/// FFT band equalizer for one stream
///
/// Owns everything the callback touches. All buffers are allocated in `new`.
pub struct BlockProcessor {
    transform: SpectralTransform,
    layout: Arc<BandLayout>,
    gains: GainReader,
    /// Analysis block for de-interleaved channels
    block: Vec<f32>,
}

impl BlockProcessor {
    /// Create a processor
    ///
    /// The layout must partition exactly the transform's block size.
    pub fn new(
        transform: SpectralTransform,
        layout: Arc<BandLayout>,
        gains: GainReader,
    ) -> Result<Self, DspError> {
        if layout.block_size() != transform.size() {
            return Err(DspError::InvalidPartition(format!(
                "layout covers {} bins but the transform size is {}",
                layout.block_size(),
                transform.size()
            )));
        }

        Ok(Self {
            block: vec![0.0; transform.size()],
            transform,
            layout,
            gains,
        })
    }

    /// Block size N
    pub fn block_size(&self) -> usize {
        self.transform.size()
    }

    pub fn layout(&self) -> &BandLayout {
        &self.layout
    }

    /// Equalize a mono buffer in place
    ///
    /// A buffer of at most N samples is zero-padded to N, processed, and
    /// truncated back to its own length. A longer buffer is processed as
    /// consecutive N-sample blocks, the last one padded the same way. One gain
    /// snapshot is taken per call.
    ///
    /// # Real-time Safety
    /// No allocations, locks or syscalls. O(len * log N).
    pub fn process_block(&mut self, samples: &mut [f32]) {
        let size = self.transform.size();
        let gains = self.gains.snapshot();

        for chunk in samples.chunks_mut(size) {
            let frame = self.transform.forward(chunk);
            self.layout.apply(frame, gains);
            self.transform.inverse(chunk);
        }
    }

    /// Equalize an interleaved buffer, each channel independently
    ///
    /// Every channel sees the same gain snapshot. A trailing partial frame
    /// (buffer length not a multiple of `channels`) is left untouched.
    ///
    /// # Real-time Safety
    /// No allocations, locks or syscalls. O(len * log N).
    pub fn process_interleaved(&mut self, buffer: &mut [f32], channels: usize) {
        if channels <= 1 {
            self.process_block(buffer);
            return;
        }

        let size = self.transform.size();
        let gains = self.gains.snapshot();

        for chunk in buffer.chunks_mut(size * channels) {
            let frames = chunk.len() / channels;
            let block = &mut self.block[..frames];

            for channel in 0..channels {
                for (slot, frame) in block.iter_mut().zip(chunk.chunks_exact(channels)) {
                    *slot = frame[channel];
                }

                let spectrum = self.transform.forward(block);
                self.layout.apply(spectrum, gains);
                self.transform.inverse(block);

                for (frame, &sample) in chunk.chunks_exact_mut(channels).zip(block.iter()) {
                    frame[channel] = sample;
                }
            }
        }
    }
}

impl AudioProcessor for BlockProcessor {
    fn process(&mut self, buffer: &mut [f32], context: &ProcessContext) {
        self.process_interleaved(buffer, context.channels);
    }

    fn reset(&mut self) {
        // Stateless between blocks: nothing carries over from one call to the next
    }

    fn name(&self) -> &'static str {
        "FFT Band Equalizer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gains::{gain_store, GainWriter};
    use std::f32::consts::PI;

    const TOLERANCE: f32 = 1e-5;

    fn processor(block_size: usize, bands: usize) -> (BlockProcessor, GainWriter) {
        let layout = Arc::new(BandLayout::linear(block_size, bands).unwrap());
        let (writer, reader) = gain_store(bands, None).unwrap();
        let transform = SpectralTransform::prepare(block_size).unwrap();
        (BlockProcessor::new(transform, layout, reader).unwrap(), writer)
    }

    /// Sinusoid that completes exactly `bin` cycles per block
    fn bin_sine(bin: usize, block_size: usize, amplitude: f32) -> Vec<f32> {
        (0..block_size)
            .map(|n| amplitude * (2.0 * PI * bin as f32 * n as f32 / block_size as f32).sin())
            .collect()
    }

    fn test_signal(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / 44100.0;
                0.5 * (2.0 * PI * 220.0 * t).sin() + 0.25 * (2.0 * PI * 5000.0 * t).sin()
            })
            .collect()
    }

    fn assert_close(actual: &[f32], expected: &[f32], tolerance: f32) {
        assert_eq!(actual.len(), expected.len());
        for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
            assert!(
                (a - e).abs() < tolerance,
                "sample {}: got {}, expected {}",
                i,
                a,
                e
            );
        }
    }

    #[test]
    fn test_impulse_passes_through_two_bands() {
        let (mut eq, _writer) = processor(8, 2);
        let mut buffer = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];

        eq.process_block(&mut buffer);

        assert!((buffer[0] - 1.0).abs() < TOLERANCE);
        for sample in &buffer[1..] {
            assert!(sample.abs() < TOLERANCE);
        }
    }

    #[test]
    fn test_identity_round_trip_at_unity() {
        let (mut eq, _writer) = processor(1024, 10);
        let input = test_signal(1024);
        let mut buffer = input.clone();

        eq.process_block(&mut buffer);
        assert_close(&buffer, &input, TOLERANCE);
    }

    #[test]
    fn test_gain_linearity() {
        let (mut eq, mut writer) = processor(1024, 4);
        let input = bin_sine(100, 1024, 0.4);

        for k in [0.0_f32, 0.5, 2.0, 3.0] {
            writer.set_all(&[k; 4]).unwrap();
            let mut buffer = input.clone();
            eq.process_block(&mut buffer);

            let expected: Vec<f32> = input.iter().map(|s| s * k).collect();
            assert_close(&buffer, &expected, 1e-4);
        }
    }

    #[test]
    fn test_band_isolation() {
        // Band 1 of 3 is [341, 682): bin 400 and its mirror 624 both sit in it,
        // bin 20 and its mirror 1004 fall in bands 0 and 2.
        let (mut eq, mut writer) = processor(1024, 3);
        let inside = bin_sine(400, 1024, 0.5);
        let outside = bin_sine(20, 1024, 0.3);
        let input: Vec<f32> = inside.iter().zip(&outside).map(|(a, b)| a + b).collect();

        writer.set(1, 0.0).unwrap();
        let mut buffer = input.clone();
        eq.process_block(&mut buffer);
        assert_close(&buffer, &outside, 1e-4);

        writer.set(1, 2.0).unwrap();
        let mut buffer = input.clone();
        eq.process_block(&mut buffer);
        let expected: Vec<f32> = inside.iter().zip(&outside).map(|(a, b)| 2.0 * a + b).collect();
        assert_close(&buffer, &expected, 1e-4);
    }

    #[test]
    fn test_short_buffer_is_padded_and_truncated() {
        let (mut eq, _writer) = processor(1024, 8);
        let input = test_signal(512);
        let mut buffer = input.clone();

        eq.process_block(&mut buffer);
        assert_eq!(buffer.len(), 512);
        assert_close(&buffer, &input, TOLERANCE);
    }

    #[test]
    fn test_long_buffer_is_processed_in_blocks() {
        let (mut eq, mut writer) = processor(256, 4);
        let input = test_signal(256 * 2 + 100);

        let mut buffer = input.clone();
        eq.process_block(&mut buffer);
        assert_close(&buffer, &input, TOLERANCE);

        // Every block, including the partial tail, gets the gain
        writer.set_all(&[0.0; 4]).unwrap();
        eq.process_block(&mut buffer);
        assert!(buffer.iter().all(|s| s.abs() < TOLERANCE));
    }

    #[test]
    fn test_empty_buffer() {
        let (mut eq, _writer) = processor(64, 2);
        let mut buffer: [f32; 0] = [];
        eq.process_block(&mut buffer);
        eq.process_interleaved(&mut buffer, 2);
    }

    #[test]
    fn test_interleaved_channels_are_independent() {
        let (mut eq, mut writer) = processor(512, 3);
        let left = bin_sine(200, 512, 0.5); // band 1 of [0,170),[170,340),[340,512)
        let right = bin_sine(10, 512, 0.5);

        let mut buffer: Vec<f32> = left
            .iter()
            .zip(&right)
            .flat_map(|(&l, &r)| [l, r])
            .collect();
        let original = buffer.clone();

        eq.process_interleaved(&mut buffer, 2);
        assert_close(&buffer, &original, TOLERANCE);

        // Bin 200 mirrors to 312, both in band 1
        writer.set(1, 0.0).unwrap();
        eq.process_interleaved(&mut buffer, 2);
        for (frame, &r) in buffer.chunks_exact(2).zip(&right) {
            assert!(frame[0].abs() < 1e-4);
            assert!((frame[1] - r).abs() < 1e-4);
        }
    }

    #[test]
    fn test_interleaved_long_and_ragged_buffers() {
        let (mut eq, _writer) = processor(64, 2);
        // 150 stereo frames plus one dangling sample
        let mut buffer: Vec<f32> = (0..301).map(|i| (i as f32 * 0.05).sin()).collect();
        let original = buffer.clone();

        eq.process_interleaved(&mut buffer, 2);
        assert_close(&buffer[..300], &original[..300], TOLERANCE);
        assert_eq!(buffer[300], original[300]);
    }

    #[test]
    fn test_layout_must_match_transform() {
        let layout = Arc::new(BandLayout::linear(512, 4).unwrap());
        let (_writer, reader) = gain_store(4, None).unwrap();
        let transform = SpectralTransform::prepare(1024).unwrap();
        assert!(matches!(
            BlockProcessor::new(transform, layout, reader),
            Err(DspError::InvalidPartition(_))
        ));
    }

    #[test]
    fn test_audio_processor_trait() {
        let (mut eq, mut writer) = processor(128, 2);
        writer.set_all(&[0.0, 0.0]).unwrap();

        let context = ProcessContext::new(48000.0, 1, 128);
        let mut buffer = vec![0.5; 128];
        eq.process(&mut buffer, &context);

        assert!(buffer.iter().all(|s| s.abs() < TOLERANCE));
        assert!(eq.is_enabled());
        assert_eq!(eq.name(), "FFT Band Equalizer");
        eq.reset();
    }

    #[test]
    fn test_output_does_not_depend_on_history() {
        let (mut eq, mut writer) = processor(256, 4);
        writer.set_all(&[2.0, 0.5, 1.0, 0.0]).unwrap();
        let context = ProcessContext::new(44100.0, 1, 256);
        let input = test_signal(256);

        let mut first = input.clone();
        eq.process(&mut first, &context);

        // Unrelated audio in between, then a reset, then the same input again
        let mut noise = test_signal(700);
        eq.process(&mut noise, &context);
        eq.reset();
        let mut after_reset = input.clone();
        eq.process(&mut after_reset, &context);
        assert_close(&after_reset, &first, TOLERANCE);

        // Without a reset the result is identical too
        let mut again = input.clone();
        eq.process(&mut again, &context);
        assert_close(&again, &first, TOLERANCE);
    }

    #[test]
    fn test_process_context() {
        let ctx = ProcessContext::new(48000.0, 2, 512);
        assert_eq!(ctx.sample_rate, 48000.0);
        assert_eq!(ctx.channels, 2);
        assert_eq!(ctx.block_size, 512);
    }
}
