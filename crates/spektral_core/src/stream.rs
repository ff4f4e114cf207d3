//! Audio Stream Management
//!
//! Handles the low-level CPAL stream setup and the real-time audio callbacks.
//!
//! # Audio Flow
//!
//! ```text
//! Capture device ──rtrb──▶ output callback ──▶ BlockProcessor ──▶ output device
//!        or
//! External source (decoder) ──rtrb──▶ output callback ──▶ ...
//! ```
//!
//! Both callbacks are real-time: no allocation, no locks, no logging. Ring
//! underruns and overruns are counted in `SharedState`; the control thread
//! drains the counters and turns them into events. Device errors go to a
//! bounded channel and are dropped when it is full.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig as CpalStreamConfig};
use crossbeam_channel::Sender;
use rtrb::{Consumer, Producer, RingBuffer};
use spektral_dsp::{AudioProcessor, BlockProcessor, ProcessContext};

use crate::config::StreamConfig;
use crate::error::{EngineError, EngineResult};
use crate::message::Event;

/// Ring buffer capacity in analysis blocks
const RING_BUFFER_BLOCKS: usize = 4;

/// Shared state between audio callback and control thread
pub struct SharedState {
    /// Whether processing is bypassed
    pub bypassed: AtomicBool,

    /// Output peak of the last callback, as f32 bits
    peak_bits: AtomicU32,

    /// Output callbacks that ran out of samples since the last drain
    underruns: AtomicUsize,

    /// Capture callbacks that found the ring full since the last drain
    overruns: AtomicUsize,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            bypassed: AtomicBool::new(false),
            peak_bits: AtomicU32::new(0.0_f32.to_bits()),
            underruns: AtomicUsize::new(0),
            overruns: AtomicUsize::new(0),
        }
    }

    pub fn set_peak(&self, peak: f32) {
        // Meter value only, nothing else is published with it
        self.peak_bits.store(peak.to_bits(), Ordering::Relaxed);
    }

    pub fn peak(&self) -> f32 {
        f32::from_bits(self.peak_bits.load(Ordering::Relaxed))
    }

    pub fn record_underrun(&self) {
        self.underruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_overrun(&self) {
        self.overruns.fetch_add(1, Ordering::Relaxed);
    }

    /// Underruns since the last call, resetting the counter
    pub fn take_underruns(&self) -> usize {
        self.underruns.swap(0, Ordering::Relaxed)
    }

    /// Overruns since the last call, resetting the counter
    pub fn take_overruns(&self) -> usize {
        self.overruns.swap(0, Ordering::Relaxed)
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

/// Manages an active audio stream
///
/// Dropping it stops and closes both devices.
pub struct AudioStream {
    /// Held only to keep the devices running
    #[allow(dead_code)]
    capture_stream: Option<Stream>,

    #[allow(dead_code)]
    output_stream: Option<Stream>,

    /// Shared state for atomic updates from control thread
    pub shared: Arc<SharedState>,

    /// Current stream configuration
    pub config: StreamConfig,
}

impl AudioStream {
    /// Capture from `capture_device`, equalize, play on `output_device`
    pub fn new_with_capture(
        config: StreamConfig,
        capture_device: &Device,
        output_device: &Device,
        processor: BlockProcessor,
        error_sender: Sender<Event>,
    ) -> EngineResult<Self> {
        config.validate().map_err(EngineError::ConfigError)?;

        let shared = Arc::new(SharedState::new());
        let (producer, consumer) = RingBuffer::<f32>::new(ring_capacity(&config));
        let cpal_config = cpal_config(&config);

        let capture_stream = Self::build_capture_stream(
            capture_device,
            &cpal_config,
            producer,
            Arc::clone(&shared),
            error_sender.clone(),
        )?;

        // If this fails, `capture_stream` is dropped on the way out and the
        // input device is closed again
        let output_stream = Self::build_output_stream(
            output_device,
            &cpal_config,
            consumer,
            processor,
            Arc::clone(&shared),
            context(&config),
            error_sender,
        )?;

        // Start both streams
        capture_stream
            .play()
            .map_err(|e| EngineError::StreamPlayError(e.to_string()))?;
        output_stream
            .play()
            .map_err(|e| EngineError::StreamPlayError(e.to_string()))?;

        Ok(Self {
            capture_stream: Some(capture_stream),
            output_stream: Some(output_stream),
            shared,
            config,
        })
    }

    /// Create an output-only stream fed by the caller
    ///
    /// Returns the producer half of the sample ring: whoever decodes or
    /// generates audio pushes interleaved f32 samples into it.
    pub fn new_output_only(
        config: StreamConfig,
        output_device: &Device,
        processor: BlockProcessor,
        error_sender: Sender<Event>,
    ) -> EngineResult<(Self, Producer<f32>)> {
        config.validate().map_err(EngineError::ConfigError)?;

        let shared = Arc::new(SharedState::new());
        let (producer, consumer) = RingBuffer::<f32>::new(ring_capacity(&config));

        let output_stream = Self::build_output_stream(
            output_device,
            &cpal_config(&config),
            consumer,
            processor,
            Arc::clone(&shared),
            context(&config),
            error_sender,
        )?;

        output_stream
            .play()
            .map_err(|e| EngineError::StreamPlayError(e.to_string()))?;

        let stream = Self {
            capture_stream: None,
            output_stream: Some(output_stream),
            shared,
            config,
        };
        Ok((stream, producer))
    }

    fn build_capture_stream(
        device: &Device,
        config: &CpalStreamConfig,
        mut producer: Producer<f32>,
        shared: Arc<SharedState>,
        error_sender: Sender<Event>,
    ) -> EngineResult<Stream> {
        let stream = device
            .build_input_stream(
                config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    capture_callback(&mut producer, &shared, data);
                },
                move |err| {
                    let _ = error_sender.try_send(Event::error(err));
                },
                None, // No timeout
            )
            .map_err(|e| EngineError::StreamBuildError(e.to_string()))?;

        Ok(stream)
    }

    fn build_output_stream(
        device: &Device,
        config: &CpalStreamConfig,
        mut consumer: Consumer<f32>,
        mut processor: BlockProcessor,
        shared: Arc<SharedState>,
        context: ProcessContext,
        error_sender: Sender<Event>,
    ) -> EngineResult<Stream> {
        // The closure owns the processor, so the audio thread is its only user
        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    output_callback(&mut consumer, &mut processor, &shared, &context, data);
                },
                move |err| {
                    let _ = error_sender.try_send(Event::error(err));
                },
                None,
            )
            .map_err(|e| EngineError::StreamBuildError(e.to_string()))?;

        Ok(stream)
    }

    /// Get current output peak (for UI meters)
    pub fn peak(&self) -> f32 {
        self.shared.peak()
    }

    /// Set bypass state
    pub fn set_bypass(&self, bypassed: bool) {
        self.shared.bypassed.store(bypassed, Ordering::Relaxed);
    }

    pub fn is_bypassed(&self) -> bool {
        self.shared.bypassed.load(Ordering::Relaxed)
    }
}

fn cpal_config(config: &StreamConfig) -> CpalStreamConfig {
    CpalStreamConfig {
        channels: config.channels,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Fixed(config.block_size),
    }
}

fn context(config: &StreamConfig) -> ProcessContext {
    ProcessContext::new(
        config.sample_rate as f32,
        config.channels as usize,
        config.block_size as usize,
    )
}

fn ring_capacity(config: &StreamConfig) -> usize {
    config.block_size as usize * config.channels as usize * RING_BUFFER_BLOCKS
}

/// Capture callback body
///
/// # Real-time Safety
/// No allocations, locks or syscalls.
fn capture_callback(producer: &mut Producer<f32>, shared: &SharedState, data: &[f32]) {
    if push_samples(producer, data) < data.len() {
        // Ring full - the output side is not keeping up
        shared.record_overrun();
    }
}

/// Output callback body
///
/// # Real-time Safety
/// No allocations, locks or syscalls.
fn output_callback<P: AudioProcessor>(
    consumer: &mut Consumer<f32>,
    processor: &mut P,
    shared: &SharedState,
    context: &ProcessContext,
    data: &mut [f32],
) {
    if pull_samples(consumer, data) < data.len() {
        shared.record_underrun();
    }

    if !shared.bypassed.load(Ordering::Relaxed) {
        processor.process(data, context);
    }

    shared.set_peak(peak_level(data));
}

/// Push as many samples as fit, returning how many were written
fn push_samples(producer: &mut Producer<f32>, data: &[f32]) -> usize {
    let len = producer.slots().min(data.len());
    match producer.write_chunk_uninit(len) {
        Ok(chunk) => chunk.fill_from_iter(data.iter().copied()),
        Err(_) => 0,
    }
}

/// Fill `data` from the ring, padding with silence on underrun
///
/// Returns how many samples came from the ring.
fn pull_samples(consumer: &mut Consumer<f32>, data: &mut [f32]) -> usize {
    let to_read = data.len().min(consumer.slots());

    if to_read < data.len() {
        data[to_read..].fill(0.0);
    }

    if let Ok(chunk) = consumer.read_chunk(to_read) {
        let (first, second) = chunk.as_slices();
        data[..first.len()].copy_from_slice(first);
        data[first.len()..first.len() + second.len()].copy_from_slice(second);
        chunk.commit_all();
    }

    to_read
}

fn peak_level(data: &[f32]) -> f32 {
    data.iter().fold(0.0_f32, |peak, s| peak.max(s.abs()))
}
