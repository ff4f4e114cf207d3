//! Equalizer Engine - Main Entry Point
//!
//! The EqualizerEngine owns the band layout, the gain store and the audio
//! control thread, and is the single context a control surface talks to.
//!
//! # Threads
//!
//! ```text
//! caller ──set_band_gain──▶ GainWriter ══triple buffer══▶ GainReader (audio callback)
//! caller ──Command──▶ control thread (owns the cpal streams)
//! caller ◀──Event── control thread
//! ```
//!
//! Gain changes bypass the command channel so that a bad band index or a NaN
//! is reported to the caller as an error right away. The transform plan is
//! created once here and shared with every stream the control thread builds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use rtrb::Producer;
use spektral_dsp::{gain_store, BandLayout, BlockProcessor, GainWriter, SpectralTransform, TransformPlan};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::device;
use crate::error::{EngineError, EngineResult};
use crate::message::{BandInfo, Command, Event};
use crate::stream::{AudioStream, SharedState};

/// Control loop poll interval; also the level meter rate (~60fps)
const POLL_INTERVAL: Duration = Duration::from_millis(16);

/// Peaks below this are not worth a meter update
const LEVEL_FLOOR: f32 = 0.001;

/// Events kept for the caller; newer events are dropped while it is full
const EVENT_QUEUE_CAPACITY: usize = 256;

/// Device errors kept between two polls of the control loop
const STREAM_ERROR_CAPACITY: usize = 16;

/// State the control thread needs to (re)build a stream
struct StreamFactory {
    config: EngineConfig,
    plan: TransformPlan,
    layout: Arc<BandLayout>,
    gains: Arc<Mutex<GainWriter>>,
}

impl StreamFactory {
    fn processor(&self) -> EngineResult<BlockProcessor> {
        // Fresh reader: the previous one was dropped with the previous stream
        let reader = self.gains.lock().attach_reader();
        let transform = SpectralTransform::with_plan(self.plan.clone());
        Ok(BlockProcessor::new(transform, Arc::clone(&self.layout), reader)?)
    }

    fn build(&self, error_sender: &Sender<Event>) -> EngineResult<(AudioStream, Option<Producer<f32>>)> {
        let processor = self.processor()?;
        let output = device::resolve_output(self.config.output_device.as_deref())?;

        if self.config.capture {
            let input = device::resolve_input(self.config.input_device.as_deref())?;
            let stream = AudioStream::new_with_capture(
                self.config.stream.clone(),
                &input,
                &output,
                processor,
                error_sender.clone(),
            )?;
            Ok((stream, None))
        } else {
            let (stream, producer) = AudioStream::new_output_only(
                self.config.stream.clone(),
                &output,
                processor,
                error_sender.clone(),
            )?;
            Ok((stream, Some(producer)))
        }
    }
}

/// The main equalizer controller
///
/// Lives on the caller's thread and communicates with the audio control
/// thread via channels. Dropping it stops audio and joins the thread.
pub struct EqualizerEngine {
    /// Channel for sending commands to the control thread
    command_sender: Sender<Command>,

    /// Channel for receiving events from the control thread
    event_receiver: Receiver<Event>,

    /// Sample ring producers handed back in output-only mode
    source_receiver: Receiver<Producer<f32>>,

    /// Handle to the control thread
    audio_thread: Option<JoinHandle<()>>,

    /// Flag to signal shutdown
    shutdown_flag: Arc<AtomicBool>,

    /// Whether a stream is currently open
    is_running: Arc<AtomicBool>,

    /// Writer side of the gain store
    gains: Arc<Mutex<GainWriter>>,

    layout: Arc<BandLayout>,

    config: EngineConfig,
}

impl EqualizerEngine {
    /// Create an engine with the default configuration
    pub fn new() -> EngineResult<Self> {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine with a custom configuration
    ///
    /// Validates the configuration, prepares the transform plan and the band
    /// layout, and spawns the control thread. No device is opened until
    /// [`start`](Self::start).
    pub fn with_config(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;

        let block_size = config.stream.block_size as usize;
        let layout = Arc::new(config.eq.layout(block_size)?);
        let plan = TransformPlan::prepare(block_size)?;
        let (writer, _reader) = gain_store(layout.len(), config.eq.initial_gains.as_deref())?;
        let gains = Arc::new(Mutex::new(writer));

        let (command_sender, command_receiver) = bounded::<Command>(32);
        let (event_sender, event_receiver) = bounded::<Event>(EVENT_QUEUE_CAPACITY);
        let (source_sender, source_receiver) = bounded::<Producer<f32>>(1);

        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let is_running = Arc::new(AtomicBool::new(false));

        let factory = StreamFactory {
            config: config.clone(),
            plan,
            layout: Arc::clone(&layout),
            gains: Arc::clone(&gains),
        };
        let shutdown_clone = Arc::clone(&shutdown_flag);
        let running_clone = Arc::clone(&is_running);

        let audio_thread = thread::Builder::new()
            .name("spektral-audio".into())
            .spawn(move || {
                Self::audio_thread_main(
                    command_receiver,
                    event_sender,
                    source_sender,
                    shutdown_clone,
                    running_clone,
                    factory,
                );
            })
            .map_err(|e| EngineError::ThreadSpawnError(e.to_string()))?;

        info!(
            "Engine ready: {} bands over {} bins at {} Hz",
            layout.len(),
            block_size,
            config.stream.sample_rate
        );

        Ok(Self {
            command_sender,
            event_receiver,
            source_receiver,
            audio_thread: Some(audio_thread),
            shutdown_flag,
            is_running,
            gains,
            layout,
            config,
        })
    }

    /// Open the devices and start processing
    pub fn start(&self) -> EngineResult<()> {
        self.send_command(Command::Start)
    }

    /// Stop processing and close the devices
    pub fn stop(&self) -> EngineResult<()> {
        self.send_command(Command::Stop)
    }

    /// Set one band's gain, returning the clamped value that was stored
    ///
    /// Takes effect from the next block the audio thread processes.
    pub fn set_band_gain(&self, band: usize, gain: f32) -> EngineResult<f32> {
        let stored = self.gains.lock().set(band, gain)?;
        debug!("Set band {} gain to {:.3}", band, stored);
        Ok(stored)
    }

    /// Replace all gains at once
    pub fn set_gains(&self, gains: &[f32]) -> EngineResult<()> {
        self.gains.lock().set_all(gains)?;
        Ok(())
    }

    /// Back to a flat response
    pub fn reset_gains(&self) {
        self.gains.lock().reset();
    }

    /// Current gains, one per band
    pub fn gains(&self) -> Vec<f32> {
        self.gains.lock().gains().to_vec()
    }

    /// Band descriptions for rendering controls
    pub fn bands(&self) -> Vec<BandInfo> {
        let sample_rate = self.config.stream.sample_rate as f32;
        let block_size = self.layout.block_size();
        self.layout
            .bands()
            .iter()
            .enumerate()
            .map(|(index, band)| BandInfo::new(index, band, sample_rate, block_size))
            .collect()
    }

    pub fn layout(&self) -> &BandLayout {
        &self.layout
    }

    /// Pass audio through untouched while keeping gains intact
    pub fn set_bypass(&self, bypassed: bool) -> EngineResult<()> {
        self.send_command(Command::SetBypass(bypassed))
    }

    /// Request a state update (answered with [`Event::StateUpdate`])
    pub fn request_state(&self) -> EngineResult<()> {
        self.send_command(Command::RequestState)
    }

    /// Check if a stream is currently open
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Get next event (non-blocking)
    pub fn poll_event(&self) -> Option<Event> {
        self.event_receiver.try_recv().ok()
    }

    /// Get next event (blocking)
    pub fn wait_event(&self) -> Option<Event> {
        self.event_receiver.recv().ok()
    }

    /// Get next event, giving up after `timeout`
    pub fn wait_event_timeout(&self, timeout: Duration) -> Option<Event> {
        self.event_receiver.recv_timeout(timeout).ok()
    }

    /// Take the sample ring producer of the running output-only stream
    ///
    /// Only set when `capture` is off. Push interleaved f32 samples into it;
    /// whatever is not pushed in time plays as silence.
    pub fn sample_source(&self) -> Option<Producer<f32>> {
        self.source_receiver.try_recv().ok()
    }

    /// Get current configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn send_command(&self, command: Command) -> EngineResult<()> {
        self.command_sender
            .send(command)
            .map_err(|_| EngineError::ChannelSendError)
    }

    /// Control thread main loop
    fn audio_thread_main(
        command_receiver: Receiver<Command>,
        event_sender: Sender<Event>,
        source_sender: Sender<Producer<f32>>,
        shutdown_flag: Arc<AtomicBool>,
        is_running: Arc<AtomicBool>,
        factory: StreamFactory,
    ) {
        info!("Audio thread started");

        // Rust pattern: the cpal stream is not Send, so it lives and dies here
        let mut stream: Option<AudioStream> = None;
        let mut bypassed = false;

        // Device error callbacks report here; forwarded on every poll
        let (error_sender, error_receiver) = bounded::<Event>(STREAM_ERROR_CAPACITY);

        while !shutdown_flag.load(Ordering::SeqCst) {
            match command_receiver.recv_timeout(POLL_INTERVAL) {
                Ok(Command::Start) => {
                    if stream.is_some() {
                        warn!("Engine already running");
                        let _ = event_sender.try_send(Event::error("Already running"));
                        continue;
                    }

                    info!("Starting audio stream");
                    match factory.build(&error_sender) {
                        Ok((s, producer)) => {
                            s.set_bypass(bypassed);
                            if let Some(producer) = producer {
                                // Drop a producer nobody collected from a previous run
                                let _ = source_sender.try_send(producer);
                            }
                            stream = Some(s);
                            is_running.store(true, Ordering::SeqCst);
                            let _ = event_sender.try_send(Event::Started);
                            info!(
                                "Audio stream started ({})",
                                if factory.config.capture { "capture" } else { "output-only" }
                            );
                        }
                        Err(e) => {
                            error!("Failed to start stream: {}", e);
                            let _ = event_sender.try_send(Event::error(e));
                        }
                    }
                }

                Ok(Command::Stop) => {
                    if stream.is_none() {
                        debug!("Engine not running");
                        continue;
                    }

                    info!("Stopping audio stream");
                    stream = None;
                    is_running.store(false, Ordering::SeqCst);
                    let _ = event_sender.try_send(Event::Stopped);
                }

                Ok(Command::SetBypass(bypass)) => {
                    debug!("Set bypass: {}", bypass);
                    bypassed = bypass;
                    if let Some(ref s) = stream {
                        s.set_bypass(bypassed);
                    }
                }

                Ok(Command::RequestState) => {
                    let state = Event::StateUpdate {
                        is_running: stream.is_some(),
                        is_bypassed: bypassed,
                        gains: factory.gains.lock().gains().to_vec(),
                    };
                    let _ = event_sender.try_send(state);
                }

                Ok(Command::Shutdown) => {
                    info!("Shutdown command received");
                    shutdown_flag.store(true, Ordering::SeqCst);
                }

                Err(RecvTimeoutError::Timeout) => {
                    for event in error_receiver.try_iter() {
                        if let Event::Error { ref message } = event {
                            error!("Stream error: {}", message);
                        }
                        let _ = event_sender.try_send(event);
                    }

                    if let Some(ref s) = stream {
                        Self::report_stream_health(&s.shared, &event_sender);

                        let peak = s.peak();
                        if peak > LEVEL_FLOOR {
                            let _ = event_sender.try_send(Event::LevelUpdate { peak });
                        }
                    }
                }

                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Command channel closed");
                    break;
                }
            }
        }

        drop(stream);
        is_running.store(false, Ordering::SeqCst);
        info!("Audio thread stopped");
    }
}

impl EqualizerEngine {
    /// Turn the callbacks' underrun/overrun counters into events
    fn report_stream_health(shared: &SharedState, event_sender: &Sender<Event>) {
        let underruns = shared.take_underruns();
        if underruns > 0 {
            debug!("{} buffer underruns", underruns);
            let _ = event_sender.try_send(Event::BufferUnderrun);
        }

        let overruns = shared.take_overruns();
        if overruns > 0 {
            debug!("{} buffer overruns", overruns);
            let _ = event_sender.try_send(Event::BufferOverrun);
        }
    }
}

impl Drop for EqualizerEngine {
    fn drop(&mut self) {
        // Signal shutdown
        self.shutdown_flag.store(true, Ordering::SeqCst);
        let _ = self.command_sender.send(Command::Shutdown);

        // Wait for the control thread to close its streams
        if let Some(handle) = self.audio_thread.take() {
            let _ = handle.join();
        }
    }
}
