//! Engine, Stream and Equalizer Configuration
//!
//! Everything here is fixed at startup. Block size and band layout cannot
//! change while the engine is alive.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use spektral_dsp::{BandLayout, DspError};

use crate::error::{EngineError, EngineResult};

/// Audio stream configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Sample rate in Hz (e.g., 44100, 48000, 96000)
    pub sample_rate: u32,

    /// Number of audio channels (1 = mono, each channel equalized independently)
    pub channels: u16,

    /// Analysis block size N in frames, also requested as the hardware buffer size
    pub block_size: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 1,
            block_size: 1024,
        }
    }
}

impl StreamConfig {
    /// Calculate latency in milliseconds for this configuration
    pub fn latency_ms(&self) -> f32 {
        (self.block_size as f32 / self.sample_rate as f32) * 1000.0
    }

    /// Calculate bytes per frame (32-bit float samples)
    pub fn bytes_per_frame(&self) -> usize {
        4 * self.channels as usize
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate < 8000 || self.sample_rate > 192000 {
            return Err(format!("Invalid sample rate: {}", self.sample_rate));
        }
        if self.channels == 0 || self.channels > 8 {
            return Err(format!("Invalid channel count: {}", self.channels));
        }
        if self.block_size < 32 || self.block_size > 8192 || !self.block_size.is_power_of_two() {
            return Err(format!(
                "Invalid block size: {} (must be a power of two between 32 and 8192)",
                self.block_size
            ));
        }
        Ok(())
    }
}

/// Band layout and starting gains
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqConfig {
    /// Number of bands B
    pub bands: usize,

    /// Per-band gains at startup (default: all 1.0, flat)
    #[serde(default)]
    pub initial_gains: Option<Vec<f32>>,

    /// Explicit bin edges `[0, e1, ..., N]` (B + 1 entries); equal-width bands if absent
    #[serde(default)]
    pub band_edges: Option<Vec<usize>>,
}

impl Default for EqConfig {
    fn default() -> Self {
        Self {
            bands: 10,
            initial_gains: None,
            band_edges: None,
        }
    }
}

impl EqConfig {
    /// Build and validate the band layout for `block_size` bins
    pub fn layout(&self, block_size: usize) -> Result<BandLayout, DspError> {
        match &self.band_edges {
            Some(edges) => {
                if edges.len() != self.bands + 1 {
                    return Err(DspError::InvalidPartition(format!(
                        "{} bands need {} edges, got {}",
                        self.bands,
                        self.bands + 1,
                        edges.len()
                    )));
                }
                BandLayout::from_edges(block_size, edges)
            }
            None => BandLayout::linear(block_size, self.bands),
        }
    }
}

/// Overall engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Stream configuration
    pub stream: StreamConfig,

    /// Equalizer bands
    #[serde(default)]
    pub eq: EqConfig,

    /// Capture from an input device; when false, samples are fed by the caller
    #[serde(default = "default_capture")]
    pub capture: bool,

    /// Input device name (system default if absent)
    #[serde(default)]
    pub input_device: Option<String>,

    /// Output device name (system default if absent)
    #[serde(default)]
    pub output_device: Option<String>,
}

fn default_capture() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            eq: EqConfig::default(),
            capture: true,
            input_device: None,
            output_device: None,
        }
    }
}

impl EngineConfig {
    /// Create config optimized for low latency
    pub fn low_latency() -> Self {
        Self {
            stream: StreamConfig {
                sample_rate: 48000,
                channels: 1,
                block_size: 256, // ~5.3ms latency, 187.5Hz bins
            },
            ..Default::default()
        }
    }

    /// Create config optimized for frequency resolution and stability
    pub fn stable() -> Self {
        Self {
            stream: StreamConfig {
                sample_rate: 48000,
                channels: 1,
                block_size: 2048, // ~42.7ms latency, 23.4Hz bins
            },
            ..Default::default()
        }
    }

    /// Parse a JSON configuration
    pub fn from_json(json: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Validate everything that can be checked before touching a device
    pub fn validate(&self) -> EngineResult<()> {
        self.stream.validate().map_err(EngineError::ConfigError)?;
        self.eq.layout(self.stream.block_size as usize)?;
        if let Some(gains) = &self.eq.initial_gains {
            if gains.len() != self.eq.bands {
                return Err(DspError::GainCountMismatch {
                    expected: self.eq.bands,
                    got: gains.len(),
                }
                .into());
            }
        }
        Ok(())
    }
}
