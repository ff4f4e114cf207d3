//! Audio Device Resolution
//!
//! Picks the cpal devices the engine opens: a device whose name matches the
//! configured one, or the host default.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, EngineResult};

/// Direction of an audio device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    Input,
    Output,
}

/// Resolve the input device to capture from
pub fn resolve_input(name: Option<&str>) -> EngineResult<Device> {
    resolve(DeviceType::Input, name)
}

/// Resolve the output device to play to
pub fn resolve_output(name: Option<&str>) -> EngineResult<Device> {
    resolve(DeviceType::Output, name)
}

fn resolve(device_type: DeviceType, name: Option<&str>) -> EngineResult<Device> {
    let host = cpal::default_host();

    let Some(wanted) = name else {
        let device = match device_type {
            DeviceType::Input => host.default_input_device(),
            DeviceType::Output => host.default_output_device(),
        };
        return device.ok_or(EngineError::NoDevicesFound);
    };

    let devices = match device_type {
        DeviceType::Input => host.input_devices(),
        DeviceType::Output => host.output_devices(),
    }
    .map_err(|e| EngineError::DeviceNotFound(e.to_string()))?;

    for device in devices {
        // Rust pattern: `is_ok_and` skips devices whose name can't be read
        if device.name().is_ok_and(|n| n == wanted) {
            debug!("Resolved {:?} device '{}'", device_type, wanted);
            return Ok(device);
        }
    }

    Err(EngineError::DeviceNotFound(wanted.to_string()))
}
