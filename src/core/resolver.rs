//! Turns named device configurations into live devices.
//!
//! Device types are tried in a fixed order. A type that does not find its
//! discriminator key passes; the first type that does claims the config, and
//! whatever it returns, device or error, is final for that device.

use crate::core::device::{DeviceProbe, DeviceType, InputDevice, Probe};
use crate::domain::config::{DeviceConfig, MultiComConfig};
use crate::domain::error::{MultiComError, MultiComResult};
use crate::infrastructure::serial::SerialDevice;
use crate::infrastructure::tcp::SocketDevice;
use tracing::debug;

/// Devices that opened, and the reasons the others were dropped
#[derive(Debug, Default)]
pub struct ResolveReport {
    pub devices: Vec<Box<dyn InputDevice>>,
    pub failures: Vec<MultiComError>,
}

pub struct DeviceResolver {
    probes: Vec<(DeviceType, DeviceProbe)>,
}

impl DeviceResolver {
    /// Resolver over the built-in device types: serial first, then TCP
    pub fn new() -> Self {
        Self::with_probes(vec![
            (DeviceType::Serial, SerialDevice::probe as DeviceProbe),
            (DeviceType::Tcp, SocketDevice::probe as DeviceProbe),
        ])
    }

    pub fn with_probes(probes: Vec<(DeviceType, DeviceProbe)>) -> Self {
        Self { probes }
    }

    pub fn resolve(&self, config: &DeviceConfig) -> MultiComResult<Box<dyn InputDevice>> {
        config.check_shape()?;

        for (device_type, probe) in &self.probes {
            match probe(config)? {
                Probe::NotThisType => {
                    debug!("Device '{}' is not a {} device", config.name(), device_type);
                }
                Probe::Opened(device) => return Ok(device),
            }
        }

        Err(MultiComError::Unclaimed {
            device: config.name().to_string(),
        })
    }

    /// Resolve every device in the config. Failures never stop the remaining devices.
    pub fn resolve_all(&self, config: &MultiComConfig) -> ResolveReport {
        let mut report = ResolveReport::default();

        for device_config in config.devices() {
            match self.resolve(&device_config) {
                Ok(device) => report.devices.push(device),
                Err(e) => {
                    debug!("Dropping device '{}': {}", device_config.name(), e);
                    report.failures.push(e);
                }
            }
        }

        report
    }
}

impl Default for DeviceResolver {
    fn default() -> Self {
        Self::new()
    }
}
