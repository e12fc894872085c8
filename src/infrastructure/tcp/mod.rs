// TCP module - reserved socket device type
use crate::core::device::{DeviceType, Probe};
use crate::domain::config::DeviceConfig;
use crate::domain::error::{MultiComError, MultiComResult};
use tracing::debug;

/// TCP socket input. Claims configs carrying `tcp_port` and always refuses them.
pub struct SocketDevice;

impl SocketDevice {
    pub fn probe(config: &DeviceConfig) -> MultiComResult<Probe> {
        if !config.has(DeviceType::Tcp.discriminator()) {
            return Ok(Probe::NotThisType);
        }
        debug!("Device '{}' requests a TCP socket", config.name());
        Err(MultiComError::NotImplemented {
            device: config.name().to_string(),
            feature: "TCP sockets",
        })
    }
}
