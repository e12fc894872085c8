use crate::domain::config::DeviceConfig;
use crate::domain::error::MultiComResult;
use std::fmt;
use std::os::unix::io::AsRawFd;

/// Device type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Serial,
    Tcp,
}

impl DeviceType {
    /// Configuration key whose presence selects this device type
    pub fn discriminator(&self) -> &'static str {
        match self {
            DeviceType::Serial => "tty_path",
            DeviceType::Tcp => "tcp_port",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Serial => write!(f, "serial"),
            DeviceType::Tcp => write!(f, "tcp"),
        }
    }
}

/// A live, line-oriented input source that a readiness wait can watch.
///
/// The raw descriptor is only handed to the readiness wait; all reads go
/// through [`InputDevice::read_line`].
pub trait InputDevice: AsRawFd + Send {
    fn device_type(&self) -> DeviceType;

    /// Identifier from the configuration
    fn name(&self) -> &str;

    /// Human-readable description, e.g. the resolved path
    fn label(&self) -> &str;

    /// Read one framed, highlighted line as `"{name}: {line}"`.
    ///
    /// `Ok(None)` means the read timed out before any byte arrived.
    fn read_line(&mut self) -> MultiComResult<Option<String>>;

    /// Whether more input is already buffered after the last read
    fn has_pending_input(&self) -> MultiComResult<bool>;

    /// `"{name}: {label}"`, used for the startup banner
    fn display_label(&self) -> String {
        format!("{}: {}", self.name(), self.label())
    }
}

impl fmt::Debug for dyn InputDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputDevice")
            .field("type", &self.device_type())
            .field("name", &self.name())
            .field("label", &self.label())
            .finish()
    }
}

/// Outcome of trying one device type against a configuration
pub enum Probe {
    /// The config lacks this type's discriminator key
    NotThisType,
    Opened(Box<dyn InputDevice>),
}

impl fmt::Debug for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Probe::NotThisType => f.write_str("NotThisType"),
            Probe::Opened(device) => f.debug_tuple("Opened").field(device).finish(),
        }
    }
}

/// Constructor of one device type. Errors are configuration, device or
/// not-implemented failures; once a type has claimed a config its errors are final.
pub type DeviceProbe = fn(&DeviceConfig) -> MultiComResult<Probe>;

/// Format a received line for output
pub fn prefix_line(name: &str, line: &str) -> String {
    format!("{}: {}", name, line)
}
