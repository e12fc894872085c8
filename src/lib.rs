//! MultiCom Library
//! 
//! Serial console multiplexer: resolves configured devices to open TTYs,
//! waits on all of them at once and interleaves their lines, each prefixed
//! with the device name. Unix only.

pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;

pub use domain::error::{ErrorKind, MultiComError, MultiComResult};
pub use domain::config::{DeviceConfig, MultiComConfig, Parity};
pub use crate::core::{DeviceResolver, InputDevice, Multiplexer};
pub use infrastructure::serial::SerialDevice;
