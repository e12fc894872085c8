// Serial module - Serial TTY input devices
pub mod device;

pub use device::{resolve_path, SerialDevice, SerialSettings};
