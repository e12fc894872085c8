// Core module - framing, highlighting, device resolution and multiplexing
pub mod device;
pub mod framing;
pub mod highlight;
pub mod multiplex;
pub mod resolver;

pub use device::{DeviceType, InputDevice, Probe};
pub use framing::{decode_escapes, LineFramer};
pub use highlight::Highlighter;
pub use multiplex::Multiplexer;
pub use resolver::{DeviceResolver, ResolveReport};
