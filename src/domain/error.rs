use std::path::PathBuf;
use thiserror::Error;

/// MultiCom unified error type
#[derive(Error, Debug)]
pub enum MultiComError {
    #[error("Failed parsing config for '{device}': {message}")]
    Config { device: String, message: String },

    #[error("Failed opening device '{device}': {message}")]
    Device { device: String, message: String },

    #[error("Failed initializing '{device}': {feature} not implemented yet")]
    NotImplemented { device: String, feature: &'static str },

    #[error("Failed initializing '{device}': no device type matches its configuration")]
    Unclaimed { device: String },

    #[error("Failed opening {}: {}", .path.display(), .message)]
    ConfigFile { path: PathBuf, message: String },

    #[error("Failed reading from '{device}': {source}")]
    Read {
        device: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output error: {0}")]
    Output(String),
}

/// Coarse classification of a [`MultiComError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A device type claimed the config but its settings are missing or invalid
    Configuration,
    /// Settings are valid but the device could not be opened or read
    Device,
    /// The device type is recognized but unsupported
    NotImplemented,
    /// No device type claimed the config
    Unclaimed,
    /// A configuration file could not be read or parsed
    File,
    /// Local I/O, including console output
    Io,
}

impl MultiComError {
    pub fn config(device: &str, message: impl Into<String>) -> Self {
        Self::Config {
            device: device.to_string(),
            message: message.into(),
        }
    }

    pub fn device(device: &str, message: impl Into<String>) -> Self {
        Self::Device {
            device: device.to_string(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } => ErrorKind::Configuration,
            Self::Device { .. } | Self::Read { .. } => ErrorKind::Device,
            Self::NotImplemented { .. } => ErrorKind::NotImplemented,
            Self::Unclaimed { .. } => ErrorKind::Unclaimed,
            Self::ConfigFile { .. } => ErrorKind::File,
            Self::Io(_) | Self::Output(_) => ErrorKind::Io,
        }
    }

    /// Name of the device this error belongs to, if any
    pub fn device_name(&self) -> Option<&str> {
        match self {
            Self::Config { device, .. }
            | Self::Device { device, .. }
            | Self::NotImplemented { device, .. }
            | Self::Unclaimed { device }
            | Self::Read { device, .. } => Some(device),
            _ => None,
        }
    }
}

pub type MultiComResult<T> = Result<T, MultiComError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = MultiComError::config("devA", "Missing config key: baud");
        assert_eq!(
            error.to_string(),
            "Failed parsing config for 'devA': Missing config key: baud"
        );
        assert_eq!(error.kind(), ErrorKind::Configuration);
        assert_eq!(error.device_name(), Some("devA"));
    }

    #[test]
    fn test_file_error_display() {
        let error = MultiComError::ConfigFile {
            path: PathBuf::from("missing.yaml"),
            message: "No such file or directory".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed opening missing.yaml: No such file or directory"
        );
        assert_eq!(error.device_name(), None);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let error: MultiComError = io_error.into();
        assert_eq!(error.kind(), ErrorKind::Io);
    }
}
