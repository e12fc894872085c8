use crate::core::device::{prefix_line, DeviceType, InputDevice, Probe};
use crate::core::framing::{decode_escapes, LineFramer, TimedRead};
use crate::core::highlight::Highlighter;
use crate::domain::config::{DeviceConfig, Parity};
use crate::domain::error::{MultiComError, MultiComResult};
use serialport::{SerialPort, TTYPort};
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Validated settings of a serial device entry
#[derive(Debug, Clone, PartialEq)]
pub struct SerialSettings {
    pub tty_path: Vec<String>,
    pub baud: u32,
    pub parity: Parity,
    pub endline: Vec<u8>,
    pub timeout: Duration,
}

impl SerialSettings {
    /// Read settings from a config that carries `tty_path`
    pub fn from_config(config: &DeviceConfig) -> MultiComResult<Self> {
        let name = config.name();

        // Presence first, so the first missing key is the one reported
        for key in ["baud", "parity", "endline", "timeout_s"] {
            config.require(key)?;
        }

        let baud = config.require_u32("baud")?;
        let parity = config
            .require_str("parity")?
            .parse::<Parity>()
            .map_err(|message| MultiComError::config(name, message))?;

        let endline = decode_escapes(config.require_str("endline")?)
            .map_err(|e| MultiComError::config(name, format!("Invalid endline: {}", e)))?;
        if endline.is_empty() {
            return Err(MultiComError::config(name, "Invalid endline: must not be empty"));
        }

        let timeout_s = config.require_f64("timeout_s")?;
        // Zero means non-blocking: only already buffered bytes are framed
        let timeout = Duration::try_from_secs_f64(timeout_s).map_err(|_| {
            MultiComError::config(
                name,
                format!("Invalid value for timeout_s: {}, expected a non-negative number of seconds", timeout_s),
            )
        })?;

        let tty_path = config.require_str_list(DeviceType::Serial.discriminator())?;

        Ok(Self {
            tty_path,
            baud,
            parity,
            endline,
            timeout,
        })
    }
}

/// Expand the ordered path patterns and pick the first unambiguous match.
///
/// Patterns matching nothing are skipped. A pattern matching more than one
/// path fails outright rather than guessing between siblings.
pub fn resolve_path(name: &str, patterns: &[String]) -> MultiComResult<PathBuf> {
    for pattern in patterns {
        let mut paths = expand(name, pattern)?;
        debug!("Device '{}': '{}' matched {:?}", name, pattern, paths);

        match paths.len() {
            0 => continue,
            1 => return Ok(paths.remove(0)),
            _ => {
                let matches: Vec<_> = paths.iter().map(|p| p.display().to_string()).collect();
                return Err(MultiComError::config(
                    name,
                    format!(
                        "Ambiguous path {} matches multiple devices: {}",
                        pattern,
                        matches.join(" ")
                    ),
                ));
            }
        }
    }

    Err(MultiComError::device(
        name,
        format!("No device found for: {}", patterns.join(" ")),
    ))
}

fn expand(name: &str, pattern: &str) -> MultiComResult<Vec<PathBuf>> {
    let entries = glob::glob(pattern).map_err(|e| {
        MultiComError::config(name, format!("Invalid path pattern '{}': {}", pattern, e))
    })?;

    Ok(entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                debug!("Device '{}': skipping unreadable glob entry: {}", name, e);
                None
            }
        })
        .collect())
}

fn to_serialport_parity(parity: Parity) -> serialport::Parity {
    match parity {
        Parity::None => serialport::Parity::None,
        Parity::Even => serialport::Parity::Even,
        Parity::Odd => serialport::Parity::Odd,
    }
}

impl TimedRead for TTYPort {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_timeout(timeout).map_err(io::Error::from)
    }
}

/// Serial TTY input device
pub struct SerialDevice {
    name: String,
    label: String,
    port: TTYPort,
    framer: LineFramer,
    highlighter: Highlighter,
}

impl SerialDevice {
    /// Wrap an already-open port
    pub fn new(
        name: &str,
        path: &Path,
        port: TTYPort,
        framer: LineFramer,
        highlighter: Highlighter,
    ) -> Self {
        Self {
            name: name.to_string(),
            label: format!("Serial TTY, {}", path.display()),
            port,
            framer,
            highlighter,
        }
    }

    /// Try to build a serial device from `config`
    pub fn probe(config: &DeviceConfig) -> MultiComResult<Probe> {
        if !config.has(DeviceType::Serial.discriminator()) {
            return Ok(Probe::NotThisType);
        }

        let name = config.name();
        let settings = SerialSettings::from_config(config)?;
        let highlighter = Highlighter::from_pairs(config.optional_str_map("highlight")?)
            .map_err(|message| MultiComError::config(name, message))?;

        let path = resolve_path(name, &settings.tty_path)?;
        let port = Self::open(name, &path, &settings)?;
        info!(
            "Opened '{}' on {} ({} baud, parity {})",
            name,
            path.display(),
            settings.baud,
            settings.parity
        );

        let framer = LineFramer::new(settings.endline, settings.timeout);
        Ok(Probe::Opened(Box::new(Self::new(
            name,
            &path,
            port,
            framer,
            highlighter,
        ))))
    }

    fn open(name: &str, path: &Path, settings: &SerialSettings) -> MultiComResult<TTYPort> {
        debug!("Device '{}': opening {}", name, path.display());
        serialport::new(path.to_string_lossy(), settings.baud)
            .parity(to_serialport_parity(settings.parity))
            .timeout(settings.timeout)
            .open_native()
            .map_err(|e| MultiComError::device(name, format!("{}: {}", path.display(), e)))
    }
}

impl AsRawFd for SerialDevice {
    fn as_raw_fd(&self) -> RawFd {
        self.port.as_raw_fd()
    }
}

impl InputDevice for SerialDevice {
    fn device_type(&self) -> DeviceType {
        DeviceType::Serial
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn read_line(&mut self) -> MultiComResult<Option<String>> {
        let frame = self
            .framer
            .read_line(&mut self.port)
            .map_err(|source| MultiComError::Read {
                device: self.name.clone(),
                source,
            })?;

        if frame.is_empty() && !frame.terminated {
            return Ok(None);
        }

        let line = self.highlighter.apply(&frame.text());
        Ok(Some(prefix_line(&self.name, &line)))
    }

    fn has_pending_input(&self) -> MultiComResult<bool> {
        self.port
            .bytes_to_read()
            .map(|count| count > 0)
            .map_err(|e| MultiComError::Read {
                device: self.name.clone(),
                source: e.into(),
            })
    }
}
