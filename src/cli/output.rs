use std::io::{self, Write};

/// Printed between the device banner and the received lines
pub const BANNER_SEPARATOR: &str = "-----";

/// Output writer trait for console output
pub trait OutputWriter {
    fn write_message(&mut self, message: &str) -> Result<(), OutputError>;
    fn write_error(&mut self, error: &str) -> Result<(), OutputError>;

    /// One line per device label, then the separator
    fn write_banner(&mut self, labels: &[String]) -> Result<(), OutputError> {
        for label in labels {
            self.write_message(label)?;
        }
        self.write_message(BANNER_SEPARATOR)
    }
}

/// Output formatting errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl From<OutputError> for crate::domain::error::MultiComError {
    fn from(err: OutputError) -> Self {
        Self::Output(err.to_string())
    }
}

/// Console output writer: messages to `out`, diagnostics to `err`
pub struct ConsoleWriter<O = io::Stdout, E = io::Stderr> {
    out: O,
    err: E,
}

impl ConsoleWriter {
    pub fn new() -> Self {
        Self::with_streams(io::stdout(), io::stderr())
    }
}

impl Default for ConsoleWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Write, E: Write> ConsoleWriter<O, E> {
    pub fn with_streams(out: O, err: E) -> Self {
        Self { out, err }
    }

    /// Borrow both streams, e.g. to hand them to the multiplexer
    pub fn streams(&mut self) -> (&mut O, &mut E) {
        (&mut self.out, &mut self.err)
    }

    pub fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }
}

impl<O: Write, E: Write> OutputWriter for ConsoleWriter<O, E> {
    fn write_message(&mut self, message: &str) -> Result<(), OutputError> {
        writeln!(self.out, "{}", message)?;
        self.out.flush()?;
        Ok(())
    }

    fn write_error(&mut self, error: &str) -> Result<(), OutputError> {
        writeln!(self.err, "{}", error)?;
        self.err.flush()?;
        Ok(())
    }
}
