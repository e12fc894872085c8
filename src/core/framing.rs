//! Line framing over a byte stream.
//!
//! A [`LineFramer`] pulls bytes one at a time from a [`TimedRead`] source
//! until its terminator shows up or the read deadline passes. Reading single
//! bytes keeps everything past the terminator inside the OS buffer, so the
//! descriptor's readiness keeps telling the truth about pending input.

use std::io::{self, Read};
use std::time::{Duration, Instant};
use tracing::trace;

/// A byte source whose blocking reads can be bounded
pub trait TimedRead: Read {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

impl TimedRead for &[u8] {
    fn set_read_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
        Ok(())
    }
}

/// One framed line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Bytes read, terminator stripped
    pub bytes: Vec<u8>,
    /// False when the deadline passed before the terminator arrived
    pub terminated: bool,
}

impl Frame {
    /// Decode as UTF-8, substituting U+FFFD for malformed sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct LineFramer {
    terminator: Vec<u8>,
    timeout: Duration,
}

impl LineFramer {
    /// `terminator` must not be empty.
    pub fn new(terminator: Vec<u8>, timeout: Duration) -> Self {
        debug_assert!(!terminator.is_empty());
        Self { terminator, timeout }
    }

    /// Read a single line.
    ///
    /// A zero timeout never waits: the line ends at the first read that finds
    /// nothing buffered. Returns an `UnexpectedEof` error only when the source
    /// is exhausted before yielding a single byte.
    pub fn read_line<R: TimedRead + ?Sized>(&self, source: &mut R) -> io::Result<Frame> {
        let deadline = Instant::now() + self.timeout;
        let mut bytes = Vec::new();
        let mut byte = [0u8; 1];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() && !self.timeout.is_zero() {
                break;
            }
            source.set_read_timeout(remaining)?;

            match source.read(&mut byte) {
                Ok(0) if bytes.is_empty() => {
                    return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "end of stream"));
                }
                Ok(0) => break,
                Ok(_) => {
                    bytes.push(byte[0]);
                    if bytes.ends_with(&self.terminator) {
                        bytes.truncate(bytes.len() - self.terminator.len());
                        return Ok(Frame {
                            bytes,
                            terminated: true,
                        });
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e)
                    if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) =>
                {
                    break
                }
                Err(e) => return Err(e),
            }
        }

        trace!("Read deadline passed with {} unterminated bytes", bytes.len());
        Ok(Frame {
            bytes,
            terminated: false,
        })
    }
}

/// Decode backslash escapes (`\n`, `\r\n`, `\x1b`, `\u00e9`, `\033`, ...) in
/// configuration text into the bytes they stand for. Unknown escapes are kept
/// verbatim, backslash included.
pub fn decode_escapes(text: &str) -> Result<Vec<u8>, String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        let Some(escape) = chars.next() else {
            return Err("trailing backslash".to_string());
        };

        match escape {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            '0'..='7' => {
                let mut code = escape.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(digit) => {
                            code = code * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char_from_code(code, text)?);
            }
            'x' => out.push(hex_escape(&mut chars, 2, text)?),
            'u' => out.push(hex_escape(&mut chars, 4, text)?),
            'U' => out.push(hex_escape(&mut chars, 8, text)?),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }

    Ok(out.into_bytes())
}

fn hex_escape(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    digits: usize,
    text: &str,
) -> Result<char, String> {
    let mut code = 0u32;
    for _ in 0..digits {
        let digit = chars
            .next()
            .and_then(|d| d.to_digit(16))
            .ok_or_else(|| format!("truncated \\x/\\u escape in '{}'", text.escape_default()))?;
        code = code * 16 + digit;
    }
    char_from_code(code, text)
}

fn char_from_code(code: u32, text: &str) -> Result<char, String> {
    char::from_u32(code)
        .ok_or_else(|| format!("invalid character code {:#x} in '{}'", code, text.escape_default()))
}
