//! Readiness-driven loop that interleaves the lines of all live devices.
//!
//! Every device descriptor is registered with the tokio reactor. One task
//! waits until at least one of them is readable, then reads a single line
//! from each ready device in turn. A device that still has buffered input
//! keeps its readiness, so it is served again on the next pass without
//! starving the others.

use crate::core::device::InputDevice;
use crate::domain::error::{MultiComError, MultiComResult};
use std::future::{poll_fn, Future};
use std::io::Write;
use std::os::unix::io::{AsRawFd, RawFd};
use std::task::Poll;
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tracing::{debug, info};

/// Owned device registered with the reactor
struct Watched(Box<dyn InputDevice>);

impl AsRawFd for Watched {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}

pub struct Multiplexer {
    devices: Vec<AsyncFd<Watched>>,
}

impl Multiplexer {
    /// Register the devices with the current tokio runtime.
    pub fn new(devices: Vec<Box<dyn InputDevice>>) -> MultiComResult<Self> {
        let devices = devices
            .into_iter()
            .map(|device| {
                let name = device.name().to_string();
                AsyncFd::with_interest(Watched(device), Interest::READABLE).map_err(|e| {
                    MultiComError::device(&name, format!("cannot watch descriptor: {}", e))
                })
            })
            .collect::<MultiComResult<Vec<_>>>()?;

        Ok(Self { devices })
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Banner entries, one per device
    pub fn labels(&self) -> Vec<String> {
        self.devices
            .iter()
            .map(|device| device.get_ref().0.display_label())
            .collect()
    }

    /// Print lines to `out` until `shutdown` resolves or no device is left.
    ///
    /// Read failures are written to `errors` and retire the failing device.
    /// `shutdown` is only observed while waiting, never in the middle of a read.
    pub async fn run<W, E, F>(&mut self, out: &mut W, errors: &mut E, shutdown: F) -> MultiComResult<()>
    where
        W: Write,
        E: Write,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        while !self.devices.is_empty() {
            let ready = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Interrupted, stopping monitor");
                    return Ok(());
                }
                ready = wait_ready(&self.devices) => ready,
            };

            self.drain(&ready, out, errors).await?;
        }

        info!("No devices left to monitor");
        Ok(())
    }

    /// Read one line from each ready device
    async fn drain<W: Write, E: Write>(
        &mut self,
        ready: &[usize],
        out: &mut W,
        errors: &mut E,
    ) -> MultiComResult<()> {
        let mut retired = Vec::new();

        for &index in ready {
            let failure = match self.devices[index].readable_mut().await {
                Err(source) => Some(MultiComError::Read {
                    device: self.devices[index].get_ref().0.name().to_string(),
                    source,
                }),
                Ok(mut guard) => {
                    let device = &mut guard.get_inner_mut().0;

                    let outcome = device.read_line().and_then(|line| {
                        if let Some(line) = &line {
                            writeln!(out, "{}", line)?;
                            out.flush()?;
                        }
                        device.has_pending_input()
                    });

                    match outcome {
                        Ok(true) => {
                            debug!("'{}' has more buffered input", device.name());
                            None
                        }
                        Ok(false) => {
                            guard.clear_ready();
                            None
                        }
                        Err(e @ MultiComError::Io(_)) => return Err(e),
                        Err(e) => Some(e),
                    }
                }
            };

            if let Some(e) = failure {
                debug!("Retiring device '{}': {}", self.devices[index].get_ref().0.name(), e);
                writeln!(errors, "{}", e)?;
                retired.push(index);
            }
        }

        for index in retired.into_iter().rev() {
            self.devices.remove(index);
        }

        Ok(())
    }
}

/// Resolve with the indices of every readable device once at least one is readable
async fn wait_ready(devices: &[AsyncFd<Watched>]) -> Vec<usize> {
    poll_fn(|cx| {
        let ready: Vec<usize> = devices
            .iter()
            .enumerate()
            .filter_map(|(index, device)| match device.poll_read_ready(cx) {
                // Dropping the guard keeps the readiness; it is cleared after the read
                Poll::Ready(Ok(_guard)) => Some(index),
                // Reported and retired by the read that follows
                Poll::Ready(Err(e)) => {
                    debug!("Readiness error on '{}': {}", device.get_ref().0.name(), e);
                    Some(index)
                }
                Poll::Pending => None,
            })
            .collect();

        if ready.is_empty() {
            Poll::Pending
        } else {
            Poll::Ready(ready)
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::device::{prefix_line, DeviceType};
    use std::io::{self, Read};
    use std::os::unix::net::UnixStream;
    use std::time::Duration;

    /// Socket-backed device that buffers everything readable and frames on `\n`
    struct FakeDevice {
        name: String,
        stream: UnixStream,
        buffer: Vec<u8>,
        fail: bool,
    }

    impl FakeDevice {
        fn pair(name: &str) -> (Box<dyn InputDevice>, UnixStream) {
            let (ours, theirs) = UnixStream::pair().unwrap();
            ours.set_nonblocking(true).unwrap();
            let device = FakeDevice {
                name: name.to_string(),
                stream: ours,
                buffer: Vec::new(),
                fail: false,
            };
            (Box::new(device), theirs)
        }

        fn fill(&mut self) -> io::Result<()> {
            let mut chunk = [0u8; 256];
            loop {
                match self.stream.read(&mut chunk) {
                    Ok(0) => return Ok(()),
                    Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                    Err(e) => return Err(e),
                }
            }
        }
    }

    impl AsRawFd for FakeDevice {
        fn as_raw_fd(&self) -> RawFd {
            self.stream.as_raw_fd()
        }
    }

    impl InputDevice for FakeDevice {
        fn device_type(&self) -> DeviceType {
            DeviceType::Serial
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn label(&self) -> &str {
            "fake"
        }

        fn read_line(&mut self) -> MultiComResult<Option<String>> {
            if self.fail {
                return Err(MultiComError::Read {
                    device: self.name.clone(),
                    source: io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"),
                });
            }
            self.fill()?;
            match self.buffer.iter().position(|b| *b == b'\n') {
                Some(end) => {
                    let line: Vec<u8> = self.buffer.drain(..=end).collect();
                    let text = String::from_utf8_lossy(&line[..end]).into_owned();
                    Ok(Some(prefix_line(&self.name, &text)))
                }
                None => Ok(None),
            }
        }

        fn has_pending_input(&self) -> MultiComResult<bool> {
            Ok(self.buffer.contains(&b'\n'))
        }
    }

    fn lines(out: &[u8]) -> Vec<String> {
        String::from_utf8_lossy(out).lines().map(str::to_string).collect()
    }

    #[tokio::test]
    async fn test_ready_devices_are_served_in_turn() {
        let (a, mut a_tx) = FakeDevice::pair("A");
        let (b, mut b_tx) = FakeDevice::pair("B");
        std::io::Write::write_all(&mut a_tx, b"a1\na2\n").unwrap();
        std::io::Write::write_all(&mut b_tx, b"b1\n").unwrap();

        let mut mux = Multiplexer::new(vec![a, b]).unwrap();
        assert_eq!(mux.labels(), vec!["A: fake", "B: fake"]);

        let (mut out, mut errors) = (Vec::new(), Vec::new());
        mux.run(&mut out, &mut errors, tokio::time::sleep(Duration::from_millis(300)))
            .await
            .unwrap();

        assert_eq!(lines(&out), vec!["A: a1", "B: b1", "A: a2"]);
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn test_lines_arriving_later_are_printed() {
        let (a, mut a_tx) = FakeDevice::pair("A");
        let (b, mut b_tx) = FakeDevice::pair("B");
        let mut mux = Multiplexer::new(vec![a, b]).unwrap();

        let writer = tokio::spawn(async move {
            for i in 0..3 {
                std::io::Write::write_all(&mut a_tx, format!("a{}\n", i).as_bytes()).unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;
                std::io::Write::write_all(&mut b_tx, format!("b{}\n", i).as_bytes()).unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            (a_tx, b_tx)
        });

        let (mut out, mut errors) = (Vec::new(), Vec::new());
        mux.run(&mut out, &mut errors, tokio::time::sleep(Duration::from_millis(500)))
            .await
            .unwrap();
        let _keep_open = writer.await.unwrap();

        let printed = lines(&out);
        let a_lines: Vec<_> = printed.iter().filter(|l| l.starts_with("A: ")).cloned().collect();
        let b_lines: Vec<_> = printed.iter().filter(|l| l.starts_with("B: ")).cloned().collect();
        assert_eq!(a_lines, vec!["A: a0", "A: a1", "A: a2"]);
        assert_eq!(b_lines, vec!["B: b0", "B: b1", "B: b2"]);
    }

    #[tokio::test]
    async fn test_shutdown_while_idle() {
        let (a, _a_tx) = FakeDevice::pair("A");
        let mut mux = Multiplexer::new(vec![a]).unwrap();

        let (mut out, mut errors) = (Vec::new(), Vec::new());
        mux.run(&mut out, &mut errors, async {}).await.unwrap();
        assert!(out.is_empty());
        assert_eq!(mux.len(), 1);
    }

    #[tokio::test]
    async fn test_failing_device_is_retired() {
        let (a, mut a_tx) = FakeDevice::pair("A");
        let (sock, _) = UnixStream::pair().unwrap();
        let broken = Box::new(FakeDevice {
            name: "B".to_string(),
            stream: sock,
            buffer: Vec::new(),
            fail: true,
        });
        std::io::Write::write_all(&mut a_tx, b"still here\n").unwrap();

        let mut mux = Multiplexer::new(vec![a, broken]).unwrap();
        let (mut out, mut errors) = (Vec::new(), Vec::new());
        mux.run(&mut out, &mut errors, tokio::time::sleep(Duration::from_millis(300)))
            .await
            .unwrap();

        assert_eq!(lines(&out), vec!["A: still here"]);
        assert_eq!(lines(&errors), vec!["Failed reading from 'B': unplugged"]);
        assert_eq!(mux.len(), 1);
    }

    #[test]
    fn test_readiness_error_retires_device() {
        let (a, _a_tx) = FakeDevice::pair("A");
        let reactor = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let mut mux = reactor.block_on(async { Multiplexer::new(vec![a]) }).unwrap();
        // Descriptors registered with a stopped reactor fail every readiness check
        drop(reactor);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let _guard = runtime.enter();
        let (mut out, mut errors) = (Vec::new(), Vec::new());
        runtime
            .block_on(mux.run(&mut out, &mut errors, tokio::time::sleep(Duration::from_secs(5))))
            .unwrap();

        assert!(out.is_empty());
        assert!(lines(&errors)[0].starts_with("Failed reading from 'A': "));
        assert!(mux.is_empty());
    }

    #[tokio::test]
    async fn test_empty_set_returns_immediately() {
        let mut mux = Multiplexer::new(Vec::new()).unwrap();
        let (mut out, mut errors) = (Vec::new(), Vec::new());
        mux.run(&mut out, &mut errors, std::future::pending::<()>())
            .await
            .unwrap();
        assert!(mux.is_empty());
    }
}
