/// Bounded collection of a child's stdout/stderr.
///
/// Reader threads start as soon as the child is spawned so a chatty program
/// can never block on a full pipe. Bytes past the per-stream cap are drained
/// and discarded; the child keeps running until it exits or is killed.
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::fmt;
use std::io::Read;
use std::thread;
use std::time::{Duration, Instant};

/// Output limits configuration
#[derive(Debug, Clone)]
pub struct OutputLimits {
    /// Per-stream stdout limit (bytes)
    pub stdout_limit: usize,
    /// Per-stream stderr limit (bytes)
    pub stderr_limit: usize,
    /// How long to wait for readers after the child is gone
    pub drain_timeout: Duration,
}

impl Default for OutputLimits {
    fn default() -> Self {
        OutputLimits {
            stdout_limit: 8 * 1024 * 1024,
            stderr_limit: 2 * 1024 * 1024,
            drain_timeout: Duration::from_secs(2),
        }
    }
}

/// How completely a stream was captured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputIntegrity {
    Complete,
    /// Stream exceeded its cap; the tail was discarded
    Truncated,
    /// Read failed part-way
    ReadError,
    /// Reader did not finish before the drain timeout
    Abandoned,
}

impl fmt::Display for OutputIntegrity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutputIntegrity::Complete => "complete",
            OutputIntegrity::Truncated => "truncated",
            OutputIntegrity::ReadError => "read_error",
            OutputIntegrity::Abandoned => "abandoned",
        };
        f.write_str(s)
    }
}

/// Captured bytes of one stream
#[derive(Debug, Clone)]
pub struct StreamCapture {
    pub data: Vec<u8>,
    pub integrity: OutputIntegrity,
    /// Total bytes the child wrote, including discarded ones
    pub total_bytes: usize,
}

impl StreamCapture {
    fn empty(integrity: OutputIntegrity) -> Self {
        Self {
            data: Vec::new(),
            integrity,
            total_bytes: 0,
        }
    }

    pub fn lossy(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// Output collection result
#[derive(Debug, Clone)]
pub struct OutputResult {
    pub stdout: StreamCapture,
    pub stderr: StreamCapture,
}

impl OutputResult {
    /// Human-readable notes about anything that was not captured completely
    pub fn integrity_notes(&self) -> Vec<String> {
        let mut notes = Vec::new();
        for (name, capture) in [("stdout", &self.stdout), ("stderr", &self.stderr)] {
            match capture.integrity {
                OutputIntegrity::Complete => {}
                OutputIntegrity::Truncated => notes.push(format!(
                    "[sandbox] {} truncated to {} of {} bytes",
                    name,
                    capture.data.len(),
                    capture.total_bytes
                )),
                other => notes.push(format!("[sandbox] {} capture {}", name, other)),
            }
        }
        notes
    }
}

/// Output collector with bounded collection
pub struct OutputCollector {
    limits: OutputLimits,
}

/// Readers attached to a running child
pub struct PendingOutput {
    stdout_rx: Option<Receiver<StreamCapture>>,
    stderr_rx: Option<Receiver<StreamCapture>>,
    drain_timeout: Duration,
}

impl OutputCollector {
    pub fn new(limits: OutputLimits) -> Self {
        OutputCollector { limits }
    }

    /// Start draining both streams in background threads
    pub fn start<O, E>(&self, stdout: Option<O>, stderr: Option<E>) -> PendingOutput
    where
        O: Read + Send + 'static,
        E: Read + Send + 'static,
    {
        PendingOutput {
            stdout_rx: stdout.map(|s| spawn_reader(s, self.limits.stdout_limit)),
            stderr_rx: stderr.map(|s| spawn_reader(s, self.limits.stderr_limit)),
            drain_timeout: self.limits.drain_timeout,
        }
    }
}

impl PendingOutput {
    /// Wait for both readers, giving up after the drain timeout.
    ///
    /// Call after the child (and its process group) is gone so the pipes are
    /// at EOF; a reader still blocked afterwards means something outside the
    /// group holds the pipe open, and its thread is abandoned.
    pub fn finish(self) -> OutputResult {
        let deadline = Instant::now() + self.drain_timeout;
        OutputResult {
            stdout: receive(self.stdout_rx, deadline),
            stderr: receive(self.stderr_rx, deadline),
        }
    }
}

fn receive(rx: Option<Receiver<StreamCapture>>, deadline: Instant) -> StreamCapture {
    let Some(rx) = rx else {
        return StreamCapture::empty(OutputIntegrity::Complete);
    };
    let remaining = deadline.saturating_duration_since(Instant::now());
    match rx.recv_timeout(remaining) {
        Ok(capture) => capture,
        Err(RecvTimeoutError::Timeout) => {
            log::warn!("output reader did not finish within drain timeout");
            StreamCapture::empty(OutputIntegrity::Abandoned)
        }
        Err(RecvTimeoutError::Disconnected) => StreamCapture::empty(OutputIntegrity::ReadError),
    }
}

fn spawn_reader<R: Read + Send + 'static>(stream: R, limit: usize) -> Receiver<StreamCapture> {
    let (tx, rx) = bounded(1);
    thread::spawn(move || collect_stream(stream, limit, tx));
    rx
}

/// Collect from a single stream with limit, draining past it
fn collect_stream<R: Read>(mut stream: R, limit: usize, tx: Sender<StreamCapture>) {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut total = 0usize;
    let mut integrity = OutputIntegrity::Complete;

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                total = total.saturating_add(n);
                let room = limit.saturating_sub(buffer.len());
                if n > room {
                    buffer.extend_from_slice(&chunk[..room]);
                    integrity = OutputIntegrity::Truncated;
                } else {
                    buffer.extend_from_slice(&chunk[..n]);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => {
                integrity = OutputIntegrity::ReadError;
                break;
            }
        }
    }

    let _ = tx.send(StreamCapture {
        data: buffer,
        integrity,
        total_bytes: total,
    });
}
