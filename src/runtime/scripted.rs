//! Scripted transport for driving the session without a network.

use super::{timed_out, Transport};
use std::collections::VecDeque;
use std::io;
use std::time::Duration;

/// One scripted outcome of a `recv` call.
#[derive(Debug, Clone)]
pub enum Step {
    /// Deliver these bytes.
    Chunk(Vec<u8>),
    /// Nothing arrives before the deadline.
    Stall,
    /// Peer closes the connection.
    Close,
}

/// Replays `Step`s for each read and records every byte sent.
///
/// Once the script runs out, reads report a closed connection.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    steps: VecDeque<Step>,
    pub sent: Vec<u8>,
    pub reads: usize,
    /// Fail sends with this kind once set.
    pub send_error: Option<io::ErrorKind>,
}

impl ScriptedTransport {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Script made of data chunks only.
    pub fn chunks(chunks: &[&str]) -> Self {
        Self::new(chunks.iter().map(|c| Step::Chunk(c.as_bytes().to_vec())))
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push_back(step);
    }

    /// Sent requests, one per line.
    pub fn sent_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.sent)
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, data: &[u8], _timeout: Duration) -> io::Result<()> {
        if let Some(kind) = self.send_error {
            return Err(io::Error::new(kind, "scripted send failure"));
        }
        self.sent.extend_from_slice(data);
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8], _timeout: Duration) -> io::Result<usize> {
        self.reads += 1;
        match self.steps.pop_front() {
            Some(Step::Chunk(mut bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    // Leave the rest for the next read
                    self.steps.push_front(Step::Chunk(bytes.split_off(n)));
                }
                Ok(n)
            }
            Some(Step::Stall) => Err(timed_out("read")),
            Some(Step::Close) | None => Ok(0),
        }
    }
}
