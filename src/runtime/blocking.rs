//! Blocking transport on a std socket.
//!
//! Deadlines are enforced by the kernel through `SO_RCVTIMEO`/`SO_SNDTIMEO`.
//! The timeouts are only re-armed when they change.

use super::Transport;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

pub struct BlockingTransport {
    stream: TcpStream,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl BlockingTransport {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

impl Transport for BlockingTransport {
    fn send(&mut self, data: &[u8], timeout: Duration) -> io::Result<()> {
        if self.write_timeout != Some(timeout) {
            self.stream.set_write_timeout(Some(timeout))?;
            self.write_timeout = Some(timeout);
        }
        self.stream.write_all(data)
    }

    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        if self.read_timeout != Some(timeout) {
            self.stream.set_read_timeout(Some(timeout))?;
            self.read_timeout = Some(timeout);
        }
        loop {
            match self.stream.read(buf) {
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }
}
