//! Single-connection poll loop.
//!
//! The socket is non-blocking. Each operation tries the syscall first and
//! only parks in `poll` when it would block, re-polling with whatever is
//! left of the deadline after spurious wakeups.

use crate::runtime::{timed_out, Transport};
use ::mio::net::TcpStream;
use ::mio::{Events, Interest, Poll, Token};
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};
use tracing::trace;

const STREAM_TOKEN: Token = Token(0);

pub struct MioTransport {
    stream: TcpStream,
    poll: Poll,
    events: Events,
    interest: Interest,
}

impl MioTransport {
    /// Take over a connected std stream.
    pub fn new(stream: std::net::TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        let mut stream = TcpStream::from_std(stream);

        let poll = Poll::new()?;
        let interest = Interest::READABLE;
        poll.registry()
            .register(&mut stream, STREAM_TOKEN, interest)?;

        Ok(Self {
            stream,
            poll,
            events: Events::with_capacity(4),
            interest,
        })
    }

    /// Park until the socket reports `interest` or `deadline` passes.
    fn wait(&mut self, interest: Interest, deadline: Instant, op: &str) -> io::Result<()> {
        if self.interest != interest {
            self.poll
                .registry()
                .reregister(&mut self.stream, STREAM_TOKEN, interest)?;
            self.interest = interest;
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(timed_out(op));
        }

        match self.poll.poll(&mut self.events, Some(remaining)) {
            Ok(()) => {}
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => return Ok(()),
            Err(e) => return Err(e),
        }

        if self.events.is_empty() {
            trace!(op, "Poll deadline expired");
            return Err(timed_out(op));
        }
        Ok(())
    }
}

impl Transport for MioTransport {
    fn send(&mut self, data: &[u8], timeout: Duration) -> io::Result<()> {
        let deadline = Instant::now() + timeout;
        let mut written = 0;

        while written < data.len() {
            match self.stream.write(&data[written..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write request",
                    ))
                }
                Ok(n) => written += n,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.wait(Interest::WRITABLE, deadline, "write")?;
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let deadline = Instant::now() + timeout;

        loop {
            match self.stream.read(buf) {
                Ok(n) => return Ok(n),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.wait(Interest::READABLE, deadline, "read")?;
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }
}
