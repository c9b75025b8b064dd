//! Client-side transports for talking to the engine.
//!
//! Two interchangeable backends:
//! - `blocking`: std socket with kernel read/write timeouts
//! - `mio`: non-blocking socket driven by readiness polling (epoll/kqueue)
//!
//! Both implement [`Transport`], which is all the session driver sees. Tests
//! swap in a scripted byte source instead of a socket.

mod blocking;
mod mio;
mod socket;

#[cfg(test)]
pub(crate) mod scripted;

pub use blocking::BlockingTransport;
pub use self::mio::MioTransport;

use crate::config::RuntimeType;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

/// A bidirectional byte pipe with per-operation deadlines.
///
/// Contract shared by every implementation:
/// - `recv` returning `Ok(0)` means the peer closed the connection.
/// - An expired deadline is an error of kind `TimedOut` (or `WouldBlock`).
pub trait Transport {
    /// Write all of `data`, waiting at most `timeout` for the socket to drain.
    fn send(&mut self, data: &[u8], timeout: Duration) -> io::Result<()>;

    /// Read whatever is available into `buf`, waiting at most `timeout` for
    /// the first byte.
    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, data: &[u8], timeout: Duration) -> io::Result<()> {
        (**self).send(data, timeout)
    }

    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        (**self).recv(buf, timeout)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, data: &[u8], timeout: Duration) -> io::Result<()> {
        (**self).send(data, timeout)
    }

    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        (**self).recv(buf, timeout)
    }
}

/// Connect to `addr` with the selected backend.
pub fn connect(
    addr: SocketAddr,
    runtime: RuntimeType,
    connect_timeout: Duration,
) -> io::Result<Box<dyn Transport>> {
    let stream = socket::connect_stream(addr, connect_timeout)?;

    info!(peer = %addr, runtime = ?runtime, "Connected to engine");

    Ok(match runtime {
        RuntimeType::Blocking => Box::new(BlockingTransport::new(stream)),
        RuntimeType::Mio => Box::new(MioTransport::new(stream)?),
    })
}

/// Resolve `host:port` to the first usable socket address.
pub fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
    socket::resolve(host, port)
}

/// Build a `TimedOut` error for an expired deadline.
fn timed_out(op: &str) -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, format!("{op} timed out"))
}
