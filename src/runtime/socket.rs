//! Socket setup shared by both backends.

use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Open a TCP connection tuned for request/response latency.
pub(super) fn connect_stream(addr: SocketAddr, timeout: Duration) -> io::Result<TcpStream> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.connect_timeout(&addr.into(), timeout)?;
    // Requests are tiny; don't let Nagle hold them back
    socket.set_nodelay(true)?;
    socket.set_keepalive(true)?;

    Ok(socket.into())
}

pub(super) fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
    (host, port).to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no address found for {host}:{port}"),
        )
    })
}
