//! mio-based transport.
//!
//! Readiness-based I/O using mio (epoll on Linux, kqueue on macOS).
//! Selectable next to the blocking backend for comparison.

mod event_loop;

pub use event_loop::MioTransport;
