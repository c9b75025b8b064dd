//! Request/acknowledgment correlation.
//!
//! The engine may answer one submit with several lines, fills can precede
//! the acknowledgment, and late lines from earlier orders can still be in
//! flight. The correlator drains classified lines until it sees `ACK` for
//! exactly the order it is waiting on; everything else is counted and
//! skipped.

use crate::protocol::{classify, is_reject, FillDetail, LineFramer, Response, MAX_LINE_LEN};
use crate::runtime::Transport;
use std::fmt;
use std::io;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Read chunk size
const READ_CHUNK: usize = 16 * 1024;

/// Order id reported when no order was ever sent.
pub const NO_ORDER: u64 = 0;

/// Counters for everything the correlator consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrafficStats {
    /// Acknowledgments that completed a wait.
    pub acks: u64,
    /// Acknowledgments for some other order id.
    pub stale_acks: u64,
    pub fills: u64,
    /// Quantity summed over fills whose detail could be decoded.
    pub filled_qty: u64,
    /// Lines that were neither ACK nor FILL.
    pub unknown: u64,
    /// Unknown lines that were engine `ERR` replies.
    pub rejects: u64,
}

/// Successful end of a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acknowledged {
    pub order_id: u64,
    pub acked_at: Instant,
    /// Fills for this order seen before its acknowledgment.
    pub fills: u64,
}

/// Why a wait (or a send) ended without an acknowledgment.
#[derive(Debug)]
pub enum CorrelationError {
    /// No complete line arrived for a full timeout while waiting on `order_id`.
    Timeout { order_id: u64, idle: Duration },
    /// Peer closed the connection, or it was never established
    /// (`order_id` is [`NO_ORDER`]).
    ConnectionClosed { order_id: u64 },
    /// Any other socket failure.
    Io { order_id: u64, source: io::Error },
}

impl CorrelationError {
    /// Map an I/O failure on the way to/from the engine.
    pub fn from_io(order_id: u64, idle: Duration, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                CorrelationError::Timeout { order_id, idle }
            }
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => CorrelationError::ConnectionClosed { order_id },
            _ => CorrelationError::Io {
                order_id,
                source: err,
            },
        }
    }

    /// Map a failure to establish the connection.
    pub fn from_connect(err: io::Error) -> Self {
        debug!(error = %err, kind = ?err.kind(), "Connect failed");
        CorrelationError::ConnectionClosed { order_id: NO_ORDER }
    }

    /// Order that was in flight when the failure happened.
    pub fn order_id(&self) -> u64 {
        match self {
            CorrelationError::Timeout { order_id, .. }
            | CorrelationError::ConnectionClosed { order_id }
            | CorrelationError::Io { order_id, .. } => *order_id,
        }
    }
}

impl fmt::Display for CorrelationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationError::Timeout { order_id, idle } => write!(
                f,
                "timed out after {}ms waiting for ACK {}",
                idle.as_millis(),
                order_id
            ),
            CorrelationError::ConnectionClosed { order_id: NO_ORDER } => {
                write!(f, "could not connect to engine")
            }
            CorrelationError::ConnectionClosed { order_id } => {
                write!(f, "engine closed connection while order {} was in flight", order_id)
            }
            CorrelationError::Io { order_id, source } => {
                write!(f, "I/O error on order {}: {}", order_id, source)
            }
        }
    }
}

impl std::error::Error for CorrelationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CorrelationError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Per-connection correlation state: the line framer, the single pending
/// order slot and the traffic counters.
#[derive(Debug)]
pub struct Correlator {
    framer: LineFramer,
    pending: Option<u64>,
    read_buf: Box<[u8]>,
    stats: TrafficStats,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            framer: LineFramer::new(),
            pending: None,
            read_buf: vec![0u8; READ_CHUNK].into_boxed_slice(),
            stats: TrafficStats::default(),
        }
    }

    /// Order currently being waited on, if a wait is in progress.
    pub fn pending(&self) -> Option<u64> {
        self.pending
    }

    pub fn stats(&self) -> TrafficStats {
        self.stats
    }

    /// Bytes of an incomplete line carried over to the next read.
    pub fn buffered(&self) -> usize {
        self.framer.pending_len()
    }

    /// Block until `ACK <target>` arrives.
    ///
    /// Lines left over from earlier reads are examined before reading again.
    /// `timeout` bounds the idle time between complete lines, not the whole
    /// wait: a steady stream of unrelated lines keeps the wait alive, while
    /// bytes that never finish a line do not. On failure, any partial line
    /// stays buffered so a later wait picks up where this one stopped.
    pub fn await_ack<T: Transport + ?Sized>(
        &mut self,
        target: u64,
        transport: &mut T,
        timeout: Duration,
    ) -> Result<Acknowledged, CorrelationError> {
        self.pending = Some(target);
        let result = self.drain_until(target, transport, timeout);
        self.pending = None;
        result
    }

    fn drain_until<T: Transport + ?Sized>(
        &mut self,
        target: u64,
        transport: &mut T,
        timeout: Duration,
    ) -> Result<Acknowledged, CorrelationError> {
        let mut fills = 0;
        let mut deadline = Instant::now() + timeout;

        loop {
            while let Some(line) = self.framer.next_line() {
                if self.observe(target, &line, &mut fills) {
                    self.stats.acks += 1;
                    return Ok(Acknowledged {
                        order_id: target,
                        acked_at: Instant::now(),
                        fills,
                    });
                }
                deadline = Instant::now() + timeout;
            }

            if self.framer.is_oversized() {
                warn!(order_id = target, buffered = self.buffered(), "Line too long");
                return Err(CorrelationError::Io {
                    order_id: target,
                    source: io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("no newline within {} bytes", MAX_LINE_LEN),
                    ),
                });
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!(order_id = target, buffered = self.buffered(), "No complete line in time");
                return Err(CorrelationError::Timeout {
                    order_id: target,
                    idle: timeout,
                });
            }

            let n = transport
                .recv(&mut self.read_buf, remaining)
                .map_err(|e| CorrelationError::from_io(target, timeout, e))?;
            if n == 0 {
                debug!(order_id = target, buffered = self.buffered(), "Engine closed connection");
                return Err(CorrelationError::ConnectionClosed { order_id: target });
            }

            trace!(bytes = n, "Read chunk");
            self.framer.feed(&self.read_buf[..n]);
        }
    }

    /// Account for one line. Returns true if it acknowledges `target`.
    fn observe(&mut self, target: u64, line: &str, fills: &mut u64) -> bool {
        let response = classify(line);
        match response {
            Response::Ack { order_id } if order_id == target => return true,
            Response::Ack { order_id } => {
                self.stats.stale_acks += 1;
                debug!(order_id, waiting_for = target, "Skipping ACK for another order");
            }
            Response::Fill {
                order_id,
                ref detail,
            } => {
                self.stats.fills += 1;
                if order_id == target {
                    *fills += 1;
                }
                match FillDetail::parse(detail) {
                    Some(fill) => {
                        self.stats.filled_qty += fill.quantity;
                        trace!(
                            order_id,
                            maker_id = fill.maker_id,
                            price = fill.price,
                            qty = fill.quantity,
                            "Fill"
                        );
                    }
                    None => trace!(order_id, detail = %detail, "Fill"),
                }
            }
            Response::Unknown { ref raw } => {
                self.stats.unknown += 1;
                if is_reject(raw) {
                    self.stats.rejects += 1;
                    warn!(line = %raw, waiting_for = target, "Engine rejected request");
                } else {
                    debug!(line = %raw, "Skipping unrecognized line");
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeType;
    use crate::runtime::scripted::{ScriptedTransport, Step};
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;

    const TIMEOUT: Duration = Duration::from_millis(100);

    /// Peer that writes each chunk after `gap`, then hangs up.
    fn spawn_trickler(
        chunks: Vec<&'static [u8]>,
        gap: Duration,
    ) -> (std::net::SocketAddr, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            for chunk in chunks {
                thread::sleep(gap);
                if stream.write_all(chunk).is_err() {
                    return;
                }
            }
        });
        (addr, handle)
    }

    #[test]
    fn test_waits_for_matching_id_only() {
        let mut transport = ScriptedTransport::chunks(&["ACK 7\nFILL 7 3 100 2\nACK 8\n"]);
        let mut correlator = Correlator::new();

        let ack = correlator.await_ack(8, &mut transport, TIMEOUT).unwrap();
        assert_eq!(ack.order_id, 8);
        assert_eq!(ack.fills, 0);

        let stats = correlator.stats();
        assert_eq!(stats.acks, 1);
        assert_eq!(stats.stale_acks, 1);
        assert_eq!(stats.fills, 1);
        assert_eq!(stats.filled_qty, 2);
        assert_eq!(correlator.buffered(), 0);
    }

    #[test]
    fn test_fill_before_ack_is_counted_against_order() {
        let mut transport =
            ScriptedTransport::chunks(&["FILL 2 1 100 5\nFILL 2 4 101 1\n", "ACK 2\n"]);
        let mut correlator = Correlator::new();

        let ack = correlator.await_ack(2, &mut transport, TIMEOUT).unwrap();
        assert_eq!(ack.fills, 2);
        assert_eq!(correlator.stats().filled_qty, 6);
        assert_eq!(transport.reads, 2);
    }

    #[test]
    fn test_ack_split_across_reads() {
        let mut transport = ScriptedTransport::chunks(&["AC", "K ", "1", "2\n"]);
        let mut correlator = Correlator::new();

        let ack = correlator.await_ack(12, &mut transport, TIMEOUT).unwrap();
        assert_eq!(ack.order_id, 12);
        assert_eq!(transport.reads, 4);
    }

    #[test]
    fn test_partial_id_is_not_a_match() {
        // "ACK 1" is only a prefix of "ACK 12"
        let mut transport = ScriptedTransport::chunks(&["ACK 1", "2\nACK 1\n"]);
        let mut correlator = Correlator::new();

        correlator.await_ack(1, &mut transport, TIMEOUT).unwrap();
        assert_eq!(correlator.stats().stale_acks, 1);
    }

    #[test]
    fn test_buffered_lines_drained_before_reading() {
        let mut transport = ScriptedTransport::chunks(&["ACK 1\nACK 2\n"]);
        let mut correlator = Correlator::new();

        correlator.await_ack(1, &mut transport, TIMEOUT).unwrap();
        // ACK 2 is already buffered; the empty script would report closure
        // if another read were issued
        correlator.await_ack(2, &mut transport, TIMEOUT).unwrap();
        assert_eq!(transport.reads, 1);
    }

    #[test]
    fn test_noise_is_skipped() {
        let mut transport = ScriptedTransport::chunks(&[
            "ERR BAD_SIDE\n",
            "garbage\nACK\nACK x\n\n",
            "ACK 3\n",
        ]);
        let mut correlator = Correlator::new();

        correlator.await_ack(3, &mut transport, TIMEOUT).unwrap();
        let stats = correlator.stats();
        assert_eq!(stats.unknown, 5);
        assert_eq!(stats.rejects, 1);
    }

    #[test]
    fn test_timeout_keeps_partial_line() {
        let mut transport = ScriptedTransport::new([
            Step::Chunk(b"FILL 4 1 99 1\nACK 4".to_vec()),
            Step::Stall,
        ]);
        let mut correlator = Correlator::new();

        match correlator.await_ack(4, &mut transport, TIMEOUT) {
            Err(CorrelationError::Timeout { order_id: 4, idle }) => assert_eq!(idle, TIMEOUT),
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(correlator.pending(), None);
        assert_eq!(correlator.buffered(), 5);

        // The rest of the line arrives on a fresh read
        transport.push(Step::Chunk(b"\n".to_vec()));
        let ack = correlator.await_ack(4, &mut transport, TIMEOUT).unwrap();
        assert_eq!(ack.order_id, 4);
    }

    #[test]
    fn test_trickled_bytes_without_newline_time_out() {
        for runtime in [RuntimeType::Blocking, RuntimeType::Mio] {
            let (addr, peer) = spawn_trickler(vec![b"x"; 50], Duration::from_millis(20));
            let mut transport =
                crate::runtime::connect(addr, runtime, Duration::from_secs(2)).unwrap();
            let mut correlator = Correlator::new();

            let started = Instant::now();
            let result = correlator.await_ack(1, &mut transport, TIMEOUT);
            let waited = started.elapsed();

            assert!(
                matches!(result, Err(CorrelationError::Timeout { order_id: 1, .. })),
                "{:?}: unexpected {:?}",
                runtime,
                result
            );
            assert!(waited < Duration::from_millis(600), "{:?}: waited {:?}", runtime, waited);
            assert!(correlator.buffered() > 0);

            drop(transport);
            peer.join().unwrap();
        }
    }

    #[test]
    fn test_complete_lines_extend_the_wait() {
        for runtime in [RuntimeType::Blocking, RuntimeType::Mio] {
            let mut chunks: Vec<&'static [u8]> = vec![b"FILL 9 1 100 1\n"; 5];
            chunks.push(b"ACK 1\n");
            let (addr, peer) = spawn_trickler(chunks, Duration::from_millis(40));
            let mut transport =
                crate::runtime::connect(addr, runtime, Duration::from_secs(2)).unwrap();
            let mut correlator = Correlator::new();

            // Six gaps of 40ms add up to more than one timeout
            let ack = correlator.await_ack(1, &mut transport, TIMEOUT).unwrap();
            assert_eq!(ack.order_id, 1);
            assert_eq!(correlator.stats().fills, 5);

            drop(transport);
            peer.join().unwrap();
        }
    }

    #[test]
    fn test_oversized_line_is_an_error() {
        let mut transport = ScriptedTransport::new([Step::Chunk(vec![b'x'; MAX_LINE_LEN + 1])]);
        let mut correlator = Correlator::new();

        match correlator.await_ack(1, &mut transport, TIMEOUT) {
            Err(CorrelationError::Io { order_id: 1, source }) => {
                assert_eq!(source.kind(), io::ErrorKind::InvalidData)
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_connect_failure_is_connection_closed() {
        let err = CorrelationError::from_connect(io::Error::from(io::ErrorKind::TimedOut));
        assert!(matches!(
            err,
            CorrelationError::ConnectionClosed { order_id: NO_ORDER }
        ));
        assert_eq!(err.to_string(), "could not connect to engine");
    }

    #[test]
    fn test_connection_closed() {
        let mut transport =
            ScriptedTransport::new([Step::Chunk(b"FILL 5 1 1 1\n".to_vec()), Step::Close]);
        let mut correlator = Correlator::new();

        match correlator.await_ack(5, &mut transport, TIMEOUT) {
            Err(CorrelationError::ConnectionClosed { order_id: 5 }) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_io_error_mapping() {
        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        assert!(matches!(
            CorrelationError::from_io(1, TIMEOUT, reset),
            CorrelationError::ConnectionClosed { order_id: 1 }
        ));

        let would_block = io::Error::from(io::ErrorKind::WouldBlock);
        assert!(matches!(
            CorrelationError::from_io(2, TIMEOUT, would_block),
            CorrelationError::Timeout { order_id: 2, .. }
        ));

        let other = io::Error::from(io::ErrorKind::PermissionDenied);
        let err = CorrelationError::from_io(3, TIMEOUT, other);
        assert_eq!(err.order_id(), 3);
        assert!(matches!(err, CorrelationError::Io { .. }));
    }
}
