//! Session driver: generate, send, correlate, record.
//!
//! One connection, one order in flight. A failed order is never resent:
//! after a timeout the engine may or may not have taken it, and a resend
//! would break the one-id-per-order sequence the correlator depends on.

use crate::correlator::{CorrelationError, Correlator, TrafficStats};
use crate::generator::OrderSource;
use crate::runtime::Transport;
use crate::stats::{LatencyReporter, LatencySample, Summary};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Upper bound on samples preallocated up front.
const MAX_PREALLOC: u64 = 1 << 20;

/// Knobs for one session run.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Orders to submit.
    pub count: u64,
    /// Deadline for each write and for the idle gap between response lines.
    pub timeout: Duration,
    /// Checkpoint every N completed orders (0 = never).
    pub report_interval: u64,
}

/// What a session achieved, successful or not.
#[derive(Debug)]
pub struct SessionResult {
    pub requested: u64,
    pub summary: Summary,
    pub samples: Vec<LatencySample>,
    pub traffic: TrafficStats,
    /// Cause of an early stop.
    pub failure: Option<CorrelationError>,
    /// Stopped between orders on request.
    pub cancelled: bool,
}

impl SessionResult {
    /// Result for a session that never got to send an order.
    pub fn not_started(requested: u64, failure: CorrelationError) -> Self {
        let (summary, samples) = LatencyReporter::new(0, 0).finish();
        Self {
            requested,
            summary,
            samples,
            traffic: TrafficStats::default(),
            failure: Some(failure),
            cancelled: false,
        }
    }

    /// Check if every requested order was acknowledged.
    pub fn is_complete(&self) -> bool {
        self.failure.is_none() && !self.cancelled && self.summary.count == self.requested
    }
}

/// Drives one connection through `count` request/acknowledgment cycles.
pub struct Session<T, G> {
    transport: T,
    generator: G,
    correlator: Correlator,
    config: SessionConfig,
    cancel: Option<&'static AtomicBool>,
}

impl<T: Transport, G: OrderSource> Session<T, G> {
    pub fn new(transport: T, generator: G, config: SessionConfig) -> Self {
        Self {
            transport,
            generator,
            correlator: Correlator::new(),
            config,
            cancel: None,
        }
    }

    /// Stop between orders once `flag` is set.
    pub fn with_cancel(mut self, flag: &'static AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Run to completion or the first fatal error. The connection is
    /// dropped when this returns.
    pub fn run(mut self) -> SessionResult {
        let SessionConfig {
            count,
            timeout,
            report_interval,
        } = self.config;

        let mut reporter = LatencyReporter::new(report_interval, count.min(MAX_PREALLOC) as usize);
        let mut failure = None;
        let mut cancelled = false;

        info!(
            count,
            timeout_ms = timeout.as_millis() as u64,
            report_interval,
            "Starting session"
        );

        for _ in 0..count {
            if self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                info!(completed = reporter.count(), "Session cancelled");
                cancelled = true;
                break;
            }

            debug_assert!(self.correlator.pending().is_none());
            let order = self.generator.next_order();
            let request = order.encode();

            let sent_at = Instant::now();
            if let Err(e) = self.transport.send(&request, timeout) {
                let cause = CorrelationError::from_io(order.id, timeout, e);
                error!(order_id = order.id, error = %cause, "Failed to send order");
                failure = Some(cause);
                break;
            }

            match self
                .correlator
                .await_ack(order.id, &mut self.transport, timeout)
            {
                Ok(ack) => {
                    debug!(order_id = ack.order_id, fills = ack.fills, "Acknowledged");
                    reporter.record(LatencySample {
                        order_id: order.id,
                        sent_at,
                        acked_at: ack.acked_at,
                    });
                }
                Err(cause) => {
                    error!(order_id = order.id, error = %cause, "Session aborted");
                    failure = Some(cause);
                    break;
                }
            }
        }

        let traffic = self.correlator.stats();
        let (summary, samples) = reporter.finish();

        info!(
            completed = summary.count,
            requested = count,
            acks = traffic.acks,
            fills = traffic.fills,
            stale_acks = traffic.stale_acks,
            unknown = traffic.unknown,
            rejects = traffic.rejects,
            "Session finished"
        );

        SessionResult {
            requested: count,
            summary,
            samples,
            traffic,
            failure,
            cancelled,
        }
    }
}
