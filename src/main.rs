//! order-rtt: round-trip latency harness for order-submission engines
//!
//! Opens one TCP connection to a matching engine, submits synthetic orders
//! one at a time and measures how long each takes to be acknowledged.
//!
//! Features:
//! - Line framing tolerant of arbitrary read splits
//! - Acknowledgments matched by order id, skipping fills and noise
//! - Periodic checkpoints plus a final min/mean/percentile/max report
//! - Blocking or mio (epoll/kqueue) I/O backends
//! - Configuration via CLI arguments or TOML file

mod config;
mod correlator;
mod generator;
mod protocol;
mod runtime;
mod session;
mod signal;
mod stats;

use config::Config;
use correlator::CorrelationError;
use generator::UniformGenerator;
use runtime::Transport;
use session::{Session, SessionConfig, SessionResult};
use std::io;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        host = %config.host,
        port = config.port,
        count = config.count,
        timeout_ms = config.timeout.as_millis() as u64,
        runtime = ?config.runtime,
        seed = ?config.seed,
        "Starting order-rtt"
    );

    let result = match open_connection(&config) {
        Ok(transport) => run_session(&config, transport),
        Err(e) => {
            error!(
                host = %config.host,
                port = config.port,
                error = %e,
                "Could not connect to engine"
            );
            SessionResult::not_started(config.count, CorrelationError::from_connect(e))
        }
    };

    println!("{}", result.summary);
    if result.cancelled {
        println!(
            "cancelled after {} of {} orders",
            result.summary.count, result.requested
        );
    }

    println!(
        "fills {} (qty {}), stale acks {}, unrecognized lines {} ({} rejects)",
        result.traffic.fills,
        result.traffic.filled_qty,
        result.traffic.stale_acks,
        result.traffic.unknown,
        result.traffic.rejects
    );

    if result.is_complete() {
        info!(orders = result.requested, "All orders acknowledged");
    }

    match result.failure {
        Some(cause) => {
            error!(
                order_id = cause.order_id(),
                last_acked = ?result.samples.last().map(|s| s.order_id),
                "Session ended early: {}",
                cause
            );
            Err(cause.into())
        }
        None => Ok(()),
    }
}

fn open_connection(config: &Config) -> io::Result<Box<dyn Transport>> {
    let addr = runtime::resolve(&config.host, config.port)?;
    runtime::connect(addr, config.runtime, config.connect_timeout)
}

fn run_session(config: &Config, transport: Box<dyn Transport>) -> SessionResult {
    let generator = UniformGenerator::new(
        config.price_min..=config.price_max,
        config.qty_min..=config.qty_max,
        config.seed,
    );

    let mut session = Session::new(
        transport,
        generator,
        SessionConfig {
            count: config.count,
            timeout: config.timeout,
            report_interval: config.report_interval,
        },
    );
    match signal::install_interrupt_flag() {
        Ok(flag) => session = session.with_cancel(flag),
        Err(e) => warn!(error = %e, "Ctrl-C will not stop the session cleanly"),
    }

    session.run()
}
