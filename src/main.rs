//! logdrill: a concurrent client harness for a request/response
//! logging server.
//!
//! Drives four sessions on a bounded worker pool:
//! - two stream sessions, one per TCP target port
//! - two datagram sessions sharing one UDP target port
//!
//! Each session sends four log request lines and reads one reply per
//! request, strictly interleaved, then the harness drains the pool
//! with a bounded two-phase shutdown. Session failures are logged and
//! never change the exit code.

mod config;
mod harness;
mod pool;
mod session;

use config::Config;
use harness::Harness;
use tracing::info;
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
        tcp_ports = ?config.tcp_ports,
        udp_port = config.udp_port,
        workers = config.workers,
        grace_ms = config.grace.as_millis() as u64,
        cancel_wait_ms = config.cancel_wait.as_millis() as u64,
        "Starting logdrill harness"
    );

    // The worker pool: one runtime thread per execution slot
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let mut harness = Harness::new(config);
        harness.start().await?;
        harness.stop().await;
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    info!("Harness stopped");
    Ok(())
}
