//! Session pool manager for the canonical client roster.
//!
//! `start` submits one stream session per configured TCP port and two
//! datagram sessions sharing the configured UDP port, numbered
//! "Client 1", "Client 2", ... in submission order. `stop` drives the
//! pool's bounded two-phase shutdown and always returns.

use tracing::info;

use crate::config::Config;
use crate::pool::SessionPool;
use crate::session::ClientSession;

/// Datagram sessions sharing the UDP target port
const DATAGRAM_SESSIONS: usize = 2;

pub struct Harness {
    config: Config,
    pool: SessionPool,
}

impl Harness {
    pub fn new(config: Config) -> Self {
        let pool = SessionPool::new(config.workers, config.grace, config.cancel_wait);
        Self { config, pool }
    }

    /// Submit the full roster. All sessions run concurrently and
    /// independently; a failing session never affects the others.
    pub async fn start(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut client = 0usize;

        for &port in &self.config.tcp_ports {
            client += 1;
            let session =
                ClientSession::stream(format!("Client {}", client), self.config.host.as_str(), port);
            self.pool.submit(session).await?;
        }

        for _ in 0..DATAGRAM_SESSIONS {
            client += 1;
            let session = ClientSession::datagram(
                format!("Client {}", client),
                self.config.host.as_str(),
                self.config.udp_port,
            );
            self.pool.submit(session).await?;
        }

        info!(sessions = client, "All sessions submitted");
        Ok(())
    }

    /// Stop the harness: bounded two-phase shutdown of the pool.
    ///
    /// Returns once every session has finished or the cancellation
    /// bound has elapsed; cancellation failures are logged, never
    /// escalated.
    pub async fn stop(self) {
        self.pool.shutdown().await;
    }
}
