//! Session pool with bounded concurrency and two-phase shutdown.
//!
//! Sessions are admitted against a fixed number of execution slots and
//! run as independent tasks; a slot is held for the whole session
//! lifetime, so running sessions never exceed the pool capacity.
//! Shutdown first waits a grace period for sessions to finish on their
//! own, then aborts the stragglers (interrupting any blocked I/O) and
//! waits a second bound for the aborts to settle. It always returns.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time;
use tracing::{error, info, warn};

use crate::session::{ClientSession, SessionError, SessionReport};

type SessionOutcome = (String, Result<SessionReport, SessionError>);

/// Fixed-capacity pool of running sessions
pub struct SessionPool {
    slots: Arc<Semaphore>,
    tasks: JoinSet<SessionOutcome>,
    grace: Duration,
    cancel_wait: Duration,
}

impl SessionPool {
    /// Create a pool with `capacity` execution slots and the two
    /// shutdown bounds.
    pub fn new(capacity: usize, grace: Duration, cancel_wait: Duration) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
            tasks: JoinSet::new(),
            grace,
            cancel_wait,
        }
    }

    /// Number of free execution slots.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Number of sessions submitted and not yet joined.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Submit a session, waiting for a free execution slot.
    pub async fn submit(
        &mut self,
        session: ClientSession,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let permit = Arc::clone(&self.slots).acquire_owned().await?;

        info!(
            client = %session.name,
            transport = ?session.transport,
            host = %session.host,
            port = session.port,
            "Submitting session"
        );

        self.tasks.spawn(async move {
            let name = session.name.clone();
            let result = session.run().await;
            drop(permit);
            (name, result)
        });

        Ok(())
    }

    /// Shut down the pool: drain within the grace period, then abort
    /// whatever remains and wait for the aborts to settle.
    ///
    /// Consuming the pool stops new submissions. Session failures and
    /// cancellation failures are logged, never escalated.
    pub async fn shutdown(mut self) {
        info!(in_flight = self.tasks.len(), "Draining session pool");

        if time::timeout(self.grace, drain(&mut self.tasks)).await.is_ok() {
            info!("All sessions finished within grace period");
            return;
        }

        warn!(
            remaining = self.tasks.len(),
            "Grace period elapsed, cancelling remaining sessions"
        );
        self.tasks.abort_all();

        if time::timeout(self.cancel_wait, drain(&mut self.tasks))
            .await
            .is_err()
        {
            error!(
                remaining = self.tasks.len(),
                "Sessions still running after forced cancellation"
            );
        }
    }
}

/// Join sessions until none remain, logging each outcome.
async fn drain(tasks: &mut JoinSet<SessionOutcome>) {
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((name, Ok(report))) => {
                info!(client = %name, rounds = report.rounds, "Session finished");
            }
            Ok((name, Err(e))) => {
                error!(client = %name, error = %e, "Session failed");
            }
            Err(e) if e.is_cancelled() => {
                warn!("Session cancelled during shutdown");
            }
            Err(e) => {
                error!(error = %e, "Session panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{PACING_DELAY, ROUNDS};
    use tokio::net::{TcpListener, UdpSocket};
    use tokio::time::Instant;

    async fn udp_echo_server() -> (u16, tokio::task::JoinHandle<()>) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            loop {
                let (n, from) = socket.recv_from(&mut buf).await.unwrap();
                socket.send_to(&buf[..n], from).await.unwrap();
            }
        });
        (port, handle)
    }

    #[tokio::test]
    async fn test_capacity_four_admits_full_roster_without_queueing() {
        let (port, server) = udp_echo_server().await;
        let mut pool = SessionPool::new(4, Duration::from_secs(10), Duration::from_secs(1));

        for i in 1..=4 {
            let session = ClientSession::datagram(format!("Client {}", i), "127.0.0.1", port);
            pool.submit(session).await.unwrap();
        }

        // All four got a slot immediately; none is queued
        assert_eq!(pool.available_slots(), 0);
        assert_eq!(pool.len(), 4);

        pool.shutdown().await;
        server.abort();
    }

    #[tokio::test]
    async fn test_capacity_one_queues_second_session() {
        let (port, server) = udp_echo_server().await;
        let mut pool = SessionPool::new(1, Duration::from_secs(10), Duration::from_secs(1));

        pool.submit(ClientSession::datagram("Client 3", "127.0.0.1", port))
            .await
            .unwrap();
        assert_eq!(pool.available_slots(), 0);

        // The second submit must wait for the first session's slot
        let start = Instant::now();
        pool.submit(ClientSession::datagram("Client 4", "127.0.0.1", port))
            .await
            .unwrap();
        assert!(start.elapsed() >= PACING_DELAY * (ROUNDS as u32) - Duration::from_millis(50));

        pool.shutdown().await;
        server.abort();
    }

    #[tokio::test]
    async fn test_shutdown_bounds_hold_for_stuck_session() {
        // Accepts the connection and never replies
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let _held = stream;
            std::future::pending::<()>().await;
        });

        let grace = Duration::from_millis(200);
        let cancel_wait = Duration::from_millis(300);
        let mut pool = SessionPool::new(4, grace, cancel_wait);
        pool.submit(ClientSession::stream("Client 1", "127.0.0.1", port))
            .await
            .unwrap();

        let start = Instant::now();
        pool.shutdown().await;
        let elapsed = start.elapsed();

        assert!(elapsed >= grace);
        assert!(elapsed < grace + cancel_wait + Duration::from_secs(2));
        server.abort();
    }

    #[tokio::test]
    async fn test_shutdown_of_empty_pool_returns_immediately() {
        let pool = SessionPool::new(4, Duration::from_secs(10), Duration::from_secs(10));
        let start = Instant::now();
        pool.shutdown().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_failed_session_does_not_affect_pool() {
        let (port, server) = udp_echo_server().await;
        let mut pool = SessionPool::new(4, Duration::from_secs(10), Duration::from_secs(1));

        // One session pointed at a closed TCP port, one healthy
        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let closed_port = closed.local_addr().unwrap().port();
        drop(closed);

        pool.submit(ClientSession::stream("Client 1", "127.0.0.1", closed_port))
            .await
            .unwrap();
        pool.submit(ClientSession::datagram("Client 3", "127.0.0.1", port))
            .await
            .unwrap();

        // Both join within the grace period; the failure is logged, not escalated
        pool.shutdown().await;
        server.abort();
    }
}
