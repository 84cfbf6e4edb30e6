//! Datagram transport session.
//!
//! Resolves the target once, binds one ephemeral socket for the full
//! round loop, and connects it so replies from other peers are
//! filtered. Two sessions may share one target port; datagram
//! demultiplexing is the server's job. The socket is released on every
//! exit path when it drops.

use tokio::net::{lookup_host, UdpSocket};
use tokio::time;
use tracing::{debug, info};

use super::{
    request_payload, ClientSession, Reply, SessionError, SessionReport, PACING_DELAY,
    REPLY_BUFFER_SIZE, ROUNDS,
};

/// Run a datagram session to completion.
pub(crate) async fn run(session: ClientSession) -> Result<SessionReport, SessionError> {
    // Resolve once for the whole session; first address wins
    let target = lookup_host((session.host.as_str(), session.port))
        .await
        .map_err(|e| SessionError::Resolve(format!("{}:{}: {}", session.host, session.port, e)))?
        .next()
        .ok_or_else(|| {
            SessionError::Resolve(format!(
                "{}:{} resolved to no addresses",
                session.host, session.port
            ))
        })?;

    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(SessionError::Connect)?;
    socket.connect(target).await.map_err(SessionError::Connect)?;

    debug!(client = %session.name, target = %target, "Datagram socket bound");

    let mut report = SessionReport::new(&session.name);

    for round in 0..ROUNDS {
        let payload = request_payload(&session.name, round);
        socket
            .send(payload.as_bytes())
            .await
            .map_err(|e| SessionError::Send { round, source: e })?;

        // One reply datagram per request, at most REPLY_BUFFER_SIZE bytes
        let mut buf = [0u8; REPLY_BUFFER_SIZE];
        let n = socket
            .recv(&mut buf)
            .await
            .map_err(|e| SessionError::Recv { round, source: e })?;

        if n == 0 {
            info!(client = %session.name, round, "Read zero bytes");
            report.replies.push(Reply::Empty);
        } else {
            let text = String::from_utf8_lossy(&buf[..n]).into_owned();
            info!(client = %session.name, round, reply = %text, "Reply received");
            report.replies.push(Reply::Text(text));
        }
        report.rounds += 1;

        time::sleep(PACING_DELAY).await;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn echo_server() -> (u16, Arc<AtomicUsize>, tokio::task::JoinHandle<()>) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        let received = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&received);
        let handle = tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            loop {
                let (n, from) = socket.recv_from(&mut buf).await.unwrap();
                counter.fetch_add(1, Ordering::SeqCst);
                let reply = format!("ECHO:{}", String::from_utf8_lossy(&buf[..n]));
                socket.send_to(reply.as_bytes(), from).await.unwrap();
            }
        });

        (port, received, handle)
    }

    #[tokio::test]
    async fn test_two_sessions_share_target_port() {
        let (port, received, server) = echo_server().await;

        let client3 = ClientSession::datagram("Client 3", "127.0.0.1", port);
        let client4 = ClientSession::datagram("Client 4", "127.0.0.1", port);
        let (r3, r4) = tokio::join!(client3.run(), client4.run());

        for (name, report) in [("Client 3", r3.unwrap()), ("Client 4", r4.unwrap())] {
            assert_eq!(report.rounds, ROUNDS);
            let expected: Vec<Reply> = (0..ROUNDS)
                .map(|round| Reply::Text(format!("ECHO:{} - Log request: {}", name, round)))
                .collect();
            assert_eq!(report.replies, expected);
        }

        // Every reply followed its request, so all datagrams have landed
        assert_eq!(received.load(Ordering::SeqCst), 2 * ROUNDS);
        server.abort();
    }

    #[tokio::test]
    async fn test_empty_reply_is_notice_not_error() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();

        // Replies to every request with a zero-length datagram
        let server = tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            for _ in 0..ROUNDS {
                let (_, from) = socket.recv_from(&mut buf).await.unwrap();
                socket.send_to(&[], from).await.unwrap();
            }
        });

        let report = ClientSession::datagram("Client 3", "127.0.0.1", port)
            .run()
            .await
            .unwrap();

        assert_eq!(report.rounds, ROUNDS);
        assert_eq!(report.replies, vec![Reply::Empty; ROUNDS]);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_resolution_failure_is_session_local() {
        let err = ClientSession::datagram("Client 3", "no-such-host.invalid", 6668)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Resolve(_)));
    }
}
