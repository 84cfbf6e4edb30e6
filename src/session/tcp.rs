//! Stream transport session.
//!
//! Opens one connection and drives the fixed round loop over it: write
//! a newline-terminated request, flush, read a single reply of at most
//! `REPLY_BUFFER_SIZE` bytes, pace, repeat. The connection closes on
//! every exit path when the stream drops.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, info};

use super::{
    request_payload, ClientSession, Reply, SessionError, SessionReport, PACING_DELAY,
    REPLY_BUFFER_SIZE, ROUNDS,
};

/// Run a stream session to completion.
pub(crate) async fn run(session: ClientSession) -> Result<SessionReport, SessionError> {
    debug!(
        client = %session.name,
        host = %session.host,
        port = session.port,
        "Connecting"
    );

    let stream = TcpStream::connect((session.host.as_str(), session.port))
        .await
        .map_err(SessionError::Connect)?;

    exchange(&session.name, stream).await
}

/// Drive the request/reply rounds over any stream-like transport.
///
/// Strictly interleaved: round i's request precedes round i's reply
/// read, which precedes round i+1's request. A reply longer than the
/// buffer is only partially consumed; a zero-length read is a valid
/// empty reply and the loop continues.
async fn exchange<S>(name: &str, mut stream: S) -> Result<SessionReport, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut report = SessionReport::new(name);

    for round in 0..ROUNDS {
        let line = format!("{}\n", request_payload(name, round));
        stream
            .write_all(line.as_bytes())
            .await
            .map_err(|e| SessionError::Send { round, source: e })?;
        stream
            .flush()
            .await
            .map_err(|e| SessionError::Send { round, source: e })?;

        // Single read per round, at most REPLY_BUFFER_SIZE bytes
        let mut buf = BytesMut::with_capacity(REPLY_BUFFER_SIZE);
        let n = stream
            .read_buf(&mut buf)
            .await
            .map_err(|e| SessionError::Recv { round, source: e })?;

        if n == 0 {
            info!(client = name, round, "Read zero bytes");
            report.replies.push(Reply::Empty);
        } else {
            let text = String::from_utf8_lossy(&buf[..n]).into_owned();
            info!(client = name, round, reply = %text, "Reply received");
            report.replies.push(Reply::Text(text));
        }
        report.rounds += 1;

        time::sleep(PACING_DELAY).await;
    }

    Ok(report)
}
