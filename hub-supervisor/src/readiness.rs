//! Readiness probes. Both are unbounded on their own; the caller races them
//! against the per-process timeout.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::process::ChildStdout;
use tokio::sync::oneshot;

const CONNECT_ATTEMPT: Duration = Duration::from_secs(1);

/// Resolve once a TCP connection to `host:port` succeeds.
pub(crate) async fn tcp(host: &str, port: u16, interval: Duration) {
    loop {
        let attempt = tokio::time::timeout(CONNECT_ATTEMPT, TcpStream::connect((host, port))).await;
        if matches!(attempt, Ok(Ok(_))) {
            return;
        }
        tokio::time::sleep(interval).await;
    }
}

/// Drain `stdout` into debug logs until EOF. The receiver fires on the first
/// line containing `pattern`; with no pattern it never fires. Lines are
/// decoded lossily so non-UTF-8 output never closes the pipe early.
pub(crate) fn forward_stdout(
    unit: String,
    stdout: ChildStdout,
    pattern: Option<String>,
) -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let mut tx = Some(tx);
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']);
                    tracing::debug!(unit = %unit, line = %line, "child stdout");
                    let matched = pattern.as_deref().is_some_and(|p| line.contains(p));
                    if matched {
                        if let Some(tx) = tx.take() {
                            let _ = tx.send(());
                        }
                    }
                }
                Err(err) => {
                    tracing::debug!(unit = %unit, error = %err, "child stdout closed");
                    break;
                }
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tcp_probe_resolves_against_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let port = listener.local_addr().expect("addr").port();
        tokio::time::timeout(
            Duration::from_secs(2),
            tcp("127.0.0.1", port, Duration::from_millis(10)),
        )
        .await
        .expect("probe should connect");
    }

    #[tokio::test]
    async fn tcp_probe_keeps_polling_closed_port() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
            listener.local_addr().expect("addr").port()
        };
        let probe = tokio::time::timeout(
            Duration::from_millis(150),
            tcp("127.0.0.1", port, Duration::from_millis(10)),
        )
        .await;
        assert!(probe.is_err(), "nothing listens, probe must not resolve");
    }
}
