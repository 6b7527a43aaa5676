//! TCP accept loop and per-connection command workers.
//!
//! Binds to `127.0.0.1` only — the control channel is deliberately not
//! reachable from other hosts. Requests and replies are single lines
//! framed by `\n`; a worker accumulates reads until it sees the
//! terminator, bounded by [`MAX_LINE_BYTES`].

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::supervisor::dispatcher::{Dispatcher, Reply};
use crate::{DaemonError, Result};

/// Upper bound for one incoming command line, terminator included.
pub const MAX_LINE_BYTES: u64 = 64 * 1024;

/// Bind the loopback listener with address reuse enabled.
///
/// Pass port `0` to let the OS pick an ephemeral port (used by tests);
/// read it back from `listener.local_addr()`.
///
/// # Errors
///
/// Returns `DaemonError::Config` if the socket cannot be created or the
/// port cannot be bound.
pub fn bind(port: u16) -> Result<TcpListener> {
    let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port));

    let socket = TcpSocket::new_v4()
        .map_err(|err| DaemonError::Config(format!("failed to create socket: {err}")))?;
    socket
        .set_reuseaddr(true)
        .map_err(|err| DaemonError::Config(format!("failed to set SO_REUSEADDR: {err}")))?;
    socket
        .bind(addr)
        .map_err(|err| DaemonError::Config(format!("failed to bind {addr}: {err}")))?;
    socket
        .listen(128)
        .map_err(|err| DaemonError::Config(format!("failed to listen on {addr}: {err}")))
}

/// Spawn the accept loop.
///
/// Each accepted connection gets its own worker task. The loop exits when
/// the cancellation token fires; live workers are severed with it rather
/// than drained.
pub fn spawn_server(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "control server listening");
        }

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("control server shutting down");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            debug!(%peer, "client connected");
                            let dispatcher = Arc::clone(&dispatcher);
                            tokio::spawn(handle_connection(stream, dispatcher));
                        }
                        Err(err) => {
                            warn!(%err, "accept failed");
                        }
                    }
                }
            }
        }
    })
}

/// Serve one client connection until it closes or errors.
async fn handle_connection(stream: TcpStream, dispatcher: Arc<Dispatcher>) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half).take(MAX_LINE_BYTES);
    let mut buf: Vec<u8> = Vec::new();

    loop {
        buf.clear();
        reader.set_limit(MAX_LINE_BYTES);

        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break, // peer closed
            Ok(_) => {
                if !buf.ends_with(b"\n") {
                    if reader.limit() == 0 {
                        // Line exceeded the bound; framing is unrecoverable.
                        let reply = Reply::err(
                            "unknown",
                            format!("Parsing error: command line exceeds {MAX_LINE_BYTES} bytes"),
                        );
                        let _ = write_line(&mut write_half, &reply.to_line()).await;
                    }
                    // Otherwise the peer closed mid-line; nothing to answer.
                    break;
                }

                let line = String::from_utf8_lossy(&buf);
                let reply = dispatcher.execute(&line).await;
                if let Err(err) = write_line(&mut write_half, &reply.to_line()).await {
                    debug!(%err, "reply write failed");
                    break;
                }
            }
            Err(err) => {
                debug!(%err, "read failed");
                break;
            }
        }
    }

    debug!("client disconnected");
}

async fn write_line(
    writer: &mut (impl AsyncWriteExt + Unpin),
    line: &str,
) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await
}
