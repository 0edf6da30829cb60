//! Shared plumbing for the connect-read-close protocol.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use docent_types::TourError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Connect to `addr` and read the whole reply until the peer closes.
///
/// A reply longer than `max_len` bytes is rejected with
/// [`std::io::ErrorKind::InvalidData`] rather than cut short.
pub(crate) async fn fetch(
    addr: &str,
    timeout: Duration,
    max_len: usize,
) -> Result<Vec<u8>, std::io::Error> {
    let exchange = async {
        let stream = TcpStream::connect(addr).await?;
        let mut reader = stream.take(max_len as u64 + 1);
        let mut payload = Vec::new();
        reader.read_to_end(&mut payload).await?;
        if payload.len() > max_len {
            warn!(%addr, max_len, "reply over the size limit; discarding");
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("reply from {addr} exceeds {max_len} bytes"),
            ));
        }
        Ok::<_, std::io::Error>(payload)
    };
    match tokio::time::timeout(timeout, exchange).await {
        Ok(result) => result,
        Err(_) => Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("no reply from {addr} within {timeout:?}"),
        )),
    }
}

/// Bind a listener, mapping the error into the tour taxonomy.
pub(crate) async fn bind(addr: &str) -> Result<TcpListener, TourError> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| TourError::Config(format!("cannot bind {addr}: {e}")))
}

/// Accept connections until `shutdown` flips to `true`, running `handler`
/// as its own task for every accepted stream.
pub(crate) async fn accept_loop<H, F>(
    service: &'static str,
    listener: TcpListener,
    mut shutdown: watch::Receiver<bool>,
    handler: Arc<H>,
) where
    H: Fn(TcpStream, SocketAddr) -> F + Send + Sync + 'static,
    F: std::future::Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(service, %addr, "listening");
    }
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!(service, "shutdown");
                    return;
                }
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!(service, %peer, "connection accepted");
                        let handler = Arc::clone(&handler);
                        tokio::spawn(async move { handler(stream, peer).await });
                    }
                    Err(e) => error!(service, error = %e, "accept failed"),
                }
            }
        }
    }
}

/// Write `payload` (if any) and close the write half.
pub(crate) async fn reply(mut stream: TcpStream, payload: &[u8]) -> std::io::Result<()> {
    if !payload.is_empty() {
        stream.write_all(payload).await?;
    }
    stream.shutdown().await
}
