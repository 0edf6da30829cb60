//! Occupancy query protocol.
//!
//! The server answers every connection with one occupancy string, one
//! `'0'`/`'1'` symbol per exhibit in catalog order, then closes.  When the
//! detector has nothing to report the connection is closed without a
//! payload, which the client reads as "no information".

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docent_types::{OccupancyState, TourError};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::wire;

/// Occupancy payloads are a handful of bytes; anything longer is cut here.
const MAX_PAYLOAD: usize = 1024;

// ─────────────────────────────────────────────────────────────────────────────
// Client side
// ─────────────────────────────────────────────────────────────────────────────

/// Where the tour controller gets its per-iteration occupancy refresh.
#[async_trait]
pub trait OccupancySource: Send + Sync {
    /// Fetch the current occupancy.
    ///
    /// # Errors
    ///
    /// [`TourError::ProtocolFailure`] when the service cannot be reached or
    /// the payload is malformed.  Callers fall back to
    /// [`OccupancyState::empty`].
    async fn query(&self) -> Result<OccupancyState, TourError>;
}

/// TCP client for the occupancy service.
#[derive(Debug, Clone)]
pub struct OccupancyClient {
    addr: String,
    timeout: Duration,
}

impl OccupancyClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl OccupancySource for OccupancyClient {
    async fn query(&self) -> Result<OccupancyState, TourError> {
        let payload = wire::fetch(&self.addr, self.timeout, MAX_PAYLOAD)
            .await
            .map_err(|e| TourError::ProtocolFailure(format!("occupancy query failed: {e}")))?;
        let text = std::str::from_utf8(&payload).map_err(|e| {
            TourError::ProtocolFailure(format!("occupancy payload is not ASCII: {e}"))
        })?;
        let state = OccupancyState::parse(text)?;
        info!(occupancy = %state, "occupancy received");
        Ok(state)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server side
// ─────────────────────────────────────────────────────────────────────────────

/// Produces an occupancy reading on demand (camera + person detector on a
/// real deployment).
#[async_trait]
pub trait OccupancyDetector: Send + Sync {
    async fn detect(&self) -> Result<OccupancyState, TourError>;
}

/// A detector that always reports the same state.
#[async_trait]
impl OccupancyDetector for OccupancyState {
    async fn detect(&self) -> Result<OccupancyState, TourError> {
        Ok(self.clone())
    }
}

/// Accept loop serving occupancy readings, one handler task per connection.
pub struct OccupancyServer {
    listener: TcpListener,
    detector: Arc<dyn OccupancyDetector>,
}

impl OccupancyServer {
    /// Bind to `addr` (e.g. `"0.0.0.0:5001"` or `"127.0.0.1:0"`).
    ///
    /// # Errors
    ///
    /// [`TourError::Config`] if the address cannot be bound.
    pub async fn bind(addr: &str, detector: Arc<dyn OccupancyDetector>) -> Result<Self, TourError> {
        Ok(Self {
            listener: wire::bind(addr).await?,
            detector,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TourError> {
        self.listener
            .local_addr()
            .map_err(|e| TourError::Config(format!("listener has no local address: {e}")))
    }

    /// Serve until `shutdown` is set to `true` or its sender is dropped.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let detector = self.detector;
        let handler = Arc::new(move |stream: TcpStream, peer: SocketAddr| {
            let detector = Arc::clone(&detector);
            async move { serve_one_occupancy(stream, peer, detector.as_ref()).await }
        });
        wire::accept_loop("occupancy", self.listener, shutdown, handler).await;
    }
}

/// Answer a single occupancy connection.
pub async fn serve_one_occupancy(
    stream: TcpStream,
    peer: SocketAddr,
    detector: &dyn OccupancyDetector,
) {
    let payload = match detector.detect().await {
        Ok(state) => {
            info!(%peer, occupancy = %state, "occupancy sent");
            state.to_string()
        }
        Err(e) => {
            warn!(%peer, error = %e, "occupancy detection failed; closing without payload");
            String::new()
        }
    };
    if let Err(e) = wire::reply(stream, payload.as_bytes()).await {
        warn!(%peer, error = %e, "occupancy reply failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    struct Broken;

    #[async_trait]
    impl OccupancyDetector for Broken {
        async fn detect(&self) -> Result<OccupancyState, TourError> {
            Err(TourError::PerceptionUnavailable("camera unplugged".into()))
        }
    }

    async fn start(detector: Arc<dyn OccupancyDetector>) -> (String, watch::Sender<bool>) {
        let server = OccupancyServer::bind("127.0.0.1:0", detector).await.unwrap();
        let addr = server.local_addr().unwrap().to_string();
        let (tx, rx) = watch::channel(false);
        tokio::spawn(server.run(rx));
        (addr, tx)
    }

    #[tokio::test]
    async fn client_reads_server_state() {
        let (addr, _stop) = start(Arc::new(OccupancyState::parse("10").unwrap())).await;
        let state = OccupancyClient::new(addr).query().await.unwrap();
        assert!(state.is_occupied(0));
        assert!(!state.is_occupied(1));
    }

    #[tokio::test]
    async fn one_exchange_per_connection_many_connections() {
        let (addr, _stop) = start(Arc::new(OccupancyState::parse("01").unwrap())).await;
        let client = OccupancyClient::new(addr);
        for _ in 0..3 {
            assert_eq!(client.query().await.unwrap().to_string(), "01");
        }
    }

    #[tokio::test]
    async fn detector_failure_reads_as_empty() {
        let (addr, _stop) = start(Arc::new(Broken)).await;
        let state = OccupancyClient::new(addr).query().await.unwrap();
        assert!(state.is_empty());
        assert!(!state.is_occupied(0));
    }

    #[tokio::test]
    async fn malformed_payload_is_protocol_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"busy").await.unwrap();
        });
        let err = OccupancyClient::new(addr).query().await.unwrap_err();
        assert!(matches!(err, TourError::ProtocolFailure(_)));
    }

    #[tokio::test]
    async fn oversized_payload_is_protocol_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            // Well-formed slots, just too many of them.
            let _ = stream.write_all(&vec![b'0'; MAX_PAYLOAD * 2]).await;
        });
        let err = OccupancyClient::new(addr).query().await.unwrap_err();
        match err {
            TourError::ProtocolFailure(msg) => assert!(msg.contains("exceeds")),
            other => panic!("expected protocol failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_service_is_protocol_failure() {
        // Bind then drop to obtain a port nobody listens on.
        let addr = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().to_string()
        };
        let err = OccupancyClient::new(addr)
            .with_timeout(Duration::from_secs(2))
            .query()
            .await
            .unwrap_err();
        assert!(matches!(err, TourError::ProtocolFailure(_)));
    }

    #[tokio::test]
    async fn shutdown_stops_accept_loop() {
        let server = OccupancyServer::bind("127.0.0.1:0", Arc::new(OccupancyState::empty()))
            .await
            .unwrap();
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(server.run(rx));
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("server must stop")
            .unwrap();
    }
}
