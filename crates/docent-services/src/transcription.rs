//! Transcription query protocol.
//!
//! Each connection asks for one utterance: the server records a fixed-length
//! clip, runs speech-to-text, writes the UTF-8 transcript and closes.  Every
//! accepted connection gets its own handler task, so a slow recognition never
//! blocks the next client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docent_types::TourError;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::wire;

/// Reply sent by the server when recognition fails.  Clients map it back to
/// [`TourError::TranscriptionFailure`].
pub const AUDIO_ERROR_REPLY: &str = "Error processing audio";

const MAX_PAYLOAD: usize = 4096;

// ─────────────────────────────────────────────────────────────────────────────
// Client side
// ─────────────────────────────────────────────────────────────────────────────

/// Source of visitor utterances for the interaction loop.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Block until the next utterance is available and return it trimmed.
    ///
    /// # Errors
    ///
    /// [`TourError::TranscriptionFailure`] on network or recognition failure,
    /// [`TourError::ProtocolFailure`] on a payload that is not UTF-8.
    async fn transcribe(&self) -> Result<String, TourError>;
}

/// TCP client for the transcription service.
#[derive(Debug, Clone)]
pub struct TranscriptionClient {
    addr: String,
    timeout: Duration,
}

impl TranscriptionClient {
    /// The default timeout covers the recording window plus recognition.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Transcriber for TranscriptionClient {
    async fn transcribe(&self) -> Result<String, TourError> {
        let payload = wire::fetch(&self.addr, self.timeout, MAX_PAYLOAD)
            .await
            .map_err(|e| TourError::TranscriptionFailure(format!("transcription query failed: {e}")))?;
        let text = String::from_utf8(payload).map_err(|e| {
            TourError::ProtocolFailure(format!("transcript is not valid UTF-8: {e}"))
        })?;
        let text = text.trim();
        if text == AUDIO_ERROR_REPLY {
            return Err(TourError::TranscriptionFailure(
                "service could not process audio".to_string(),
            ));
        }
        info!(transcript = %text, "transcript received");
        Ok(text.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server side
// ─────────────────────────────────────────────────────────────────────────────

/// Records one utterance and turns it into text (microphone + speech model on
/// a real deployment).
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn recognize(&self) -> Result<String, TourError>;
}

/// Accept loop serving transcripts, one handler task per connection.
pub struct TranscriptionServer {
    listener: TcpListener,
    recognizer: Arc<dyn SpeechRecognizer>,
}

impl TranscriptionServer {
    /// Bind to `addr` (e.g. `"0.0.0.0:5002"` or `"127.0.0.1:0"`).
    ///
    /// # Errors
    ///
    /// [`TourError::Config`] if the address cannot be bound.
    pub async fn bind(
        addr: &str,
        recognizer: Arc<dyn SpeechRecognizer>,
    ) -> Result<Self, TourError> {
        Ok(Self {
            listener: wire::bind(addr).await?,
            recognizer,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TourError> {
        self.listener
            .local_addr()
            .map_err(|e| TourError::Config(format!("listener has no local address: {e}")))
    }

    /// Serve until `shutdown` is set to `true` or its sender is dropped.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let recognizer = self.recognizer;
        let handler = Arc::new(move |stream: TcpStream, peer: SocketAddr| {
            let recognizer = Arc::clone(&recognizer);
            async move { serve_one_transcription(stream, peer, recognizer.as_ref()).await }
        });
        wire::accept_loop("transcription", self.listener, shutdown, handler).await;
    }
}

/// Answer a single transcription connection.
pub async fn serve_one_transcription(
    stream: TcpStream,
    peer: SocketAddr,
    recognizer: &dyn SpeechRecognizer,
) {
    let reply = match recognizer.recognize().await {
        Ok(text) => {
            info!(%peer, transcript = %text, "transcript sent");
            text
        }
        Err(e) => {
            warn!(%peer, error = %e, "recognition failed");
            AUDIO_ERROR_REPLY.to_string()
        }
    };
    if let Err(e) = wire::reply(stream, reply.as_bytes()).await {
        warn!(%peer, error = %e, "transcription reply failed");
    }
}
