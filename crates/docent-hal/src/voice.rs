//! Generic `Voice` trait for spoken output.

use async_trait::async_trait;
use docent_types::TourError;

#[async_trait]
pub trait Voice: Send + Sync {
    /// Speak `text`, returning once the utterance has been delivered.
    async fn say(&self, text: &str) -> Result<(), TourError>;
}
