//! Console stand-ins for the robot's speaker and the visitor's microphone.
//!
//! `docent tour` prints what the robot says; `docent serve` lets an operator
//! type what the visitor says and hands it out as the transcript.

use async_trait::async_trait;
use colored::Colorize;
use docent_hal::Voice;
use docent_services::SpeechRecognizer;
use docent_types::TourError;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

/// Prints every utterance to stdout.
#[derive(Debug, Default)]
pub struct ConsoleVoice;

#[async_trait]
impl Voice for ConsoleVoice {
    async fn say(&self, text: &str) -> Result<(), TourError> {
        println!("  {} {}", "robot>".bold().cyan(), text);
        Ok(())
    }
}

/// Transcripts typed by an operator, one line per utterance.
pub struct OperatorRecognizer {
    lines: Mutex<mpsc::Receiver<String>>,
}

impl OperatorRecognizer {
    pub fn new(lines: mpsc::Receiver<String>) -> Self {
        Self {
            lines: Mutex::new(lines),
        }
    }

    /// Feed the recognizer from stdin on a background task.
    pub fn from_stdin() -> Self {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            debug!("operator input closed");
        });
        Self::new(rx)
    }
}

#[async_trait]
impl SpeechRecognizer for OperatorRecognizer {
    async fn recognize(&self) -> Result<String, TourError> {
        println!("  {} ", "visitor is speaking, type the transcript:".yellow());
        self.lines
            .lock()
            .await
            .recv()
            .await
            .map(|line| line.trim().to_string())
            .ok_or_else(|| TourError::TranscriptionFailure("operator input closed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn typed_lines_become_transcripts_in_order() {
        let (tx, rx) = mpsc::channel(4);
        let recognizer = OperatorRecognizer::new(rx);
        tx.send("  who painted this? ".to_string()).await.unwrap();
        tx.send("move on".to_string()).await.unwrap();

        assert_eq!(recognizer.recognize().await.unwrap(), "who painted this?");
        assert_eq!(recognizer.recognize().await.unwrap(), "move on");
    }

    #[tokio::test]
    async fn closed_input_is_a_transcription_failure() {
        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        let recognizer = OperatorRecognizer::new(rx);
        assert!(matches!(
            recognizer.recognize().await,
            Err(TourError::TranscriptionFailure(_))
        ));
    }

    #[tokio::test]
    async fn console_voice_never_fails() {
        assert!(ConsoleVoice.say("Follow me!").await.is_ok());
    }
}
