//! [`Dialogue`] seam and [`LlmDialogue`] – answers to visitor questions.
//!
//! `LlmDialogue` talks to a locally-running llama.cpp-compatible server
//! exposing a `/completion` endpoint.  The prompt is a fixed set of guide
//! behaviour rules, the current exhibit's facts, the last few exchanges, and
//! the new question.
//!
//! # Example
//!
//! ```rust,no_run
//! use docent_runtime::dialogue::{DialogueConfig, LlmDialogue};
//!
//! let dialogue = LlmDialogue::new(DialogueConfig {
//!     url: "http://localhost:8080/completion".into(),
//!     ..DialogueConfig::default()
//! });
//! // Requires a running model server – skipped in unit tests.
//! // let reply = dialogue.respond("When was it painted?", None).await;
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use docent_types::{Exhibit, TourError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::Catalog;

/// Reply used when the model server cannot be reached.
pub const UNAVAILABLE_REPLY: &str =
    "I'm sorry, I'm having trouble processing your request right now.";

/// Reply used when the model answered with something unusable.
pub const MALFORMED_REPLY: &str = "I'm sorry, I couldn't process your request properly.";

const GUIDE_RULES: &str = "\
You are a museum guide robot interacting with a human visitor.

Behavior Rules:
- Only respond with information about the artwork listed below.
- Do NOT mention any artworks, locations, or artists not listed.
- Do NOT create anything fictional or speculate.
- Answer directly and concisely. Keep it factual and on-topic.
- Use a neutral, professional tone - avoid overly friendly or emotional responses.
- Do NOT say \"Guide:\" or narrate your own actions.
- Do NOT greet or say goodbye unless specifically asked.
- Respond with plain text and form a paragraph.
- Do NOT use special/unicode characters in your response.
";

// ─────────────────────────────────────────────────────────────────────────────
// Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Produces an answer to a visitor utterance about an exhibit.
#[async_trait]
pub trait Dialogue: Send + Sync {
    /// # Errors
    ///
    /// [`TourError::DialogueFailure`] when no answer could be produced.
    async fn respond(&self, utterance: &str, exhibit: Option<&Exhibit>)
    -> Result<String, TourError>;

    /// Forget previous exchanges.  Called when a new exhibit begins.
    async fn reset(&self) {}
}

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum DialogueError {
    /// The HTTP request to the model server failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The model server answered without usable content.
    #[error("Unexpected response format: {0}")]
    BadResponse(String),
}

impl From<DialogueError> for TourError {
    fn from(e: DialogueError) -> Self {
        TourError::DialogueFailure(e.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    n_predict: u32,
    temperature: f32,
    top_k: u32,
    top_p: f32,
    stop: [&'static str; 2],
}

#[derive(Deserialize)]
struct CompletionResponse {
    content: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// LlmDialogue
// ─────────────────────────────────────────────────────────────────────────────

/// Sampling parameters and endpoint of the model server.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueConfig {
    pub url: String,
    pub n_predict: u32,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub timeout: Duration,
    /// Question/answer pairs kept for the prompt.
    pub max_history: usize,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/completion".to_string(),
            n_predict: 250,
            temperature: 0.7,
            top_k: 10,
            top_p: 0.8,
            timeout: Duration::from_secs(30),
            max_history: 5,
        }
    }
}

/// Async client for a llama.cpp `/completion` endpoint.
///
/// Construct once per session; the conversation history lives inside.
pub struct LlmDialogue {
    config: DialogueConfig,
    client: reqwest::Client,
    catalog_facts: String,
    history: Mutex<VecDeque<(String, String)>>,
}

impl LlmDialogue {
    pub fn new(config: DialogueConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self {
            config,
            client,
            catalog_facts: String::new(),
            history: Mutex::new(VecDeque::new()),
        }
    }

    /// Facts of every catalog exhibit, used when a question arrives with no
    /// exhibit in context.
    pub fn with_catalog(mut self, catalog: &Catalog) -> Self {
        self.catalog_facts = catalog
            .iter()
            .map(exhibit_facts)
            .collect::<Vec<_>>()
            .join("\n");
        self
    }

    /// Number of exchanges currently remembered.
    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    /// Assemble the full prompt for `utterance`.
    pub fn build_prompt(&self, utterance: &str, exhibit: Option<&Exhibit>) -> String {
        let mut prompt = String::from(GUIDE_RULES);
        prompt.push('\n');
        match exhibit {
            Some(e) => prompt.push_str(&exhibit_facts(e)),
            None => prompt.push_str(&self.catalog_facts),
        }
        for (question, answer) in self.history.lock().iter() {
            prompt.push_str(&format!("\nVisitor: {question}\nGuide: {answer}"));
        }
        prompt.push_str(&format!("\n\nVisitor: {utterance}\nGuide:"));
        prompt
    }

    fn remember(&self, question: &str, answer: &str) {
        let mut history = self.history.lock();
        history.push_back((question.to_string(), answer.to_string()));
        while history.len() > self.config.max_history {
            history.pop_front();
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, DialogueError> {
        let body = CompletionRequest {
            prompt,
            n_predict: self.config.n_predict,
            temperature: self.config.temperature,
            top_k: self.config.top_k,
            top_p: self.config.top_p,
            stop: ["\nVisitor:", "\n\nVisitor:"],
        };
        let response: CompletionResponse = self
            .client
            .post(&self.config.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        response
            .content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| DialogueError::BadResponse("missing content".into()))
    }
}

#[async_trait]
impl Dialogue for LlmDialogue {
    /// Never fails: transport and format problems turn into a spoken apology.
    async fn respond(
        &self,
        utterance: &str,
        exhibit: Option<&Exhibit>,
    ) -> Result<String, TourError> {
        let prompt = self.build_prompt(utterance, exhibit);
        match self.complete(&prompt).await {
            Ok(answer) => {
                debug!(chars = answer.len(), "dialogue answer received");
                self.remember(utterance, &answer);
                Ok(answer)
            }
            Err(DialogueError::BadResponse(reason)) => {
                warn!(%reason, "dialogue model returned no usable content");
                Ok(MALFORMED_REPLY.to_string())
            }
            Err(e) => {
                warn!(error = %e, "dialogue model unreachable");
                Ok(UNAVAILABLE_REPLY.to_string())
            }
        }
    }

    async fn reset(&self) {
        self.history.lock().clear();
    }
}

fn exhibit_facts(exhibit: &Exhibit) -> String {
    let mut block = format!("Exhibit: *{}*\n", exhibit.title);
    for fact in &exhibit.facts {
        block.push_str("- ");
        block.push_str(fact);
        block.push('\n');
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn dialogue(url: String) -> LlmDialogue {
        LlmDialogue::new(DialogueConfig {
            url,
            timeout: Duration::from_secs(2),
            ..DialogueConfig::default()
        })
    }

    /// One-shot HTTP server answering with `body` as JSON.
    async fn model_server(body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_request(&mut stream).await;
            let reply = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(reply.as_bytes()).await.unwrap();
        });
        format!("http://{addr}/completion")
    }

    /// Consume headers and a `content-length` body.
    async fn read_request(stream: &mut tokio::net::TcpStream) {
        let mut raw = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            raw.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&raw);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if raw.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    #[test]
    fn prompt_contains_rules_facts_and_question() {
        let catalog = Catalog::museum_default();
        let d = dialogue("http://unused".into()).with_catalog(&catalog);
        let prompt = d.build_prompt("When was it painted?", catalog.get(80));
        assert!(prompt.starts_with("You are a museum guide robot"));
        assert!(prompt.contains("The Starry Night"));
        assert!(prompt.contains("Painted in June 1889"));
        assert!(!prompt.contains("Giverny"));
        assert!(prompt.ends_with("Visitor: When was it painted?\nGuide:"));
    }

    #[test]
    fn prompt_without_exhibit_uses_whole_catalog() {
        let catalog = Catalog::museum_default();
        let d = dialogue("http://unused".into()).with_catalog(&catalog);
        let prompt = d.build_prompt("What is here?", None);
        assert!(prompt.contains("Water Lilies"));
        assert!(prompt.contains("The Starry Night"));
    }

    #[test]
    fn history_is_capped() {
        let d = dialogue("http://unused".into());
        for i in 0..8 {
            d.remember(&format!("q{i}"), &format!("a{i}"));
        }
        assert_eq!(d.history_len(), 5);
        let prompt = d.build_prompt("next", None);
        assert!(!prompt.contains("q2"));
        assert!(prompt.contains("Visitor: q3\nGuide: a3"));
    }

    #[tokio::test]
    async fn answer_is_trimmed_and_remembered() {
        let url = model_server(r#"{"content": "  It was painted in 1889.\n"}"#).await;
        let d = dialogue(url);
        let answer = d.respond("When?", None).await.unwrap();
        assert_eq!(answer, "It was painted in 1889.");
        assert_eq!(d.history_len(), 1);

        d.reset().await;
        assert_eq!(d.history_len(), 0);
    }

    #[tokio::test]
    async fn missing_content_degrades_to_apology() {
        let url = model_server(r#"{"error": "overloaded"}"#).await;
        let answer = dialogue(url).respond("When?", None).await.unwrap();
        assert_eq!(answer, MALFORMED_REPLY);
    }

    #[tokio::test]
    async fn unreachable_server_degrades_to_apology() {
        let addr = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap()
        };
        let d = dialogue(format!("http://{addr}/completion"));
        assert_eq!(d.respond("When?", None).await.unwrap(), UNAVAILABLE_REPLY);
        assert_eq!(d.history_len(), 0);
    }
}
