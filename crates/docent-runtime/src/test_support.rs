//! Scripted doubles for the service seams, shared by the runtime tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use docent_services::{OccupancySource, Transcriber};
use docent_types::{Exhibit, OccupancyState, TourError};
use parking_lot::Mutex;

use crate::dialogue::Dialogue;

/// One scripted transcription result.
#[derive(Debug, Clone)]
pub(crate) enum Heard {
    Text(&'static str),
    Fail,
    /// Never answers.  Also what an exhausted script does.
    Hang,
}

pub(crate) struct ScriptedTranscriber {
    script: Mutex<VecDeque<Heard>>,
}

impl ScriptedTranscriber {
    pub(crate) fn new(script: impl IntoIterator<Item = Heard>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
        }
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self) -> Result<String, TourError> {
        let next = self.script.lock().pop_front().unwrap_or(Heard::Hang);
        match next {
            Heard::Text(t) => Ok(t.to_string()),
            Heard::Fail => Err(TourError::TranscriptionFailure("mic offline".into())),
            Heard::Hang => std::future::pending().await,
        }
    }
}

/// Answers every question and records what it was asked.
#[derive(Default)]
pub(crate) struct RecordingDialogue {
    pub(crate) asked: Mutex<Vec<(String, Option<u32>)>>,
    pub(crate) resets: AtomicUsize,
}

impl RecordingDialogue {
    pub(crate) fn answer_for(utterance: &str) -> String {
        format!("Here is what I know about '{utterance}'.")
    }
}

#[async_trait]
impl Dialogue for RecordingDialogue {
    async fn respond(
        &self,
        utterance: &str,
        exhibit: Option<&Exhibit>,
    ) -> Result<String, TourError> {
        self.asked
            .lock()
            .push((utterance.to_string(), exhibit.map(|e| e.id)));
        Ok(Self::answer_for(utterance))
    }

    async fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

/// Returns the same occupancy result on every query.
pub(crate) struct FixedOccupancy {
    result: Result<OccupancyState, TourError>,
    pub(crate) queries: AtomicUsize,
}

impl FixedOccupancy {
    pub(crate) fn new(raw: &str) -> Self {
        Self {
            result: OccupancyState::parse(raw),
            queries: AtomicUsize::new(0),
        }
    }

    pub(crate) fn unreachable() -> Self {
        Self {
            result: Err(TourError::ProtocolFailure("connection refused".into())),
            queries: AtomicUsize::new(0),
        }
    }

    pub(crate) fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OccupancySource for FixedOccupancy {
    async fn query(&self) -> Result<OccupancyState, TourError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}
