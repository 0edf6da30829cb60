use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Exhibit catalog
// ─────────────────────────────────────────────────────────────────────────────

/// A planar pose in the map frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    pub theta: f32,
}

impl Pose {
    pub fn new(x: f32, y: f32, theta: f32) -> Self {
        Self { x, y, theta }
    }
}

/// One exhibit of the museum catalog.
///
/// `id` doubles as the fiducial marker id printed next to the exhibit.  Every
/// piece of spoken narrative lives here so the tour logic never branches on a
/// specific id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ExhibitRecord")]
pub struct Exhibit {
    pub id: u32,
    pub title: String,
    pub pose: Pose,
    /// Introduction delivered once on arrival.
    pub description: String,
    /// Extended narrative for visitors in the high-interest tier.
    pub detailed_description: String,
    /// Spoken when the exhibit is picked as a free target.
    pub announcement: String,
    /// Spoken in the high-interest tier after a question has been answered.
    pub follow_up: String,
    /// Grounding facts handed to the dialogue model.
    pub facts: Vec<String>,
    pub popularity: f32,
    pub visited: bool,
}

impl Exhibit {
    /// Build an exhibit, rejecting a zero id or a popularity outside `[0, 1]`.
    pub fn new(
        id: u32,
        title: impl Into<String>,
        pose: Pose,
        description: impl Into<String>,
        detailed_description: impl Into<String>,
        popularity: f32,
    ) -> Result<Self, TourError> {
        if id == 0 {
            return Err(TourError::InvalidExhibit(
                "exhibit id must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&popularity) {
            return Err(TourError::InvalidExhibit(format!(
                "popularity {popularity} of exhibit {id} must be between 0.0 and 1.0"
            )));
        }
        let title = title.into();
        Ok(Self {
            id,
            announcement: format!("The {title} exhibit is free. Follow me!"),
            follow_up: format!("Anything else you want to know about {title}?"),
            title,
            pose,
            description: description.into(),
            detailed_description: detailed_description.into(),
            facts: Vec::new(),
            popularity,
            visited: false,
        })
    }

    pub fn with_facts<I, S>(mut self, facts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.facts = facts.into_iter().map(Into::into).collect();
        self
    }
}

/// Unvalidated on-disk shape of an [`Exhibit`].
#[derive(Debug, Deserialize)]
struct ExhibitRecord {
    id: u32,
    title: String,
    #[serde(default)]
    pose: Pose,
    description: String,
    #[serde(default)]
    detailed_description: String,
    #[serde(default)]
    announcement: Option<String>,
    #[serde(default)]
    follow_up: Option<String>,
    #[serde(default)]
    facts: Vec<String>,
    #[serde(default)]
    popularity: f32,
}

impl TryFrom<ExhibitRecord> for Exhibit {
    type Error = TourError;

    fn try_from(r: ExhibitRecord) -> Result<Self, Self::Error> {
        let mut exhibit = Exhibit::new(
            r.id,
            r.title,
            r.pose,
            r.description,
            r.detailed_description,
            r.popularity,
        )?
        .with_facts(r.facts);
        if let Some(a) = r.announcement {
            exhibit.announcement = a;
        }
        if let Some(f) = r.follow_up {
            exhibit.follow_up = f;
        }
        Ok(exhibit)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Perception data
// ─────────────────────────────────────────────────────────────────────────────

/// Head joints the sensor sweep can point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeadAxis {
    Yaw,
    Pitch,
}

/// A raw fiducial-marker sighting relative to the camera's optical axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerSighting {
    pub mark_id: u32,
    /// Horizontal offset from the image centre (rad).
    pub alpha: f32,
    /// Vertical offset from the image centre (rad).
    pub beta: f32,
    /// Apparent angular width (rad).
    pub width: f32,
    /// Apparent angular height (rad).
    pub height: f32,
}

/// A marker located relative to the robot's body heading.
///
/// Created and consumed within one scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionCandidate {
    pub mark_id: u32,
    pub bearing: f32,
    pub elevation: f32,
    pub apparent_width: f32,
    pub apparent_height: f32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Occupancy
// ─────────────────────────────────────────────────────────────────────────────

/// Per-exhibit occupancy in catalog order, `'1'` occupied and `'0'` free.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OccupancyState {
    slots: Vec<bool>,
}

impl OccupancyState {
    /// No information: every exhibit reads as free.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a `'0'`/`'1'` string.  Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`TourError::ProtocolFailure`] on any other symbol.
    pub fn parse(raw: &str) -> Result<Self, TourError> {
        let slots = raw
            .trim()
            .chars()
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                other => Err(TourError::ProtocolFailure(format!(
                    "unexpected occupancy symbol {other:?} in {raw:?}"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { slots })
    }

    /// `true` only when `index` is covered and marked occupied.  Indices past
    /// the end read as free.
    pub fn is_occupied(&self, index: usize) -> bool {
        self.slots.get(index).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl fmt::Display for OccupancyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for occupied in &self.slots {
            f.write_str(if *occupied { "1" } else { "0" })?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Attention
// ─────────────────────────────────────────────────────────────────────────────

/// One timestamped engagement reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttentionSample {
    pub timestamp: DateTime<Utc>,
    pub valence: f32,
    pub attention: f32,
}

impl AttentionSample {
    pub fn now(valence: f32, attention: f32) -> Self {
        Self {
            timestamp: Utc::now(),
            valence,
            attention,
        }
    }
}

/// Response tier picked from the latest attention reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttentionTier {
    /// `attention >= 0.7`
    HighInterest,
    /// `0.4 <= attention < 0.7`
    Neutral,
    /// `attention < 0.4`
    LowInterest,
    /// No reading available yet.
    NeutralDefault,
}

impl AttentionTier {
    pub const HIGH_THRESHOLD: f32 = 0.7;
    pub const NEUTRAL_THRESHOLD: f32 = 0.4;

    pub fn from_attention(attention: Option<f32>) -> Self {
        match attention {
            None => AttentionTier::NeutralDefault,
            Some(a) if a >= Self::HIGH_THRESHOLD => AttentionTier::HighInterest,
            Some(a) if a >= Self::NEUTRAL_THRESHOLD => AttentionTier::Neutral,
            Some(_) => AttentionTier::LowInterest,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Interaction and session outcomes
// ─────────────────────────────────────────────────────────────────────────────

/// How an exhibit interaction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitSignal {
    /// Visitor asked to end the whole visit.
    Stop,
    /// Visitor asked to go to another exhibit.
    MoveOn,
    /// Neither; the interaction deadline passed.
    TimedOut,
}

/// How a tour session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TourOutcome {
    /// Every catalog exhibit was visited.
    Completed,
    /// The visitor ended the visit.
    Stopped,
    /// Too many consecutive sweeps found no marker.
    Abandoned,
}

/// End-of-session record persisted to the tour journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TourSummary {
    pub session_id: Uuid,
    pub visited: Vec<u32>,
    pub outcome: TourOutcome,
    pub attention_samples: usize,
    pub finished_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Error taxonomy shared by every docent crate.
///
/// Only [`TourError::ActuationFailure`] ever escapes the tour controller; all
/// other kinds degrade to a fail-open default where they occur.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TourError {
    #[error("Perception unavailable: {0}")]
    PerceptionUnavailable(String),

    #[error("Actuation failure on {component}: {details}")]
    ActuationFailure { component: String, details: String },

    #[error("Transcription failure: {0}")]
    TranscriptionFailure(String),

    #[error("Protocol failure: {0}")]
    ProtocolFailure(String),

    #[error("Dialogue failure: {0}")]
    DialogueFailure(String),

    #[error("Invalid approach geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid exhibit: {0}")]
    InvalidExhibit(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TourError {
    pub fn actuation(component: impl Into<String>, details: impl Into<String>) -> Self {
        TourError::ActuationFailure {
            component: component.into(),
            details: details.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exhibit(id: u32, popularity: f32) -> Result<Exhibit, TourError> {
        Exhibit::new(id, "Water Lilies", Pose::default(), "intro", "more", popularity)
    }

    #[test]
    fn exhibit_rejects_zero_id() {
        let err = exhibit(0, 0.5).unwrap_err();
        assert!(matches!(err, TourError::InvalidExhibit(_)));
    }

    #[test]
    fn exhibit_rejects_popularity_out_of_range() {
        assert!(exhibit(84, 1.5).is_err());
        assert!(exhibit(84, -0.1).is_err());
        assert!(exhibit(84, 0.0).is_ok());
        assert!(exhibit(84, 1.0).is_ok());
    }

    #[test]
    fn exhibit_defaults_narrative_from_title() {
        let e = exhibit(84, 0.3).unwrap();
        assert!(e.announcement.contains("Water Lilies"));
        assert!(e.follow_up.contains("Water Lilies"));
        assert!(!e.visited);
    }

    #[test]
    fn exhibit_deserialization_validates() {
        let ok: Exhibit = serde_json::from_str(
            r#"{"id": 80, "title": "The Starry Night", "description": "intro",
                "announcement": "Van Gogh is free!", "facts": ["1889"]}"#,
        )
        .unwrap();
        assert_eq!(ok.id, 80);
        assert_eq!(ok.announcement, "Van Gogh is free!");
        assert_eq!(ok.facts, vec!["1889".to_string()]);

        let bad = serde_json::from_str::<Exhibit>(
            r#"{"id": 80, "title": "x", "description": "y", "popularity": 2.0}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn occupancy_parse_and_lookup() {
        let occ = OccupancyState::parse("01\n").unwrap();
        assert_eq!(occ.len(), 2);
        assert!(!occ.is_occupied(0));
        assert!(occ.is_occupied(1));
        assert_eq!(occ.to_string(), "01");
    }

    #[test]
    fn occupancy_short_string_reads_free() {
        let occ = OccupancyState::parse("1").unwrap();
        assert!(occ.is_occupied(0));
        assert!(!occ.is_occupied(1));
        assert!(!OccupancyState::empty().is_occupied(0));
    }

    #[test]
    fn occupancy_rejects_garbage() {
        let err = OccupancyState::parse("0x1").unwrap_err();
        assert!(matches!(err, TourError::ProtocolFailure(_)));
    }

    #[test]
    fn attention_tier_thresholds() {
        assert_eq!(AttentionTier::from_attention(Some(0.75)), AttentionTier::HighInterest);
        assert_eq!(AttentionTier::from_attention(Some(0.7)), AttentionTier::HighInterest);
        assert_eq!(AttentionTier::from_attention(Some(0.55)), AttentionTier::Neutral);
        assert_eq!(AttentionTier::from_attention(Some(0.4)), AttentionTier::Neutral);
        assert_eq!(AttentionTier::from_attention(Some(0.1)), AttentionTier::LowInterest);
        assert_eq!(AttentionTier::from_attention(None), AttentionTier::NeutralDefault);
    }

    #[test]
    fn tour_summary_roundtrip() {
        let summary = TourSummary {
            session_id: Uuid::new_v4(),
            visited: vec![84, 80],
            outcome: TourOutcome::Completed,
            attention_samples: 3,
            finished_at: Utc::now(),
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"completed\""));
        let back: TourSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
    }

    #[test]
    fn tour_error_display() {
        let err = TourError::actuation("head_yaw", "joint overheated");
        assert!(err.to_string().contains("head_yaw"));
        assert!(err.to_string().contains("overheated"));
    }
}
