//! [`TourController`] – the top-level tour state machine.
//!
//! ```text
//! Idle ─► Homing ─► Scanning ─► Approaching ─► Interacting ─► Routing ─┐
//!                      ▲   │          │             │                  │
//!                      │   └─(nothing)┴─(motion error)┴─► Scanning     │
//!                      └──────────────── continue ◄────────────────────┤
//!                                                         Done ◄───────┘
//! ```
//!
//! The controller owns the [`TourSession`]: catalog with visited flags,
//! the latest occupancy, and the session-wide attention log.  Every
//! failure is handled here by going back to `Scanning`; the session ends
//! only on a visitor `stop`, on completion of the catalog, or after too many
//! consecutive scans that did not reach an exhibit.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn demo(
//! #     robot: docent_runtime::tour::RobotHandles,
//! #     services: docent_runtime::tour::ServiceHandles,
//! # ) {
//! use docent_runtime::{catalog::Catalog, tour::{TourConfig, TourController}};
//!
//! let mut controller =
//!     TourController::new(Catalog::museum_default(), robot, services, TourConfig::default());
//! let summary = controller.run().await;
//! println!("visited {:?}", summary.visited);
//! # }
//! ```

use std::sync::Arc;

use chrono::Utc;
use docent_hal::{Actuation, Perception, Voice};
use docent_memory::{AttentionLog, TourJournal};
use docent_services::{OccupancySource, Transcriber};
use docent_types::{
    DetectionCandidate, ExitSignal, OccupancyState, TourError, TourOutcome, TourSummary,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::approach::{ApproachConfig, approach_marker};
use crate::catalog::Catalog;
use crate::dialogue::Dialogue;
use crate::interaction::{Interaction, InteractionConfig};
use crate::monitor::release;
use crate::phrases::{self, speak};
use crate::scan::{OccupancyScan, ScanConfig, ScanOutcome};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration and handles
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct TourConfig {
    /// In-place turn after arriving, to face the visitor who followed (rad).
    pub face_visitor_turn: f32,
    /// Consecutive scans that may end without reaching an exhibit before the
    /// tour is abandoned.  `None` keeps scanning forever.
    pub max_empty_scans: Option<usize>,
    pub scan: ScanConfig,
    pub approach: ApproachConfig,
    pub interaction: InteractionConfig,
}

impl Default for TourConfig {
    fn default() -> Self {
        Self {
            face_visitor_turn: 2.5,
            max_empty_scans: Some(20),
            scan: ScanConfig::default(),
            approach: ApproachConfig::default(),
            interaction: InteractionConfig::default(),
        }
    }
}

/// The robot's device traits.  One object may implement all three.
#[derive(Clone)]
pub struct RobotHandles {
    pub actuation: Arc<dyn Actuation>,
    pub perception: Arc<dyn Perception>,
    pub voice: Arc<dyn Voice>,
}

impl RobotHandles {
    pub fn from_single<R>(robot: Arc<R>) -> Self
    where
        R: Actuation + Perception + Voice + 'static,
    {
        Self {
            actuation: robot.clone(),
            perception: robot.clone(),
            voice: robot,
        }
    }
}

/// The networked collaborators, injected so tests can script them.
#[derive(Clone)]
pub struct ServiceHandles {
    pub occupancy: Arc<dyn OccupancySource>,
    pub transcriber: Arc<dyn Transcriber>,
    pub dialogue: Arc<dyn Dialogue>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Session state
// ─────────────────────────────────────────────────────────────────────────────

/// Everything one tour accumulates.
#[derive(Debug, Clone)]
pub struct TourSession {
    pub id: Uuid,
    pub catalog: Catalog,
    /// Distinct visited exhibit ids in visiting order.
    pub visited: Vec<u32>,
    pub occupancy: OccupancyState,
    pub attention: AttentionLog,
    pub last_exit: Option<ExitSignal>,
}

impl TourSession {
    fn new(mut catalog: Catalog) -> Self {
        catalog.reset_visits();
        Self {
            id: Uuid::new_v4(),
            catalog,
            visited: Vec::new(),
            occupancy: OccupancyState::empty(),
            attention: AttentionLog::new(),
            last_exit: None,
        }
    }

    fn record_visit(&mut self, id: u32) {
        if self.catalog.mark_visited(id) {
            self.visited.push(id);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TourState {
    Idle,
    Homing,
    Scanning,
    Approaching(DetectionCandidate),
    Interacting(u32),
    Routing(ExitSignal),
    Done(TourOutcome),
}

/// Decision taken after an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Go home, then scan for the next exhibit.
    Continue,
    /// Go home and end the session.
    Finish(TourOutcome),
}

/// Where to go after an interaction that ended with `exit`, given how many
/// distinct exhibits out of `total` have been visited.
pub fn route(exit: ExitSignal, visited: usize, total: usize) -> Route {
    match exit {
        ExitSignal::Stop => Route::Finish(TourOutcome::Stopped),
        ExitSignal::MoveOn if visited >= total => Route::Finish(TourOutcome::Completed),
        ExitSignal::MoveOn | ExitSignal::TimedOut => Route::Continue,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TourController
// ─────────────────────────────────────────────────────────────────────────────

pub struct TourController {
    robot: RobotHandles,
    services: ServiceHandles,
    config: TourConfig,
    scan: OccupancyScan,
    interaction: Interaction,
    session: TourSession,
    journal: Option<TourJournal>,
    empty_scans: usize,
}

impl TourController {
    pub fn new(
        catalog: Catalog,
        robot: RobotHandles,
        services: ServiceHandles,
        config: TourConfig,
    ) -> Self {
        let session = TourSession::new(catalog);
        let scan = OccupancyScan::new(
            Arc::clone(&robot.actuation),
            Arc::clone(&robot.perception),
            config.scan.clone(),
        );
        let interaction = Interaction::new(
            Arc::clone(&robot.actuation),
            Arc::clone(&robot.perception),
            Arc::clone(&robot.voice),
            Arc::clone(&services.transcriber),
            Arc::clone(&services.dialogue),
            session.attention.clone(),
            config.interaction.clone(),
        );
        Self {
            robot,
            services,
            config,
            scan,
            interaction,
            session,
            journal: None,
            empty_scans: 0,
        }
    }

    /// Append the session's attention samples and summary to `journal` when
    /// the tour ends.
    pub fn with_journal(mut self, journal: TourJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn session(&self) -> &TourSession {
        &self.session
    }

    /// Run the tour until it ends and return its summary.
    pub async fn run(&mut self) -> TourSummary {
        info!(session = %self.session.id, exhibits = self.session.catalog.len(), "tour started");
        let mut state = TourState::Idle;
        let outcome = loop {
            debug!(?state, "tour state");
            state = match state {
                TourState::Idle => TourState::Homing,
                TourState::Homing => self.homing().await,
                TourState::Scanning => self.scanning().await,
                TourState::Approaching(candidate) => self.approaching(candidate).await,
                TourState::Interacting(id) => self.interacting(id).await,
                TourState::Routing(exit) => self.routing(exit).await,
                TourState::Done(outcome) => break outcome,
            };
        };
        self.finish(outcome)
    }

    /// End a tour whose [`run`][Self::run] future was dropped part-way, as
    /// if the visitor had said "stop": release the head, say goodbye, go
    /// home, then close the session as [`TourOutcome::Stopped`].
    pub async fn interrupt(&mut self) -> TourSummary {
        warn!(session = %self.session.id, "tour interrupted");
        release(
            self.robot.perception.as_ref(),
            self.robot.actuation.as_ref(),
        )
        .await;
        self.say(phrases::FAREWELL).await;
        self.go_home().await;
        self.finish(TourOutcome::Stopped)
    }

    /// Close the session with `outcome`: log, persist and summarise.
    fn finish(&mut self, outcome: TourOutcome) -> TourSummary {
        let summary = TourSummary {
            session_id: self.session.id,
            visited: self.session.visited.clone(),
            outcome,
            attention_samples: self.session.attention.len(),
            finished_at: Utc::now(),
        };
        if let Some(journal) = &self.journal {
            let persisted = journal
                .append_attention(self.session.id, &self.session.attention.snapshot())
                .and_then(|()| journal.append_summary(&summary));
            if let Err(e) = persisted {
                let e = TourError::from(e);
                error!(error = %e, path = %journal.path().display(), "tour journal not written");
            }
        }
        info!(
            session = %summary.session_id,
            outcome = ?summary.outcome,
            visited = ?summary.visited,
            samples = summary.attention_samples,
            "tour finished"
        );
        summary
    }

    async fn homing(&mut self) -> TourState {
        match self.robot.actuation.learn_home().await {
            Ok(home) => info!(x = home.x, y = home.y, theta = home.theta, "home pose recorded"),
            Err(e) => warn!(error = %e, "home pose could not be learned"),
        }
        self.say(phrases::WELCOME).await;
        TourState::Scanning
    }

    async fn scanning(&mut self) -> TourState {
        self.say(phrases::CHECKING_OCCUPANCY).await;
        self.session.occupancy = match self.services.occupancy.query().await {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "occupancy unavailable; treating every exhibit as free");
                OccupancyState::empty()
            }
        };

        let outcome = self
            .scan
            .scan(&self.session.catalog, &self.session.occupancy)
            .await;
        match outcome {
            Ok(ScanOutcome::Free(candidate)) => {
                if let Some(exhibit) = self.session.catalog.get(candidate.mark_id) {
                    let line = exhibit.announcement.clone();
                    self.say(&line).await;
                }
                TourState::Approaching(candidate)
            }
            Ok(ScanOutcome::AllOccupied(candidate)) => {
                self.say(phrases::ALL_OCCUPIED).await;
                TourState::Approaching(candidate)
            }
            Ok(ScanOutcome::NoDetection) => {
                self.say(phrases::NOTHING_FOUND).await;
                self.fruitless_scan().await
            }
            Err(e) => {
                warn!(error = %e, "scan failed");
                self.fruitless_scan().await
            }
        }
    }

    async fn approaching(&mut self, candidate: DetectionCandidate) -> TourState {
        match approach_marker(
            self.robot.actuation.as_ref(),
            &candidate,
            &self.config.approach,
        )
        .await
        {
            Ok(_) => TourState::Interacting(candidate.mark_id),
            Err(e) => {
                warn!(mark_id = candidate.mark_id, error = %e, "approach failed; scanning again");
                self.fruitless_scan().await
            }
        }
    }

    async fn interacting(&mut self, id: u32) -> TourState {
        let Some(exhibit) = self.session.catalog.get(id).cloned() else {
            warn!(mark_id = id, "exhibit missing from catalog");
            return TourState::Scanning;
        };
        let turned = self.face_visitor().await;
        if let Err(e) = turned {
            warn!(mark_id = id, error = %e, "could not turn to the visitor; scanning again");
            return self.fruitless_scan().await;
        }
        self.empty_scans = 0;

        let report = self.interaction.run(&exhibit).await;
        self.session.record_visit(id);
        self.session.last_exit = Some(report.exit);
        TourState::Routing(report.exit)
    }

    async fn routing(&mut self, exit: ExitSignal) -> TourState {
        let visited = self.session.catalog.visited_count();
        let decision = route(exit, visited, self.session.catalog.len());
        info!(?exit, ?decision, visited, "routing");
        if exit == ExitSignal::Stop {
            self.say(phrases::FAREWELL).await;
        }
        self.go_home().await;
        match decision {
            Route::Continue => TourState::Scanning,
            Route::Finish(TourOutcome::Completed) => {
                self.say(phrases::TOUR_COMPLETE).await;
                TourState::Done(TourOutcome::Completed)
            }
            Route::Finish(outcome) => TourState::Done(outcome),
        }
    }

    /// Count a scan that did not reach an exhibit and decide whether to keep
    /// trying.
    async fn fruitless_scan(&mut self) -> TourState {
        self.empty_scans += 1;
        match self.config.max_empty_scans {
            Some(cap) if self.empty_scans >= cap => {
                warn!(attempts = self.empty_scans, "giving up after repeated empty scans");
                self.say(phrases::GIVING_UP).await;
                self.go_home().await;
                TourState::Done(TourOutcome::Abandoned)
            }
            _ => TourState::Scanning,
        }
    }

    async fn face_visitor(&self) -> Result<(), TourError> {
        self.robot
            .actuation
            .rotate(self.config.face_visitor_turn)
            .await?;
        self.robot.actuation.wait_until_motion_complete().await
    }

    async fn go_home(&self) {
        match self.robot.actuation.recall_home_pose().await {
            Ok(()) => debug!("back at home pose"),
            Err(e) => warn!(error = %e, "navigation home failed"),
        }
    }

    async fn say(&self, text: &str) {
        speak(self.robot.voice.as_ref(), text).await;
    }
}
