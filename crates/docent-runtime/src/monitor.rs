//! Attention monitor – background sampling of the visitor's engagement.
//!
//! [`AttentionMonitor::spawn`] starts a Tokio task that
//!
//! 1. sweeps the head until a face is acquired (or cancellation arrives),
//! 2. locks the tracker onto it,
//! 3. appends one [`AttentionSample`][docent_types::AttentionSample] to the
//!    session log per interval while the face stays acquired.
//!
//! The task owns the log's only [`AttentionWriter`].  Sampling errors are
//! logged and the loop carries on.  Cancellation goes through a `watch` flag;
//! [`MonitorHandle::cancel`] waits a bounded time for the task to finish and
//! aborts it otherwise.  Tracking is stopped and head stiffness dropped on
//! every path, and failures of that release are logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use docent_hal::{Actuation, Perception};
use docent_memory::{AttentionLog, AttentionWriter};
use docent_types::{HeadAxis, TourError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::scan::SWEEP_YAWS;

/// Head pitch rows tried by the face search, top row last.
pub const FACE_SEARCH_PITCHES: [f32; 3] = [-0.5, -0.25, 0.0];

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Pause between two attention samples.
    pub interval: Duration,
    pub search_yaws: Vec<f32>,
    pub search_pitches: Vec<f32>,
    /// Wait after each face-search head move.
    pub search_settle: Duration,
    pub yaw_speed: f32,
    pub pitch_speed: f32,
    /// How long [`MonitorHandle::cancel`] waits before aborting the task.
    pub join_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            search_yaws: SWEEP_YAWS.to_vec(),
            search_pitches: FACE_SEARCH_PITCHES.to_vec(),
            search_settle: Duration::from_secs(1),
            yaw_speed: 0.3,
            pitch_speed: 0.2,
            join_timeout: Duration::from_secs(2),
        }
    }
}

/// What the monitor task did before it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MonitorReport {
    pub face_acquired: bool,
    pub samples: usize,
}

/// How [`MonitorHandle::cancel`] ended the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorStop {
    /// The task saw the flag and returned within the join timeout.
    Joined(MonitorReport),
    /// The task overran the join timeout (or panicked) and was torn down.
    Aborted,
}

struct MonitorTask {
    perception: Arc<dyn Perception>,
    actuation: Arc<dyn Actuation>,
    writer: AttentionWriter,
    config: MonitorConfig,
}

pub struct AttentionMonitor;

impl AttentionMonitor {
    /// Claim the log's writer and start the background task.
    ///
    /// # Errors
    ///
    /// [`TourError::PerceptionUnavailable`] when another writer is still
    /// alive; at most one monitor runs per session.
    pub fn spawn(
        perception: Arc<dyn Perception>,
        actuation: Arc<dyn Actuation>,
        log: &AttentionLog,
        config: MonitorConfig,
    ) -> Result<MonitorHandle, TourError> {
        let writer = log.writer().ok_or_else(|| {
            TourError::PerceptionUnavailable(
                "attention log already has an active monitor".to_string(),
            )
        })?;
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let join_timeout = config.join_timeout;
        let task = MonitorTask {
            perception: Arc::clone(&perception),
            actuation: Arc::clone(&actuation),
            writer,
            config,
        };
        let join = tokio::spawn(task.run(cancel_rx));
        debug!("attention monitor started");
        Ok(MonitorHandle {
            cancel_tx,
            join,
            join_timeout,
            perception,
            actuation,
        })
    }
}

/// Owner side of a running monitor.
pub struct MonitorHandle {
    cancel_tx: watch::Sender<bool>,
    join: JoinHandle<MonitorReport>,
    join_timeout: Duration,
    perception: Arc<dyn Perception>,
    actuation: Arc<dyn Actuation>,
}

impl MonitorHandle {
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Raise the cancel flag and wait for the task.
    ///
    /// Returns within roughly twice the join timeout whatever the task is
    /// doing.  When the task had to be aborted the hardware release is
    /// repeated here, since the task never reached its own.
    pub async fn cancel(self) -> MonitorStop {
        let _ = self.cancel_tx.send(true);
        let mut join = self.join;
        match tokio::time::timeout(self.join_timeout, &mut join).await {
            Ok(Ok(report)) => {
                info!(samples = report.samples, "attention monitor stopped");
                MonitorStop::Joined(report)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "attention monitor task failed");
                release(self.perception.as_ref(), self.actuation.as_ref()).await;
                MonitorStop::Aborted
            }
            Err(_) => {
                warn!(timeout = ?self.join_timeout, "attention monitor overran join timeout; aborting");
                join.abort();
                // Wait for the abort so the log writer is dropped before returning.
                let _ = tokio::time::timeout(self.join_timeout, join).await;
                release(self.perception.as_ref(), self.actuation.as_ref()).await;
                MonitorStop::Aborted
            }
        }
    }
}

impl MonitorTask {
    async fn run(self, mut cancel: watch::Receiver<bool>) -> MonitorReport {
        let mut report = MonitorReport::default();
        if self.search_face(&mut cancel).await {
            report.face_acquired = true;
            if let Err(e) = self.perception.track_face().await {
                warn!(error = %e, "face tracking could not start");
            }
            report.samples = self.sample(&mut cancel).await;
        }
        release(self.perception.as_ref(), self.actuation.as_ref()).await;
        report
    }

    /// Sweep until a face is acquired.  Returns `false` if cancelled first.
    async fn search_face(&self, cancel: &mut watch::Receiver<bool>) -> bool {
        let cfg = &self.config;
        let home_yaw = self.actuation.orientation(HeadAxis::Yaw).await.unwrap_or(0.0);
        let home_pitch = self
            .actuation
            .orientation(HeadAxis::Pitch)
            .await
            .unwrap_or(0.0);

        loop {
            if let Err(e) = self.actuation.set_head_stiffness(1.0).await {
                warn!(error = %e, "head stiffness could not be raised");
            }
            if let Err(e) = self.perception.register_face_target().await {
                warn!(error = %e, "face target registration failed");
            }

            for &pitch in &cfg.search_pitches {
                for &yaw in &cfg.search_yaws {
                    if *cancel.borrow() {
                        return false;
                    }
                    self.point_head(yaw, pitch, cfg.yaw_speed, cfg.pitch_speed)
                        .await;
                    if wait_or_cancel(cancel, cfg.search_settle).await {
                        return false;
                    }
                    match self.perception.is_face_acquired().await {
                        Ok(true) => {
                            info!(yaw, pitch, "visitor face acquired");
                            return true;
                        }
                        Ok(false) => {}
                        Err(e) => warn!(error = %e, "face check failed"),
                    }
                }
            }

            info!("no face found during sweep; searching again");
            if let Err(e) = self.perception.stop_tracking().await {
                warn!(error = %e, "tracker release failed");
            }
            self.point_head(home_yaw, home_pitch, 0.2, 0.2).await;
            if let Err(e) = self.actuation.set_head_stiffness(0.0).await {
                warn!(error = %e, "head stiffness could not be dropped");
            }
            if *cancel.borrow() {
                return false;
            }
        }
    }

    async fn sample(&self, cancel: &mut watch::Receiver<bool>) -> usize {
        let mut samples = 0;
        loop {
            if *cancel.borrow() {
                break;
            }
            match self.perception.is_face_acquired().await {
                Ok(true) => match self.perception.current_attention_sample().await {
                    Ok(sample) if !*cancel.borrow() => {
                        let total = self.writer.append(sample);
                        samples += 1;
                        info!(
                            valence = sample.valence,
                            attention = sample.attention,
                            total,
                            "attention sampled"
                        );
                    }
                    Ok(_) => break,
                    Err(e) => warn!(error = %e, "attention reading failed"),
                },
                Ok(false) => debug!("visitor face lost; skipping sample"),
                Err(e) => warn!(error = %e, "face check failed"),
            }
            if wait_or_cancel(cancel, self.config.interval).await {
                break;
            }
        }
        samples
    }

    async fn point_head(&self, yaw: f32, pitch: f32, yaw_speed: f32, pitch_speed: f32) {
        if let Err(e) = self
            .actuation
            .set_orientation(HeadAxis::Yaw, yaw, yaw_speed)
            .await
        {
            warn!(error = %e, "head yaw command failed");
        }
        if let Err(e) = self
            .actuation
            .set_orientation(HeadAxis::Pitch, pitch, pitch_speed)
            .await
        {
            warn!(error = %e, "head pitch command failed");
        }
    }
}

/// Stop tracking and relax the head.  Failures are logged only.
pub(crate) async fn release(perception: &dyn Perception, actuation: &dyn Actuation) {
    if let Err(e) = perception.stop_tracking().await {
        warn!(error = %e, "tracker release failed");
    }
    if let Err(e) = actuation.set_head_stiffness(0.0).await {
        warn!(error = %e, "head stiffness could not be dropped");
    }
}

/// Sleep for `period` unless cancelled.  Returns `true` if cancelled.
async fn wait_or_cancel(cancel: &mut watch::Receiver<bool>, period: Duration) -> bool {
    if *cancel.borrow() {
        return true;
    }
    tokio::select! {
        changed = cancel.changed() => changed.is_err() || *cancel.borrow(),
        _ = tokio::time::sleep(period) => false,
    }
}
